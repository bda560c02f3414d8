use egui::{Align2, Color32, FontId, Pos2, Rect, Sense, Stroke, Vec2};

use crate::game::{FieldLayout, LANE_COUNT};
use crate::session::Session;

const VOCAL_TILE: Color32 = Color32::from_rgb(236, 72, 153);
const MIX_TILE: Color32 = Color32::from_rgb(34, 211, 238);
const LANE_LINE: Color32 = Color32::from_gray(60);
const HIT_ZONE: Color32 = Color32::from_rgba_premultiplied(80, 80, 120, 60);

/// Maps field units onto a screen rectangle, preserving aspect ratio.
#[derive(Debug, Clone, Copy)]
pub struct FieldTransform {
    pub origin: Pos2,
    pub scale: f32,
}

impl FieldTransform {
    pub fn fit(layout: &FieldLayout, available: Rect) -> Self {
        let scale = (available.width() / layout.width).min(available.height() / layout.height);
        let size = Vec2::new(layout.width, layout.height) * scale;
        let origin = available.center() - size / 2.0;
        Self { origin, scale }
    }

    pub fn to_screen(&self, x: f32, y: f32) -> Pos2 {
        Pos2::new(self.origin.x + x * self.scale, self.origin.y + y * self.scale)
    }

    pub fn rect(&self, x: f32, y: f32, w: f32, h: f32) -> Rect {
        Rect::from_min_size(self.to_screen(x, y), Vec2::new(w, h) * self.scale)
    }

    /// Horizontal field coordinate under a screen position.
    pub fn field_x(&self, screen: Pos2) -> f32 {
        (screen.x - self.origin.x) / self.scale
    }
}

/// Draws lanes, hit zone and tiles; a click on the field taps its lane.
pub fn show(ui: &mut egui::Ui, session: &mut Session) {
    let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::click());
    let layout = *session.engine().layout();
    let t = FieldTransform::fit(&layout, response.rect);

    painter.rect_filled(t.rect(0.0, 0.0, layout.width, layout.height), 4.0, Color32::from_gray(12));

    let lane_width = layout.lane_width();
    for lane in 0..LANE_COUNT {
        let flash = session.lane_flash(lane);
        if flash > 0.0 {
            let alpha = (flash * 90.0) as u8;
            painter.rect_filled(
                t.rect(lane as f32 * lane_width, 0.0, lane_width, layout.height),
                0.0,
                Color32::from_rgba_unmultiplied(255, 255, 255, alpha),
            );
        }
        if lane > 0 {
            let x = lane as f32 * lane_width;
            painter.line_segment(
                [t.to_screen(x, 0.0), t.to_screen(x, layout.height)],
                Stroke::new(1.0, LANE_LINE),
            );
        }
    }

    let (top, bottom) = layout.hit_zone();
    painter.rect_filled(t.rect(0.0, top, layout.width, bottom - top), 0.0, HIT_ZONE);

    let clip = t.rect(0.0, 0.0, layout.width, layout.height);
    let painter = painter.with_clip_rect(clip);
    for tile in session.engine().tiles() {
        let color = if tile.is_vocal { VOCAL_TILE } else { MIX_TILE };
        painter.rect_filled(t.rect(tile.x, tile.y, tile.width, tile.height), 6.0, color);
    }

    let state = session.engine().state();
    if state.combo > 1 {
        painter.text(
            t.to_screen(layout.width / 2.0, layout.height * 0.4),
            Align2::CENTER_CENTER,
            format!("{}x", state.combo),
            FontId::proportional(32.0 * t.scale.max(0.5)),
            Color32::from_white_alpha(140),
        );
    }

    if response.clicked() {
        if let Some(pos) = response.interact_pointer_pos() {
            session.tap(t.field_x(pos));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_letterboxes_wide_area() {
        let layout = FieldLayout::default();
        let t = FieldTransform::fit(&layout, Rect::from_min_size(Pos2::ZERO, Vec2::new(1200.0, 400.0)));
        assert_eq!(t.scale, 1.0);
        assert_eq!(t.origin, Pos2::new(300.0, 0.0));
        assert_eq!(t.field_x(Pos2::new(450.0, 10.0)), 150.0);
    }

    #[test]
    fn fit_scales_down() {
        let layout = FieldLayout::default();
        let t = FieldTransform::fit(&layout, Rect::from_min_size(Pos2::ZERO, Vec2::new(300.0, 400.0)));
        assert_eq!(t.scale, 0.5);
        let r = t.rect(0.0, 0.0, 600.0, 400.0);
        assert_eq!(r.width(), 300.0);
        assert_eq!(r.height(), 200.0);
        assert_eq!(t.field_x(Pos2::new(150.0, 0.0)), 300.0);
    }
}
