pub mod engine;
pub mod score;
pub mod pulse;

pub use engine::{FrameEvents, HitOutcome, TileEngine};
pub use score::{FileHighScoreStore, HighScoreStore, MemoryHighScoreStore};
pub use pulse::BeatPulse;

use serde::Serialize;

pub const LANE_COUNT: usize = 4;

/// A falling tile. `y` is the leading (top) edge, growing toward the hit zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tile {
    pub id: u64,
    pub lane: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub speed: f32,
    pub is_vocal: bool,
}

impl Tile {
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn intersects(&self, top: f32, bottom: f32) -> bool {
        self.bottom() >= top && self.y <= bottom
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GameState {
    pub score: u32,
    pub combo: u32,
    pub high_score: u32,
}

/// Play-field geometry in field units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldLayout {
    pub width: f32,
    pub height: f32,
    pub hit_zone_center: f32,
    pub hit_zone_height: f32,
}

impl Default for FieldLayout {
    fn default() -> Self {
        Self::new(600.0, 400.0)
    }
}

impl FieldLayout {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            hit_zone_center: height * 0.8,
            hit_zone_height: 50.0,
        }
    }

    pub fn lane_width(&self) -> f32 {
        self.width / LANE_COUNT as f32
    }

    pub fn tile_width(&self) -> f32 {
        self.lane_width() * 0.8
    }

    /// Left edge of a tile centred in `lane`.
    pub fn tile_x(&self, lane: usize) -> f32 {
        lane as f32 * self.lane_width() + (self.lane_width() - self.tile_width()) / 2.0
    }

    pub fn hit_zone(&self) -> (f32, f32) {
        let half = self.hit_zone_height / 2.0;
        (self.hit_zone_center - half, self.hit_zone_center + half)
    }

    pub fn lane_at(&self, x: f32) -> usize {
        let lane = (x / self.lane_width()).floor();
        lane.clamp(0.0, (LANE_COUNT - 1) as f32) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lane_lookup_clamps() {
        let field = FieldLayout::default();
        assert_eq!(field.lane_at(-20.0), 0);
        assert_eq!(field.lane_at(0.0), 0);
        assert_eq!(field.lane_at(149.9), 0);
        assert_eq!(field.lane_at(150.0), 1);
        assert_eq!(field.lane_at(599.0), 3);
        assert_eq!(field.lane_at(900.0), 3);
    }

    #[test]
    fn tiles_are_centred() {
        let field = FieldLayout::default();
        assert_eq!(field.tile_width(), 120.0);
        assert_eq!(field.tile_x(0), 15.0);
        assert_eq!(field.tile_x(2), 315.0);
    }

    #[test]
    fn hit_zone_is_around_eighty_percent() {
        let field = FieldLayout::default();
        assert_eq!(field.hit_zone(), (295.0, 345.0));
    }
}
