pub mod field;

use anyhow::Result;
use egui::{Color32, RichText};
use egui_wgpu::Renderer;
use egui_winit::State;
use wgpu::{CommandEncoder, Device, Queue, TextureView};
use winit::{event::WindowEvent, window::Window};

use crate::game::engine::{MAX_COMPLEXITY, MIN_COMPLEXITY};
use crate::graphics::GraphicsEngine;
use crate::pitch::{Mode, PitchLane};
use crate::session::{NoticeLevel, Session};

const LANE_COLORS: [Color32; 4] = [
    Color32::from_rgb(239, 68, 68),
    Color32::from_rgb(234, 179, 8),
    Color32::from_rgb(34, 197, 94),
    Color32::from_rgb(59, 130, 246),
];

pub struct UserInterface {
    context: egui::Context,
    state: State,
    renderer: Renderer,
    show_history: bool,
}

impl UserInterface {
    pub fn new(window: &Window, graphics_engine: &GraphicsEngine) -> Self {
        let context = egui::Context::default();
        context.set_visuals(egui::Visuals::dark());

        let egui_state = State::new(
            context.clone(),
            egui::ViewportId::ROOT,
            &window,
            None,
            None,
        );

        let renderer = Renderer::new(
            &graphics_engine.device,
            graphics_engine.config.format,
            None,
            1,
        );

        Self {
            context,
            state: egui_state,
            renderer,
            show_history: true,
        }
    }

    /// Returns true when egui consumed the event.
    pub fn handle_event(&mut self, event: &WindowEvent, window: &Window) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    pub fn wants_keyboard(&self) -> bool {
        self.context.wants_keyboard_input()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        encoder: &mut CommandEncoder,
        target: &TextureView,
        device: &Device,
        queue: &Queue,
        window: &Window,
        size_in_pixels: [u32; 2],
        session: &mut Session,
    ) -> Result<()> {
        let raw_input = self.state.take_egui_input(window);

        let show_history = &mut self.show_history;
        let full_output = self.context.run(raw_input, |ctx| {
            Self::ui_content(ctx, session, show_history);
        });

        self.state.handle_platform_output(window, full_output.platform_output);

        let tris = self.context.tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, image_delta);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels,
            pixels_per_point: full_output.pixels_per_point,
        };

        self.renderer.update_buffers(device, queue, encoder, &tris, &screen_descriptor);

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            self.renderer.render(&mut render_pass, &tris, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.renderer.free_texture(id);
        }

        Ok(())
    }

    fn ui_content(ctx: &egui::Context, session: &mut Session, show_history: &mut bool) {
        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Beat Lanes");
                ui.separator();
                Self::track_info(ui, session);
            });

            ui.horizontal(|ui| {
                let label = if session.is_playing() { "Pause" } else { "Play" };
                if ui
                    .add_enabled(session.has_track(), egui::Button::new(label))
                    .clicked()
                {
                    session.toggle_play();
                }
                if ui.add_enabled(session.has_track(), egui::Button::new("Stop")).clicked() {
                    session.stop();
                }

                ui.separator();

                let mut sensitivity = session.sensitivity();
                if ui
                    .add(egui::Slider::new(&mut sensitivity, 0.0..=1.0).text("Sensitivity"))
                    .changed()
                {
                    session.set_sensitivity(sensitivity);
                }

                let mut complexity = session.complexity();
                if ui
                    .add(
                        egui::Slider::new(&mut complexity, MIN_COMPLEXITY..=MAX_COMPLEXITY)
                            .text("Window (s)"),
                    )
                    .changed()
                {
                    session.set_complexity(complexity);
                }

                ui.separator();
                ui.checkbox(show_history, "History");
            });
        });

        egui::TopBottomPanel::bottom("score").show(ctx, |ui| {
            let state = session.engine().state();
            ui.horizontal(|ui| {
                ui.label(RichText::new(format!("Score {}", state.score)).strong());
                ui.separator();
                ui.label(format!("Combo {}", state.combo));
                ui.separator();
                ui.label(format!("Best {}", state.high_score));
                ui.separator();
                ui.label("Space play/pause · S stop · D F J K tap · Esc quit");
            });
        });

        egui::SidePanel::left("pitch").resizable(false).show(ctx, |ui| {
            Self::pitch_panel(ui, session);
        });

        if *show_history {
            egui::SidePanel::right("history").show(ctx, |ui| {
                Self::history_panel(ui, session);
            });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            if session.has_track() {
                field::show(ui, session);
            } else {
                ui.centered_and_justified(|ui| match session.analyzing() {
                    Some(name) => ui.label(format!("Analyzing {}...", name)),
                    None => ui.label("Drop an audio file onto the window to start"),
                });
            }
        });

        Self::notices(ctx, session);
    }

    fn track_info(ui: &mut egui::Ui, session: &Session) {
        match session.file_name() {
            Some(name) => {
                ui.label(name);
                if let Some(bpm) = session.bpm() {
                    ui.label(format!("{} BPM", bpm));
                    let (rect, _) = ui.allocate_exact_size(egui::vec2(14.0, 14.0), egui::Sense::hover());
                    let color = if session.pulse_lit() {
                        Color32::from_rgb(250, 204, 21)
                    } else {
                        Color32::from_gray(50)
                    };
                    ui.painter().circle_filled(rect.center(), 6.0, color);
                }
                ui.label(format!("{:.1}s", session.position().as_secs_f32()));
            }
            None => {
                ui.label("No track loaded");
            }
        }
    }

    fn pitch_panel(ui: &mut egui::Ui, session: &Session) {
        ui.heading("Pitch");
        let pitch = session.pitch();
        let mode = match session.mode() {
            Mode::Vocal => "Vocal",
            Mode::Full => "Full mix",
        };
        ui.label(format!("Tracking: {}", mode));

        match &pitch {
            Some(sample) => {
                ui.label(RichText::new(&sample.note).size(28.0).strong());
                ui.label(format!("{:.1} Hz", sample.frequency_hz));
            }
            None => {
                ui.label(RichText::new("-").size(28.0));
                ui.label("no pitch");
            }
        }

        ui.separator();
        let active = pitch
            .as_ref()
            .and_then(|s| PitchLane::from_frequency(s.frequency_hz));
        for (lane, color) in PitchLane::ALL.into_iter().zip(LANE_COLORS) {
            let (lo, hi) = lane.range_hz();
            let text = format!("{} ({:.0}-{:.0} Hz)", lane.label(), lo, hi);
            if active == Some(lane) {
                ui.label(RichText::new(text).color(color).strong());
            } else {
                ui.label(RichText::new(text).color(Color32::from_gray(110)));
            }
        }

        if let Some(spectrum) = session.spectrum() {
            ui.separator();
            let (rect, _) = ui.allocate_exact_size(egui::vec2(160.0, 60.0), egui::Sense::hover());
            let painter = ui.painter_at(rect);
            // Lower quarter of the spectrum holds almost everything musical.
            let shown = &spectrum[..spectrum.len() / 4];
            let bar = rect.width() / shown.len().max(1) as f32;
            for (i, &m) in shown.iter().enumerate() {
                let h = rect.height() * m as f32 / 255.0;
                let x = rect.left() + i as f32 * bar;
                painter.rect_filled(
                    egui::Rect::from_min_max(egui::pos2(x, rect.bottom() - h), egui::pos2(x + bar, rect.bottom())),
                    0.0,
                    Color32::from_rgb(99, 102, 241),
                );
            }
        }
    }

    fn history_panel(ui: &mut egui::Ui, session: &Session) {
        ui.heading("History");
        let records = session.history();
        if records.is_empty() {
            ui.label("No analyses yet");
            return;
        }
        egui::ScrollArea::vertical().show(ui, |ui| {
            for record in records.iter().rev() {
                ui.group(|ui| {
                    ui.label(RichText::new(&record.file_name).strong());
                    ui.label(format!("{} BPM", record.bpm));
                    ui.small(record.timestamp.format("%Y-%m-%d %H:%M").to_string());
                });
            }
        });
    }

    fn notices(ctx: &egui::Context, session: &Session) {
        if session.notices().is_empty() {
            return;
        }
        egui::Area::new(egui::Id::new("notices"))
            .anchor(egui::Align2::RIGHT_BOTTOM, [-12.0, -40.0])
            .show(ctx, |ui| {
                for notice in session.notices() {
                    egui::Frame::popup(ui.style()).show(ui, |ui| {
                        let color = match notice.level {
                            NoticeLevel::Info => Color32::from_rgb(134, 239, 172),
                            NoticeLevel::Error => Color32::from_rgb(248, 113, 113),
                        };
                        ui.label(RichText::new(&notice.title).color(color).strong());
                        ui.label(&notice.body);
                    });
                }
            });
    }
}
