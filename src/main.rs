use anyhow::Result;
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use winit::{
    event::{ElementState, Event, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

use beat_lanes::config;
use beat_lanes::graphics::GraphicsEngine;
use beat_lanes::session::Session;
use beat_lanes::ui::UserInterface;

#[derive(Parser)]
#[command(name = "beat-lanes")]
#[command(about = "Play along to the pitch of any track on four falling-tile lanes")]
struct Args {
    /// Audio file to analyse on startup (MP3, WAV, FLAC, OGG, M4A)
    #[arg()]
    input_file: Option<PathBuf>,

    /// Pitch gate sensitivity, 0.0 (strict) to 1.0 (lenient)
    #[arg(long)]
    sensitivity: Option<f32>,

    /// Pitch aggregation window in seconds (0.1 to 0.3)
    #[arg(long)]
    complexity: Option<f32>,

    /// Config file (defaults to ./beat-lanes.toml, then the user config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where history and the high score are kept
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn lane_for_key(code: KeyCode) -> Option<usize> {
    match code {
        KeyCode::KeyD => Some(0),
        KeyCode::KeyF => Some(1),
        KeyCode::KeyJ => Some(2),
        KeyCode::KeyK => Some(3),
        _ => None,
    }
}

fn main() -> Result<()> {
    beat_lanes::init_logging();
    let args = Args::parse();
    info!("Starting Beat Lanes");

    let mut config = config::resolve(args.config.as_deref())?;
    config.apply_overrides(args.sensitivity, args.complexity, args.data_dir);
    info!("Data directory: {}", config.data_dir().display());

    let event_loop = EventLoop::new()?;
    let window = Arc::new(WindowBuilder::new()
        .with_title("Beat Lanes")
        .with_inner_size(winit::dpi::LogicalSize::new(1100, 720))
        .build(&event_loop)?);

    let mut graphics_engine = pollster::block_on(GraphicsEngine::new(&window))?;
    let mut ui = UserInterface::new(&window, &graphics_engine);
    let mut session = Session::new(&config)?;

    if let Some(path) = &args.input_file {
        session.open_file(path);
    }

    info!("Beat Lanes initialized");

    let window_clone = Arc::clone(&window);
    event_loop.run(move |event, elwt| {
        match event {
            Event::WindowEvent { event, .. } => {
                let consumed = ui.handle_event(&event, &window_clone);
                match event {
                    WindowEvent::CloseRequested => {
                        info!("Close requested");
                        session.stop();
                        elwt.exit();
                    }
                    WindowEvent::KeyboardInput { event, .. }
                        if event.state == ElementState::Pressed
                            && !event.repeat
                            && !ui.wants_keyboard() =>
                    {
                        if let PhysicalKey::Code(code) = event.physical_key {
                            match code {
                                KeyCode::Escape => {
                                    info!("Escape pressed");
                                    session.stop();
                                    elwt.exit();
                                }
                                KeyCode::Space => session.toggle_play(),
                                KeyCode::KeyS => session.stop(),
                                other => {
                                    if let Some(lane) = lane_for_key(other) {
                                        session.tap_lane(lane);
                                    }
                                }
                            }
                        }
                    }
                    WindowEvent::DroppedFile(path) if !consumed => {
                        session.open_file(&path);
                    }
                    WindowEvent::Resized(physical_size) => {
                        graphics_engine.resize(physical_size);
                    }
                    WindowEvent::RedrawRequested => {
                        session.poll_worker();
                        session.frame();
                        if let Err(e) = graphics_engine.render(&window_clone, &mut ui, &mut session) {
                            error!("Render error: {}", e);
                        }
                    }
                    _ => {}
                }
            }
            Event::AboutToWait => {
                window_clone.request_redraw();
            }
            _ => {}
        }
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lane_keys() {
        assert_eq!(lane_for_key(KeyCode::KeyD), Some(0));
        assert_eq!(lane_for_key(KeyCode::KeyK), Some(3));
        assert_eq!(lane_for_key(KeyCode::Space), None);
    }

    #[test]
    fn args_parse() {
        let args = Args::parse_from(["beat-lanes", "song.mp3", "--sensitivity", "0.7"]);
        assert_eq!(args.input_file, Some(PathBuf::from("song.mp3")));
        assert_eq!(args.sensitivity, Some(0.7));
        assert!(args.complexity.is_none());
    }
}
