//! Everything one window needs: loaded track, playback, the two per-frame
//! chains, history and the notices shown to the player.

use anyhow::Result;
use log::{info, warn};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::audio::{check_audio_file, AudioPlayback, DecodedAudio};
use crate::config::Config;
use crate::game::{BeatPulse, FieldLayout, FileHighScoreStore, HitOutcome, TileEngine};
use crate::history::{self, api::ANALYSES_PATH, AnalysisRecord, ApiResponse, HistoryStore, JsonHistoryStore};
use crate::pitch::{Mode, PitchPipeline, PitchSample, PitchSlot};
use crate::tempo::OnsetTempoEstimator;
use crate::worker::{AnalysisEvent, AnalysisWorker};

const NOTICE_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub body: String,
    pub shown_at: Instant,
}

impl Notice {
    pub fn info(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, title, body)
    }

    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, title, body)
    }

    fn new(level: NoticeLevel, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            body: body.into(),
            shown_at: Instant::now(),
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.shown_at) >= NOTICE_TTL
    }
}

pub struct Session {
    playback: AudioPlayback,
    pipeline: Option<PitchPipeline>,
    slot: PitchSlot,
    engine: TileEngine,
    pulse: BeatPulse,
    history: Box<dyn HistoryStore>,
    worker: AnalysisWorker,
    notices: Vec<Notice>,
    sensitivity: f32,
    analyzing: Option<String>,
    clock: Instant,
    pulse_lit: bool,
    mode: Mode,
}

impl Session {
    pub fn new(config: &Config) -> Result<Self> {
        let mut playback = AudioPlayback::new()?;
        playback.set_volume(config.audio.volume);

        let scores = FileHighScoreStore::new(config.high_score_path());
        let mut engine = TileEngine::new(FieldLayout::default(), Box::new(scores));
        engine.set_complexity(config.game.complexity);

        let history = JsonHistoryStore::open(config.history_path());
        let worker = AnalysisWorker::spawn(Arc::new(OnsetTempoEstimator::new()))?;

        Ok(Self {
            playback,
            pipeline: None,
            slot: PitchSlot::new(),
            engine,
            pulse: BeatPulse::default(),
            history: Box::new(history),
            worker,
            notices: Vec::new(),
            sensitivity: config.game.sensitivity,
            analyzing: None,
            clock: Instant::now(),
            pulse_lit: false,
            mode: Mode::Full,
        })
    }

    fn now_ms(&self) -> f64 {
        self.clock.elapsed().as_secs_f64() * 1000.0
    }

    /// Validates the file and hands it to the analysis worker.
    pub fn open_file(&mut self, path: &Path) {
        if let Err(e) = check_audio_file(path) {
            warn!("Rejected {}: {}", path.display(), e);
            self.notify(Notice::error("Invalid file", e.to_string()));
            return;
        }

        self.stop();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match self.worker.submit(path.to_path_buf()) {
            Ok(()) => self.analyzing = Some(name),
            Err(e) => self.notify(Notice::error("Analysis Failed", format!("{:#}", e))),
        }
    }

    /// Picks up finished analyses. Call once per frame.
    pub fn poll_worker(&mut self) {
        while let Some(event) = self.worker.poll() {
            self.analyzing = None;
            match event {
                AnalysisEvent::Ready { audio, bpm } => self.on_ready(audio, bpm),
                AnalysisEvent::Failed { file_name, reason } => {
                    warn!("Analysis of {} failed: {}", file_name, reason);
                    self.clear_track();
                    self.notify(Notice::error(
                        "Analysis Failed",
                        "Could not detect beat. Try a clearer audio file.",
                    ));
                }
            }
        }
    }

    fn on_ready(&mut self, audio: Arc<DecodedAudio>, bpm: f32) {
        let rounded = bpm.round();
        info!("{} ready at {} BPM", audio.file_name, rounded);

        self.pipeline = Some(PitchPipeline::new(
            audio.sample_rate,
            self.sensitivity,
            self.slot.clone(),
        ));
        self.pulse.set_bpm(Some(rounded));

        let response = record_analysis(self.history.as_mut(), &audio.file_name, bpm);
        if response.status != 201 {
            warn!("History not saved ({}): {}", response.status, response.body);
        }

        self.playback.load(audio);
        self.notify(Notice::info("Analysis Complete", format!("Detected BPM: {}", rounded)));
    }

    fn clear_track(&mut self) {
        self.stop();
        self.playback.unload();
        self.pipeline = None;
        self.pulse.set_bpm(None);
    }

    pub fn toggle_play(&mut self) {
        if self.playback.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn play(&mut self) {
        if self.playback.audio().is_none() {
            return;
        }
        if let Err(e) = self.playback.play() {
            warn!("Playback failed: {:#}", e);
            self.notify(Notice::error("Playback Failed", format!("{:#}", e)));
            return;
        }
        self.engine.start();
    }

    /// Keeps position and score; tiles, combo and pitch state are dropped.
    pub fn pause(&mut self) {
        self.playback.pause();
        self.engine.pause();
        self.halt_pitch();
    }

    pub fn stop(&mut self) {
        self.playback.stop();
        self.engine.stop();
        self.halt_pitch();
    }

    fn halt_pitch(&mut self) {
        if let Some(pipeline) = &mut self.pipeline {
            pipeline.reset();
        }
        self.slot.clear();
        self.pulse.reset();
        self.pulse_lit = false;
        self.mode = Mode::Full;
    }

    /// One redraw: tile engine first, then the pitch chain, then the pulse.
    pub fn frame(&mut self) {
        let now_ms = self.now_ms();
        let now = Instant::now();
        self.notices.retain(|n| !n.is_expired(now));

        if self.playback.is_playing() {
            // Reads what the pitch chain published last redraw.
            let sample = self.slot.latest();
            self.engine.tick(sample.as_ref(), now_ms);

            if let (Some(pipeline), Some(audio)) = (&mut self.pipeline, self.playback.audio()) {
                let position = self.playback.position_frame();
                let tracked = pipeline.run(&audio.mono, position, now_ms);
                self.mode = tracked.decision.mode;
            }
        } else if self.engine.is_running() && self.playback.is_finished() {
            info!("Track finished");
            self.stop();
        }

        self.pulse_lit = self.pulse.update(now_ms, self.playback.is_playing());
    }

    pub fn tap(&mut self, field_x: f32) -> Option<HitOutcome> {
        let now_ms = self.now_ms();
        self.engine.tap(field_x, now_ms)
    }

    pub fn tap_lane(&mut self, lane: usize) -> Option<HitOutcome> {
        let now_ms = self.now_ms();
        self.engine.tap_lane(lane, now_ms)
    }

    pub fn set_sensitivity(&mut self, sensitivity: f32) {
        self.sensitivity = sensitivity.clamp(0.0, 1.0);
        if let Some(pipeline) = &mut self.pipeline {
            pipeline.set_sensitivity(self.sensitivity);
        }
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    pub fn set_complexity(&mut self, complexity: f32) {
        self.engine.set_complexity(complexity);
    }

    pub fn complexity(&self) -> f32 {
        self.engine.complexity()
    }

    pub fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn engine(&self) -> &TileEngine {
        &self.engine
    }

    pub fn lane_flash(&self, lane: usize) -> f32 {
        self.engine.lane_flash(lane, self.now_ms())
    }

    pub fn pitch(&self) -> Option<PitchSample> {
        self.slot.latest()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn spectrum(&self) -> Option<&[u8]> {
        self.pipeline.as_ref().map(|p| p.last_frame().magnitudes.as_slice())
    }

    pub fn bpm(&self) -> Option<f32> {
        self.pulse.bpm()
    }

    pub fn pulse_lit(&self) -> bool {
        self.pulse_lit
    }

    pub fn file_name(&self) -> Option<&str> {
        self.playback.audio().map(|a| a.file_name.as_str())
    }

    pub fn analyzing(&self) -> Option<&str> {
        self.analyzing.as_deref()
    }

    pub fn has_track(&self) -> bool {
        self.playback.audio().is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    pub fn position(&self) -> Duration {
        self.playback.position()
    }

    pub fn history(&self) -> Vec<AnalysisRecord> {
        self.history.list_all()
    }
}

/// Posts the unrounded estimate; rounding is only for display.
fn record_analysis(history: &mut dyn HistoryStore, file_name: &str, bpm: f32) -> ApiResponse {
    let body = json!({ "fileName": file_name, "bpm": bpm.to_string() });
    history::handle(history, "POST", ANALYSES_PATH, Some(&body.to_string()))
}
