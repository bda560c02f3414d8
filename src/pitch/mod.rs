//! Per-frame pitch tracking: dominant-bin extraction, vocal/full-mix
//! classification and the gated pitch stream consumed by the game.

pub mod extract;
pub mod classifier;
pub mod tracker;
pub mod pipeline;

pub use extract::{band_energy, dominant_frequency, BinRange, DominantCandidate};
pub use classifier::{ClassifierDecision, ClassifierInput, ClassifierState, Mode};
pub use tracker::{min_amplitude, passes_gate, PitchTracker, TrackedFrame};
pub use pipeline::PitchPipeline;

use serde::Serialize;
use std::sync::{Arc, Mutex};

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// Confident pitch for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PitchSample {
    pub frequency_hz: f32,
    pub note: String,
    pub is_vocal: bool,
}

pub fn midi_number(frequency_hz: f32) -> i32 {
    (12.0 * (frequency_hz / 440.0).log2() + 69.0).round() as i32
}

/// Scientific pitch name such as `A4`; `-` for non-positive input.
pub fn note_name(frequency_hz: f32) -> String {
    if frequency_hz <= 0.0 {
        return "-".to_string();
    }
    let midi = midi_number(frequency_hz);
    let name = NOTE_NAMES[midi.rem_euclid(12) as usize];
    let octave = midi.div_euclid(12) - 1;
    format!("{}{}", name, octave)
}

/// Latest published pitch sample, shared between the pitch chain and the
/// tile engine.
///
/// Last write wins. A reader may observe a value that is up to one frame old,
/// or `None` when the producer found no confident pitch.
#[derive(Debug, Clone, Default)]
pub struct PitchSlot {
    inner: Arc<Mutex<Option<PitchSample>>>,
}

impl PitchSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, sample: Option<PitchSample>) {
        let mut slot = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *slot = sample;
    }

    pub fn latest(&self) -> Option<PitchSample> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear(&self) {
        self.publish(None);
    }
}

/// Visual lane a live pitch falls into. This table only drives the lane
/// highlight; vocal detection uses its own bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitchLane {
    Bass,
    MidLow,
    MidHigh,
    High,
}

impl PitchLane {
    pub const ALL: [PitchLane; 4] = [PitchLane::Bass, PitchLane::MidLow, PitchLane::MidHigh, PitchLane::High];

    pub fn range_hz(self) -> (f32, f32) {
        match self {
            PitchLane::Bass => (0.0, 150.0),
            PitchLane::MidLow => (150.0, 400.0),
            PitchLane::MidHigh => (400.0, 800.0),
            PitchLane::High => (800.0, 20000.0),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PitchLane::Bass => "Bass",
            PitchLane::MidLow => "Mid-Low",
            PitchLane::MidHigh => "Mid-High",
            PitchLane::High => "High",
        }
    }

    pub fn from_frequency(frequency_hz: f32) -> Option<Self> {
        Self::ALL.into_iter().find(|lane| {
            let (lo, hi) = lane.range_hz();
            frequency_hz >= lo && frequency_hz < hi
        })
    }
}
