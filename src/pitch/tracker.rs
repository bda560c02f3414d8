use log::debug;

use super::classifier::{self, ClassifierDecision, ClassifierInput, ClassifierState, Mode};
use super::extract::{dominant_frequency, BinRange, DominantCandidate};
use super::{note_name, PitchSample};
use crate::audio::FrequencyFrame;

/// Amplitude gate for a sensitivity in `[0, 1]`: 0.20 at 0, 0.02 at 1.
pub fn min_amplitude(sensitivity: f32) -> f32 {
    0.02 + (1.0 - sensitivity.clamp(0.0, 1.0)) * 0.18
}

/// Accepts a candidate when it has a frequency and reaches the gate (inclusive).
pub fn passes_gate(candidate: &DominantCandidate, sensitivity: f32) -> bool {
    candidate.has_signal() && candidate.amplitude >= min_amplitude(sensitivity)
}

#[derive(Debug, Clone)]
pub struct TrackedFrame {
    pub sample: Option<PitchSample>,
    pub decision: ClassifierDecision,
}

/// Runs classification and gating once per frame and produces the pitch
/// stream.
pub struct PitchTracker {
    state: ClassifierState,
    sensitivity: f32,
}

impl PitchTracker {
    pub fn new(sensitivity: f32) -> Self {
        Self {
            state: ClassifierState::default(),
            sensitivity: sensitivity.clamp(0.0, 1.0),
        }
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    pub fn set_sensitivity(&mut self, sensitivity: f32) {
        self.sensitivity = sensitivity.clamp(0.0, 1.0);
    }

    pub fn mode(&self) -> Mode {
        self.state.current_mode
    }

    pub fn state(&self) -> &ClassifierState {
        &self.state
    }

    /// Back to initial state; nothing from the previous session survives.
    pub fn reset(&mut self) {
        self.state = ClassifierState::default();
    }

    pub fn process(&mut self, frame: &FrequencyFrame, now_ms: f64) -> TrackedFrame {
        let input = ClassifierInput::from_frame(frame);
        let (next, decision) = classifier::step(&self.state, &input, now_ms);
        self.state = next;

        if decision.switched {
            debug!("Pitch mode -> {:?} at {:.0}ms", decision.mode, now_ms);
        }

        let source = match decision.mode {
            Mode::Vocal => decision.vocal_dominant,
            Mode::Full => dominant_frequency(frame, BinRange::full(frame)),
        };

        let sample = passes_gate(&source, self.sensitivity).then(|| PitchSample {
            frequency_hz: source.frequency_hz,
            note: note_name(source.frequency_hz),
            is_vocal: decision.mode == Mode::Vocal,
        });

        TrackedFrame { sample, decision }
    }
}
