//! Hysteresis classifier deciding whether a frame is treated as vocal-led or
//! full-mix.
//!
//! The state lives in [`ClassifierState`] and is only advanced through
//! [`step`], a pure function of the previous state, the frame's band figures
//! and the frame timestamp. Timers are `Option`s so a reset state carries no
//! timestamps from an earlier session.

use serde::Serialize;

use super::extract::{band_energy, dominant_frequency, BinRange, DominantCandidate};
use crate::audio::FrequencyFrame;

pub const VOCAL_BAND_HZ: (f32, f32) = (300.0, 1500.0);
pub const HIGH_NOISE_BAND_HZ: (f32, f32) = (3000.0, 8000.0);

const VOCAL_THRESHOLD: f32 = 0.15;
const VOCAL_HOLD_MS: f64 = 120.0;
const VOCAL_PITCH_STABLE_HZ: f32 = 35.0;
const HIGH_NOISE_THRESHOLD: f32 = 0.12;
const HIGH_NOISE_SPIKE: f32 = 0.3;
const HIGH_NOISE_SPIKE_WINDOW_MS: f64 = 40.0;
const MODE_DEBOUNCE_MS: f64 = 250.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Vocal,
    #[default]
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingMode {
    pub mode: Mode,
    pub since_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassifierState {
    pub current_mode: Mode,
    pub pending: Option<PendingMode>,
    pub candidate_since: Option<f64>,
    pub previous_vocal_frequency: f32,
    pub previous_sample_at: Option<f64>,
    pub previous_high_energy: f32,
}

/// Band figures for one frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifierInput {
    pub vocal_energy: f32,
    pub high_energy: f32,
    pub vocal_dominant: DominantCandidate,
}

impl ClassifierInput {
    pub fn from_frame(frame: &FrequencyFrame) -> Self {
        let vocal_range = BinRange::for_band(frame, VOCAL_BAND_HZ.0, VOCAL_BAND_HZ.1);
        let high_range = BinRange::for_band(frame, HIGH_NOISE_BAND_HZ.0, HIGH_NOISE_BAND_HZ.1);
        Self {
            vocal_energy: band_energy(frame, vocal_range),
            high_energy: band_energy(frame, high_range),
            vocal_dominant: dominant_frequency(frame, vocal_range),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClassifierDecision {
    pub mode: Mode,
    pub switched: bool,
    pub vocal_candidate: bool,
    pub vocal_dominant: DominantCandidate,
    pub vocal_energy: f32,
    pub high_energy: f32,
}

pub fn step(
    state: &ClassifierState,
    input: &ClassifierInput,
    now_ms: f64,
) -> (ClassifierState, ClassifierDecision) {
    let vocal_frequency = input.vocal_dominant.frequency_hz;

    let frequency_stable = state.previous_vocal_frequency > 0.0
        && (vocal_frequency - state.previous_vocal_frequency).abs() <= VOCAL_PITCH_STABLE_HZ;

    let high_spike = state.previous_high_energy > 0.0
        && (input.high_energy - state.previous_high_energy) / state.previous_high_energy
            >= HIGH_NOISE_SPIKE
        && state
            .previous_sample_at
            .map_or(false, |prev| now_ms - prev <= HIGH_NOISE_SPIKE_WINDOW_MS);

    let high_noise_blocked =
        input.high_energy >= HIGH_NOISE_THRESHOLD && (!frequency_stable || high_spike);

    let vocal_candidate =
        input.vocal_energy >= VOCAL_THRESHOLD && frequency_stable && !high_noise_blocked;

    let candidate_since = if vocal_candidate {
        Some(state.candidate_since.unwrap_or(now_ms))
    } else {
        None
    };

    let vocal_active = candidate_since.map_or(false, |since| now_ms - since >= VOCAL_HOLD_MS);
    let desired = if vocal_active { Mode::Vocal } else { Mode::Full };

    let mut current_mode = state.current_mode;
    let mut pending = state.pending;
    let mut switched = false;

    if desired != current_mode {
        match pending {
            Some(p) if p.mode == desired => {
                if now_ms - p.since_ms >= MODE_DEBOUNCE_MS {
                    current_mode = desired;
                    pending = None;
                    switched = true;
                }
            }
            _ => {
                pending = Some(PendingMode {
                    mode: desired,
                    since_ms: now_ms,
                });
            }
        }
    } else {
        pending = None;
    }

    let next = ClassifierState {
        current_mode,
        pending,
        candidate_since,
        previous_vocal_frequency: vocal_frequency,
        previous_sample_at: Some(now_ms),
        previous_high_energy: input.high_energy,
    };

    let decision = ClassifierDecision {
        mode: current_mode,
        switched,
        vocal_candidate,
        vocal_dominant: input.vocal_dominant,
        vocal_energy: input.vocal_energy,
        high_energy: input.high_energy,
    };

    (next, decision)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME_MS: f64 = 16.0;

    fn vocal(freq: f32) -> ClassifierInput {
        ClassifierInput {
            vocal_energy: 0.3,
            high_energy: 0.0,
            vocal_dominant: DominantCandidate {
                frequency_hz: freq,
                amplitude: 0.8,
            },
        }
    }

    fn quiet() -> ClassifierInput {
        ClassifierInput::default()
    }

    fn run(inputs: &[ClassifierInput]) -> (ClassifierState, Vec<(f64, Mode)>) {
        let mut state = ClassifierState::default();
        let mut switches = Vec::new();
        for (i, input) in inputs.iter().enumerate() {
            let now = i as f64 * FRAME_MS;
            let (next, decision) = step(&state, input, now);
            if decision.switched {
                switches.push((now, decision.mode));
            }
            state = next;
        }
        (state, switches)
    }

    #[test]
    fn steady_voice_switches_after_hold_and_debounce() {
        let inputs: Vec<_> = (0..40).map(|_| vocal(440.0)).collect();
        let (state, switches) = run(&inputs);

        // Candidate from frame 1 (16ms), active at 144ms, committed at 400ms.
        assert_eq!(switches, vec![(400.0, Mode::Vocal)]);
        assert_eq!(state.current_mode, Mode::Vocal);
        assert!(state.pending.is_none());
    }

    #[test]
    fn first_frame_is_never_stable() {
        let (next, decision) = step(&ClassifierState::default(), &vocal(440.0), 0.0);
        assert!(!decision.vocal_candidate);
        assert!(next.candidate_since.is_none());
        assert_eq!(next.previous_vocal_frequency, 440.0);
        assert_eq!(next.previous_sample_at, Some(0.0));
    }

    #[test]
    fn wandering_pitch_is_not_vocal() {
        let inputs: Vec<_> = (0..60)
            .map(|i| vocal(if i % 2 == 0 { 400.0 } else { 500.0 }))
            .collect();
        let (state, switches) = run(&inputs);
        assert!(switches.is_empty());
        assert_eq!(state.current_mode, Mode::Full);
    }

    #[test]
    fn oscillating_input_never_leaves_full() {
        let inputs: Vec<_> = (0..200)
            .map(|i| if i % 2 == 0 { vocal(440.0) } else { quiet() })
            .collect();
        let (_, switches) = run(&inputs);
        assert!(switches.is_empty());
    }

    #[test]
    fn mode_changes_are_at_least_debounce_apart() {
        // Vocal blocks of varying length separated by short gaps.
        let mut inputs = Vec::new();
        for block in 0..30 {
            let len = 5 + (block * 7) % 23;
            inputs.extend((0..len).map(|_| vocal(440.0)));
            let gap = 1 + (block * 3) % 9;
            inputs.extend((0..gap).map(|_| quiet()));
        }
        let (_, switches) = run(&inputs);
        for pair in switches.windows(2) {
            assert!(pair[1].0 - pair[0].0 >= MODE_DEBOUNCE_MS, "{:?}", pair);
        }
    }

    #[test]
    fn returns_to_full_after_debounce() {
        let mut inputs: Vec<_> = (0..40).map(|_| vocal(440.0)).collect();
        inputs.extend((0..40).map(|_| quiet()));
        let (state, switches) = run(&inputs);
        assert_eq!(switches.len(), 2);
        assert_eq!(switches[1].1, Mode::Full);
        // Full desired from frame 40 (640ms), committed 250ms later.
        assert_eq!(switches[1].0, 640.0 + 256.0);
        assert_eq!(state.current_mode, Mode::Full);
    }

    #[test]
    fn high_noise_blocks_unstable_pitch_only() {
        let mut noisy = vocal(440.0);
        noisy.high_energy = 0.2;

        // Stable pitch with steady hiss: still a candidate.
        let state = ClassifierState {
            previous_vocal_frequency: 440.0,
            previous_high_energy: 0.2,
            previous_sample_at: Some(0.0),
            ..Default::default()
        };
        let (_, decision) = step(&state, &noisy, 16.0);
        assert!(decision.vocal_candidate);

        // Same hiss jumping 50% within 40ms: blocked.
        let spiking = ClassifierState {
            previous_high_energy: 0.1,
            ..state.clone()
        };
        let (_, decision) = step(&spiking, &noisy, 16.0);
        assert!(!decision.vocal_candidate);

        // The same jump spread over more than 40ms is not a spike.
        let (_, decision) = step(&spiking, &noisy, 60.0);
        assert!(decision.vocal_candidate);
    }

    #[test]
    fn pending_record_restarts_when_desire_flips() {
        let state = ClassifierState {
            current_mode: Mode::Full,
            pending: Some(PendingMode { mode: Mode::Vocal, since_ms: 0.0 }),
            ..Default::default()
        };
        let (next, decision) = step(&state, &quiet(), 300.0);
        assert_eq!(decision.mode, Mode::Full);
        assert!(next.pending.is_none());
    }

    #[test]
    fn from_frame_measures_both_bands() {
        // 10 Hz bins: vocal band is bins 30..=150, high band 300..=800.
        let mut magnitudes = vec![0u8; 1024];
        magnitudes[44] = 255;
        for m in &mut magnitudes[300..=800] {
            *m = 51;
        }
        let frame = FrequencyFrame::new(magnitudes, 20480.0, 2048);
        let input = ClassifierInput::from_frame(&frame);
        assert_eq!(input.vocal_dominant.frequency_hz, 440.0);
        assert!((input.high_energy - 0.2).abs() < 1e-6);
        assert!((input.vocal_energy - 1.0 / 121.0).abs() < 1e-6);
    }
}
