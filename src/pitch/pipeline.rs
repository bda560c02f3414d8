use log::trace;

use super::tracker::{PitchTracker, TrackedFrame};
use super::PitchSlot;
use crate::audio::sampler::DEFAULT_FFT_SIZE;
use crate::audio::{FrequencyFrame, FrequencySampler};

/// Sampler, tracker and slot wired together for one loaded track.
pub struct PitchPipeline {
    sampler: FrequencySampler,
    tracker: PitchTracker,
    slot: PitchSlot,
    last_frame: FrequencyFrame,
}

impl PitchPipeline {
    pub fn new(sample_rate: u32, sensitivity: f32, slot: PitchSlot) -> Self {
        let sampler = FrequencySampler::new(sample_rate as f32, DEFAULT_FFT_SIZE);
        let last_frame = FrequencyFrame::new(
            vec![0; sampler.bin_count()],
            sample_rate as f32,
            DEFAULT_FFT_SIZE,
        );
        Self {
            sampler,
            tracker: PitchTracker::new(sensitivity),
            slot,
            last_frame,
        }
    }

    pub fn slot(&self) -> &PitchSlot {
        &self.slot
    }

    pub fn tracker(&self) -> &PitchTracker {
        &self.tracker
    }

    pub fn set_sensitivity(&mut self, sensitivity: f32) {
        self.tracker.set_sensitivity(sensitivity);
    }

    /// Spectrum from the most recent frame.
    pub fn last_frame(&self) -> &FrequencyFrame {
        &self.last_frame
    }

    /// Analyses the window ending at `position` and publishes the result.
    pub fn run(&mut self, samples: &[f32], position: usize, now_ms: f64) -> TrackedFrame {
        let frame = self.sampler.sample(samples, position);
        let tracked = self.tracker.process(&frame, now_ms);
        if let Some(sample) = &tracked.sample {
            trace!("{:.1} Hz {} vocal={}", sample.frequency_hz, sample.note, sample.is_vocal);
        }
        self.slot.publish(tracked.sample.clone());
        self.last_frame = frame;
        tracked
    }

    pub fn reset(&mut self) {
        self.sampler.reset();
        self.tracker.reset();
        self.slot.clear();
        self.last_frame.magnitudes.fill(0);
    }
}
