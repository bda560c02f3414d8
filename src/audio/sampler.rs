use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::FrequencyFrame;

pub const DEFAULT_FFT_SIZE: usize = 2048;
const SMOOTHING_TIME_CONSTANT: f32 = 0.8;
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

/// Byte-scaled spectrum analyser over a decoded mono buffer.
///
/// Each call to [`FrequencySampler::sample`] looks at the `fft_size` samples
/// that end at the current playback position, applies a Blackman window,
/// blends the magnitudes with the previous tick (time constant 0.8) and maps
/// the -100..-30 dB range onto 0..=255.
pub struct FrequencySampler {
    sample_rate: f32,
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
}

impl FrequencySampler {
    pub fn new(sample_rate: f32, fft_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            sample_rate,
            fft_size,
            fft,
            window: Self::blackman_window(fft_size),
            smoothed: vec![0.0; fft_size / 2],
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
        }
    }

    fn blackman_window(size: usize) -> Vec<f32> {
        let alpha = 0.16;
        let a0 = 0.5 * (1.0 - alpha);
        let a1 = 0.5;
        let a2 = 0.5 * alpha;
        (0..size)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
                a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos()
            })
            .collect()
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn bin_hz(&self) -> f32 {
        self.sample_rate / self.fft_size as f32
    }

    /// Forget the smoothing history, e.g. when playback restarts.
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Analyse the window ending at `position` (a frame index into `samples`).
    pub fn sample(&mut self, samples: &[f32], position: usize) -> FrequencyFrame {
        let end = position.min(samples.len());
        let start = end.saturating_sub(self.fft_size);
        let available = &samples[start..end];
        let pad = self.fft_size - available.len();

        for (i, slot) in self.scratch.iter_mut().enumerate() {
            let value = if i < pad { 0.0 } else { available[i - pad] };
            *slot = Complex::new(value * self.window[i], 0.0);
        }

        self.fft.process(&mut self.scratch);

        let norm = 1.0 / self.fft_size as f32;
        let range = MAX_DECIBELS - MIN_DECIBELS;
        let magnitudes = self
            .scratch
            .iter()
            .take(self.fft_size / 2)
            .zip(self.smoothed.iter_mut())
            .map(|(bin, previous)| {
                let magnitude = bin.norm() * norm;
                *previous = SMOOTHING_TIME_CONSTANT * *previous
                    + (1.0 - SMOOTHING_TIME_CONSTANT) * magnitude;
                if *previous <= 0.0 {
                    return 0u8;
                }
                let db = 20.0 * previous.log10();
                (255.0 * (db - MIN_DECIBELS) / range).clamp(0.0, 255.0) as u8
            })
            .collect();

        FrequencyFrame::new(magnitudes, self.sample_rate, self.fft_size)
    }
}
