//! Whole-track tempo estimation.
//!
//! The estimator runs once per loaded file on the analysis worker and only
//! feeds the history record and the beat pulse. It never blocks the frame
//! loop.

use async_trait::async_trait;
use log::{debug, info};
use rustfft::{num_complex::Complex, FftPlanner};
use thiserror::Error;

const FFT_SIZE: usize = 1024;
const HOP_SIZE: usize = 512;
const PEAK_WINDOW: usize = 20;
const MIN_ONSET_GAP_SECS: f32 = 0.1;
const MIN_BPM: f32 = 60.0;
const MAX_BPM: f32 = 200.0;

#[derive(Debug, Error)]
pub enum TempoError {
    #[error("no audio samples to analyze")]
    Empty,
    #[error("could not detect a steady beat")]
    NotDetected,
}

/// Produces a single tempo figure for a decoded track.
///
/// Implementations must be `Send + Sync` so the worker can hold them behind
/// an `Arc` and call them from its tokio runtime.
#[async_trait]
pub trait TempoEstimator: Send + Sync {
    /// Beats per minute of the mono `samples`.
    async fn estimate(&self, samples: &[f32], sample_rate: u32) -> Result<f32, TempoError>;
}

/// Spectral-flux onset picking followed by a median inter-onset interval.
#[derive(Debug, Default, Clone, Copy)]
pub struct OnsetTempoEstimator;

impl OnsetTempoEstimator {
    pub fn new() -> Self {
        Self
    }

    /// `(time_secs, flux)` per hop.
    fn spectral_flux(samples: &[f32], sample_rate: u32) -> Vec<(f32, f32)> {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        let window = hann_window(FFT_SIZE);

        let mut previous = vec![0.0f32; FFT_SIZE / 2];
        let mut flux_values = Vec::new();
        let mut buffer = vec![Complex::new(0.0f32, 0.0); FFT_SIZE];

        let mut pos = 0;
        while pos + FFT_SIZE <= samples.len() {
            for (slot, (sample, w)) in buffer
                .iter_mut()
                .zip(samples[pos..pos + FFT_SIZE].iter().zip(&window))
            {
                *slot = Complex::new(sample * w, 0.0);
            }
            fft.process(&mut buffer);

            let mut flux = 0.0;
            for (bin, prev) in buffer[..FFT_SIZE / 2].iter().zip(previous.iter_mut()) {
                let magnitude = bin.norm();
                flux += (magnitude - *prev).max(0.0);
                *prev = magnitude;
            }

            flux_values.push((pos as f32 / sample_rate as f32, flux));
            pos += HOP_SIZE;
        }

        flux_values
    }

    /// Local flux peaks above an adaptive threshold, at least 100ms apart.
    fn onsets(flux_values: &[(f32, f32)]) -> Vec<f32> {
        let mut onsets: Vec<f32> = Vec::new();

        for i in 0..flux_values.len() {
            let start = i.saturating_sub(PEAK_WINDOW);
            let end = (i + PEAK_WINDOW + 1).min(flux_values.len());
            let local_mean = flux_values[start..end].iter().map(|(_, f)| f).sum::<f32>()
                / (end - start) as f32;

            let (time, flux) = flux_values[i];
            if flux <= local_mean * 1.5 + 0.01 {
                continue;
            }

            let is_peak = (i == 0 || flux >= flux_values[i - 1].1)
                && (i + 1 == flux_values.len() || flux >= flux_values[i + 1].1);
            let far_enough = onsets
                .last()
                .map_or(true, |&last| time - last > MIN_ONSET_GAP_SECS);

            if is_peak && far_enough {
                onsets.push(time);
            }
        }

        onsets
    }

    fn tempo_from_onsets(onsets: &[f32]) -> Result<f32, TempoError> {
        if onsets.len() < 2 {
            return Err(TempoError::NotDetected);
        }

        let min_interval = 60.0 / MAX_BPM;
        let max_interval = 60.0 / MIN_BPM;
        let mut intervals: Vec<f32> = onsets
            .windows(2)
            .map(|w| w[1] - w[0])
            .filter(|i| (min_interval..=max_interval).contains(i))
            .collect();
        if intervals.is_empty() {
            return Err(TempoError::NotDetected);
        }

        intervals.sort_by(|a, b| a.total_cmp(b));
        let median = intervals[intervals.len() / 2];

        // Hop quantisation splits one beat length across neighbouring values;
        // averaging those near the median recovers it.
        let near: Vec<f32> = intervals
            .iter()
            .copied()
            .filter(|i| (i - median).abs() <= median * 0.15)
            .collect();
        let interval = near.iter().sum::<f32>() / near.len() as f32;

        Ok(60.0 / interval)
    }
}

#[async_trait]
impl TempoEstimator for OnsetTempoEstimator {
    async fn estimate(&self, samples: &[f32], sample_rate: u32) -> Result<f32, TempoError> {
        if samples.is_empty() || sample_rate == 0 {
            return Err(TempoError::Empty);
        }

        let flux = Self::spectral_flux(samples, sample_rate);
        let onsets = Self::onsets(&flux);
        debug!("{} onsets over {} flux frames", onsets.len(), flux.len());

        let bpm = Self::tempo_from_onsets(&onsets)?;
        info!("Estimated tempo: {:.1} BPM", bpm);
        Ok(bpm)
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click_track(bpm: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let total = (sample_rate as f32 * seconds) as usize;
        let beat = (sample_rate as f32 * 60.0 / bpm) as usize;
        let click_len = sample_rate as usize / 100;
        let mut samples = vec![0.0f32; total];
        let mut start = beat / 4;
        while start + click_len < total {
            for i in 0..click_len {
                let t = i as f32 / sample_rate as f32;
                let decay = 1.0 - i as f32 / click_len as f32;
                samples[start + i] = (2.0 * std::f32::consts::PI * 1000.0 * t).sin() * 0.8 * decay;
            }
            start += beat;
        }
        samples
    }

    #[tokio::test]
    async fn finds_tempo_of_click_track() {
        let samples = click_track(120.0, 22050, 12.0);
        let bpm = OnsetTempoEstimator::new().estimate(&samples, 22050).await.unwrap();
        assert!((bpm - 120.0).abs() < 3.0, "got {bpm}");
    }

    #[tokio::test]
    async fn slower_track() {
        let samples = click_track(90.0, 22050, 15.0);
        let bpm = OnsetTempoEstimator::new().estimate(&samples, 22050).await.unwrap();
        assert!((bpm - 90.0).abs() < 3.0, "got {bpm}");
    }

    #[tokio::test]
    async fn silence_has_no_tempo() {
        let samples = vec![0.0f32; 22050 * 5];
        let result = OnsetTempoEstimator::new().estimate(&samples, 22050).await;
        assert!(matches!(result, Err(TempoError::NotDetected)));
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        let result = OnsetTempoEstimator::new().estimate(&[], 44100).await;
        assert!(matches!(result, Err(TempoError::Empty)));
    }

    #[test]
    fn intervals_outside_range_are_ignored() {
        // 0.1s apart is 600 BPM; only the 0.5s gaps count.
        let onsets = [0.0, 0.1, 0.6, 1.1, 1.6];
        let bpm = OnsetTempoEstimator::tempo_from_onsets(&onsets).unwrap();
        assert!((bpm - 120.0).abs() < 1e-3);

        assert!(OnsetTempoEstimator::tempo_from_onsets(&[0.0, 0.1]).is_err());
        assert!(OnsetTempoEstimator::tempo_from_onsets(&[1.0]).is_err());
    }
}
