use crate::audio::FrequencyFrame;
use serde::Serialize;

/// Inclusive range of FFT bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinRange {
    pub start: usize,
    pub end: usize,
}

impl BinRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Bins covering `min_hz..=max_hz`, widened outward to whole bins and
    /// clipped to the frame.
    pub fn for_band(frame: &FrequencyFrame, min_hz: f32, max_hz: f32) -> Self {
        let bin_hz = frame.bin_hz();
        let last = frame.len().saturating_sub(1);
        let start = (min_hz / bin_hz).floor().max(0.0) as usize;
        let end = ((max_hz / bin_hz).ceil().max(0.0) as usize).min(last);
        Self { start, end }
    }

    pub fn full(frame: &FrequencyFrame) -> Self {
        Self {
            start: 0,
            end: frame.len().saturating_sub(1),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.end - self.start + 1
        }
    }
}

/// Loudest bin inside a band. The zero value means "no signal".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DominantCandidate {
    pub frequency_hz: f32,
    pub amplitude: f32,
}

impl DominantCandidate {
    pub fn has_signal(&self) -> bool {
        self.frequency_hz > 0.0 && self.amplitude > 0.0
    }
}

/// Finds the bin with the strictly largest magnitude; the first maximum wins.
pub fn dominant_frequency(frame: &FrequencyFrame, range: BinRange) -> DominantCandidate {
    let mut max_amp = 0u8;
    let mut max_index: Option<usize> = None;

    if !range.is_empty() {
        for i in range.start..=range.end {
            let amp = frame.magnitude(i);
            if amp > max_amp {
                max_amp = amp;
                max_index = Some(i);
            }
        }
    }

    match max_index {
        Some(index) => DominantCandidate {
            frequency_hz: index as f32 * frame.bin_hz(),
            amplitude: max_amp as f32 / 255.0,
        },
        None => DominantCandidate::default(),
    }
}

/// Mean normalized magnitude (0.0-1.0) over the range.
pub fn band_energy(frame: &FrequencyFrame, range: BinRange) -> f32 {
    if range.is_empty() {
        return 0.0;
    }
    let sum: u32 = (range.start..=range.end)
        .map(|i| frame.magnitude(i) as u32)
        .sum();
    sum as f32 / range.len() as f32 / 255.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(magnitudes: Vec<u8>) -> FrequencyFrame {
        // 10 Hz per bin keeps the arithmetic readable.
        FrequencyFrame::new(magnitudes, 20480.0, 2048)
    }

    #[test]
    fn picks_loudest_bin() {
        let f = frame(vec![0, 10, 200, 40, 0]);
        let d = dominant_frequency(&f, BinRange::full(&f));
        assert_eq!(d.frequency_hz, 20.0);
        assert!((d.amplitude - 200.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn ties_keep_lowest_index() {
        let f = frame(vec![0, 90, 90, 90]);
        let d = dominant_frequency(&f, BinRange::full(&f));
        assert_eq!(d.frequency_hz, 10.0);
    }

    #[test]
    fn all_zero_is_no_signal() {
        let f = frame(vec![0; 16]);
        let d = dominant_frequency(&f, BinRange::full(&f));
        assert_eq!(d, DominantCandidate::default());
        assert!(!d.has_signal());
    }

    #[test]
    fn empty_range_is_no_signal() {
        let f = frame(vec![255; 16]);
        let d = dominant_frequency(&f, BinRange::new(5, 4));
        assert_eq!(d, DominantCandidate::default());
        assert_eq!(band_energy(&f, BinRange::new(5, 4)), 0.0);
    }

    #[test]
    fn range_is_respected() {
        let f = frame(vec![250, 0, 0, 30, 60, 0]);
        let d = dominant_frequency(&f, BinRange::new(2, 5));
        assert_eq!(d.frequency_hz, 40.0);
    }

    #[test]
    fn band_range_rounds_outward_and_clips() {
        let f = frame(vec![0; 100]);
        let r = BinRange::for_band(&f, 305.0, 1495.0);
        assert_eq!(r, BinRange::new(30, 99));
        let r = BinRange::for_band(&f, 35.0, 75.0);
        assert_eq!(r, BinRange::new(3, 8));
    }

    #[test]
    fn band_energy_is_normalized_mean() {
        let f = frame(vec![255, 0, 255, 0]);
        assert!((band_energy(&f, BinRange::full(&f)) - 0.5).abs() < 1e-6);
        assert!((band_energy(&f, BinRange::new(0, 0)) - 1.0).abs() < 1e-6);
    }
}
