pub mod decode;
pub mod sampler;
pub mod playback;

pub use decode::{decode_file, check_audio_file, DecodeError, DecodedAudio};
pub use sampler::FrequencySampler;
pub use playback::AudioPlayback;

/// One analyser snapshot: byte magnitudes per bin, as produced for a single tick.
#[derive(Debug, Clone)]
pub struct FrequencyFrame {
    pub magnitudes: Vec<u8>,
    pub sample_rate: f32,
    pub fft_size: usize,
}

impl FrequencyFrame {
    pub fn new(magnitudes: Vec<u8>, sample_rate: f32, fft_size: usize) -> Self {
        Self {
            magnitudes,
            sample_rate,
            fft_size,
        }
    }

    /// Width of one bin in Hz.
    pub fn bin_hz(&self) -> f32 {
        self.sample_rate / self.fft_size as f32
    }

    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    /// Magnitude at `index`, reading past the end as silence.
    pub fn magnitude(&self, index: usize) -> u8 {
        self.magnitudes.get(index).copied().unwrap_or(0)
    }
}

impl Default for FrequencyFrame {
    fn default() -> Self {
        Self {
            magnitudes: vec![0; 1024],
            sample_rate: 44100.0,
            fft_size: 2048,
        }
    }
}
