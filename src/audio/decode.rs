use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

/// Extensions accepted before any decoding is attempted.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "m4a", "aac", "mp4"];

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Please upload a valid audio file (MP3, WAV, FLAC, OGG, M4A)")]
    UnsupportedType,
    #[error("The selected file is empty")]
    EmptyFile,
    #[error("Failed to read audio file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode audio: {0}")]
    Codec(#[from] symphonia::core::errors::Error),
    #[error("No audio tracks found")]
    NoTrack,
    #[error("Unknown sample rate")]
    UnknownSampleRate,
    #[error("Audio file contains no samples")]
    NoSamples,
}

/// Fully decoded file. `interleaved` feeds playback, `mono` feeds analysis.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub file_name: String,
    pub interleaved: Vec<f32>,
    pub mono: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration_secs(&self) -> f32 {
        self.mono.len() as f32 / self.sample_rate as f32
    }
}

/// Rejects files by type and size before they reach the decoder.
pub fn check_audio_file(path: &Path) -> Result<(), DecodeError> {
    let supported = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
    if !supported {
        return Err(DecodeError::UnsupportedType);
    }

    let metadata = std::fs::metadata(path)?;
    if metadata.len() == 0 {
        return Err(DecodeError::EmptyFile);
    }
    Ok(())
}

pub fn decode_file(path: &Path) -> Result<DecodedAudio, DecodeError> {
    check_audio_file(path)?;

    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count()).max(1);
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(DecodeError::UnknownSampleRate)?;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut interleaved: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(msg)) => {
                log::debug!("Skipping undecodable packet: {}", msg);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        interleaved.extend_from_slice(sample_buf.samples());
    }

    if interleaved.is_empty() {
        return Err(DecodeError::NoSamples);
    }

    let mono = downmix(&interleaved, channels);
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    log::info!(
        "Decoded {}: {} frames, {} channel(s), {}Hz, {:.1}s",
        file_name,
        mono.len(),
        channels,
        sample_rate,
        mono.len() as f32 / sample_rate as f32
    );

    Ok(DecodedAudio {
        file_name,
        interleaved,
        mono,
        channels: channels as u16,
        sample_rate,
    })
}

fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
