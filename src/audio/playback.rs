use anyhow::{Context, Result};
use log::info;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::DecodedAudio;

/// Wall-clock playback position, resumable from an offset.
#[derive(Debug, Clone, Default)]
pub struct PlaybackClock {
    started_at: Option<Instant>,
    offset: Duration,
}

impl PlaybackClock {
    pub fn start(&mut self, now: Instant) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    pub fn pause(&mut self, now: Instant) {
        if let Some(started) = self.started_at.take() {
            self.offset += now.saturating_duration_since(started);
        }
    }

    pub fn stop(&mut self) {
        self.started_at = None;
        self.offset = Duration::ZERO;
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn position(&self, now: Instant) -> Duration {
        match self.started_at {
            Some(started) => self.offset + now.saturating_duration_since(started),
            None => self.offset,
        }
    }
}

pub struct AudioPlayback {
    #[allow(dead_code)]
    stream: OutputStream,
    stream_handle: OutputStreamHandle,
    sink: Option<Sink>,
    audio: Option<Arc<DecodedAudio>>,
    clock: PlaybackClock,
    volume: f32,
}

impl AudioPlayback {
    pub fn new() -> Result<Self> {
        let (stream, stream_handle) =
            OutputStream::try_default().context("No audio output device available")?;

        Ok(Self {
            stream,
            stream_handle,
            sink: None,
            audio: None,
            clock: PlaybackClock::default(),
            volume: 0.8,
        })
    }

    /// Replace the loaded track; playback is stopped and rewound.
    pub fn load(&mut self, audio: Arc<DecodedAudio>) {
        self.stop();
        info!(
            "Loaded audio: {} ({}Hz, {:.1}s)",
            audio.file_name,
            audio.sample_rate,
            audio.duration_secs()
        );
        self.audio = Some(audio);
    }

    /// Drop the loaded track entirely.
    pub fn unload(&mut self) {
        self.stop();
        self.audio = None;
    }

    pub fn audio(&self) -> Option<&Arc<DecodedAudio>> {
        self.audio.as_ref()
    }

    pub fn play(&mut self) -> Result<()> {
        let Some(audio) = self.audio.as_ref() else {
            return Ok(());
        };
        if self.clock.is_running() {
            return Ok(());
        }
        if self.is_finished() {
            self.clock.stop();
        }

        let channels = audio.channels.max(1) as usize;
        let start_frame = self.position_frame().min(audio.mono.len());
        let tail = audio.interleaved[start_frame * channels..].to_vec();

        let sink = Sink::try_new(&self.stream_handle).context("Failed to create audio sink")?;
        sink.set_volume(self.volume);
        sink.append(SamplesBuffer::new(audio.channels, audio.sample_rate, tail));
        sink.play();

        self.sink = Some(sink);
        self.clock.start(Instant::now());
        info!("Audio playback started at {:.2}s", self.position().as_secs_f32());
        Ok(())
    }

    pub fn pause(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
            self.clock.pause(Instant::now());
            info!("Audio playback paused at {:.2}s", self.position().as_secs_f32());
        }
    }

    pub fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
            info!("Audio playback stopped");
        }
        self.clock.stop();
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = &self.sink {
            sink.set_volume(self.volume);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.clock.is_running() && !self.is_finished()
    }

    pub fn is_finished(&self) -> bool {
        match &self.audio {
            Some(audio) => self.position().as_secs_f32() >= audio.duration_secs(),
            None => true,
        }
    }

    pub fn position(&self) -> Duration {
        self.clock.position(Instant::now())
    }

    /// Current position as an index into the mono buffer.
    pub fn position_frame(&self) -> usize {
        let rate = self.audio.as_ref().map_or(44100, |a| a.sample_rate);
        (self.position().as_secs_f64() * rate as f64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_accumulates_across_pause() {
        let t0 = Instant::now();
        let mut clock = PlaybackClock::default();
        clock.start(t0);
        clock.pause(t0 + Duration::from_millis(500));
        assert_eq!(clock.position(t0 + Duration::from_secs(10)), Duration::from_millis(500));

        let t1 = t0 + Duration::from_secs(2);
        clock.start(t1);
        assert_eq!(clock.position(t1 + Duration::from_millis(250)), Duration::from_millis(750));
    }

    #[test]
    fn stop_rewinds() {
        let t0 = Instant::now();
        let mut clock = PlaybackClock::default();
        clock.start(t0);
        clock.stop();
        assert!(!clock.is_running());
        assert_eq!(clock.position(t0 + Duration::from_secs(3)), Duration::ZERO);
    }

    #[test]
    fn start_twice_keeps_first_timestamp() {
        let t0 = Instant::now();
        let mut clock = PlaybackClock::default();
        clock.start(t0);
        clock.start(t0 + Duration::from_secs(1));
        assert_eq!(clock.position(t0 + Duration::from_secs(2)), Duration::from_secs(2));
    }
}
