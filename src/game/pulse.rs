const FLASH_MS: f64 = 100.0;

/// Flashes once per beat while a track with a known tempo is playing.
#[derive(Debug, Clone, Default)]
pub struct BeatPulse {
    bpm: Option<f32>,
    last_beat: Option<f64>,
}

impl BeatPulse {
    pub fn new(bpm: Option<f32>) -> Self {
        Self {
            bpm: bpm.filter(|b| b.is_finite() && *b > 0.0),
            last_beat: None,
        }
    }

    pub fn bpm(&self) -> Option<f32> {
        self.bpm
    }

    pub fn set_bpm(&mut self, bpm: Option<f32>) {
        *self = Self::new(bpm);
    }

    pub fn reset(&mut self) {
        self.last_beat = None;
    }

    /// Advances the pulse and returns whether it is lit at `now_ms`.
    pub fn update(&mut self, now_ms: f64, playing: bool) -> bool {
        let Some(bpm) = self.bpm else {
            return false;
        };
        if !playing {
            self.last_beat = None;
            return false;
        }

        let interval = 60_000.0 / bpm as f64;
        match self.last_beat {
            Some(last) if now_ms - last < interval => now_ms - last < FLASH_MS,
            _ => {
                self.last_beat = Some(now_ms);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flashes_on_each_beat() {
        // 120 BPM: one beat every 500ms.
        let mut pulse = BeatPulse::new(Some(120.0));
        assert!(pulse.update(0.0, true));
        assert!(pulse.update(50.0, true));
        assert!(!pulse.update(150.0, true));
        assert!(!pulse.update(499.0, true));
        assert!(pulse.update(500.0, true));
    }

    #[test]
    fn idle_without_tempo_or_playback() {
        let mut pulse = BeatPulse::new(None);
        assert!(!pulse.update(0.0, true));

        let mut pulse = BeatPulse::new(Some(90.0));
        assert!(!pulse.update(0.0, false));
        assert!(pulse.update(10.0, true));
    }

    #[test]
    fn rejects_nonsense_tempo() {
        assert_eq!(BeatPulse::new(Some(0.0)).bpm(), None);
        assert_eq!(BeatPulse::new(Some(f32::NAN)).bpm(), None);
    }
}
