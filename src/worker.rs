//! Background decoding and tempo estimation.
//!
//! The worker owns a small tokio runtime on its own thread. Requests and
//! results travel over crossbeam channels so the frame loop only ever does a
//! non-blocking `try_recv`.

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::audio::{decode_file, DecodedAudio};
use crate::tempo::TempoEstimator;

pub enum AnalysisEvent {
    /// Decoded and tempo estimated; ready to play.
    Ready { audio: Arc<DecodedAudio>, bpm: f32 },
    Failed { file_name: String, reason: String },
}

pub struct AnalysisWorker {
    requests: Option<Sender<PathBuf>>,
    results: Receiver<AnalysisEvent>,
    handle: Option<JoinHandle<()>>,
}

impl AnalysisWorker {
    pub fn spawn(estimator: Arc<dyn TempoEstimator>) -> Result<Self> {
        let (request_tx, request_rx) = crossbeam_channel::unbounded::<PathBuf>();
        let (result_tx, result_rx) = crossbeam_channel::unbounded();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to build analysis runtime")?;

        let handle = std::thread::Builder::new()
            .name("analysis".into())
            .spawn(move || {
                while let Ok(path) = request_rx.recv() {
                    let event = runtime.block_on(analyze(path, estimator.as_ref()));
                    if result_tx.send(event).is_err() {
                        break;
                    }
                }
                info!("Analysis worker stopped");
            })
            .context("Failed to spawn analysis thread")?;

        Ok(Self {
            requests: Some(request_tx),
            results: result_rx,
            handle: Some(handle),
        })
    }

    pub fn submit(&self, path: PathBuf) -> Result<()> {
        info!("Queued analysis of {}", path.display());
        self.requests
            .as_ref()
            .context("Analysis worker is shut down")?
            .send(path)
            .context("Analysis worker is not running")
    }

    /// Next finished result, if any. Never blocks.
    pub fn poll(&self) -> Option<AnalysisEvent> {
        self.results.try_recv().ok()
    }

    pub fn wait(&self, timeout: Duration) -> Option<AnalysisEvent> {
        match self.results.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) => {
                warn!("Analysis did not finish within {:?}", timeout);
                None
            }
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for AnalysisWorker {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop.
        self.requests.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Analysis thread panicked");
            }
        }
    }
}

async fn analyze(path: PathBuf, estimator: &dyn TempoEstimator) -> AnalysisEvent {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let decoded = tokio::task::spawn_blocking(move || decode_file(&path)).await;
    let audio = match decoded {
        Ok(Ok(audio)) => Arc::new(audio),
        Ok(Err(e)) => {
            warn!("Could not decode {}: {}", file_name, e);
            return AnalysisEvent::Failed {
                file_name,
                reason: e.to_string(),
            };
        }
        Err(e) => {
            error!("Decode task failed for {}: {}", file_name, e);
            return AnalysisEvent::Failed {
                file_name,
                reason: "Decoding was interrupted".into(),
            };
        }
    };

    match estimator.estimate(&audio.mono, audio.sample_rate).await {
        Ok(bpm) => AnalysisEvent::Ready { audio, bpm },
        Err(e) => {
            warn!("Tempo estimation failed for {}: {}", file_name, e);
            AnalysisEvent::Failed {
                file_name,
                reason: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tempo::{OnsetTempoEstimator, TempoError};
    use async_trait::async_trait;
    use std::path::Path;

    struct FixedTempo(f32);

    #[async_trait]
    impl TempoEstimator for FixedTempo {
        async fn estimate(&self, _: &[f32], _: u32) -> Result<f32, TempoError> {
            Ok(self.0)
        }
    }

    fn write_click_wav(path: &Path, bpm: f32, seconds: f32) {
        let rate = 22050u32;
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let beat = (rate as f32 * 60.0 / bpm) as usize;
        let click = rate as usize / 100;
        for i in 0..(rate as f32 * seconds) as usize {
            let offset = i % beat;
            let s = if offset < click {
                let t = offset as f32 / rate as f32;
                (2.0 * std::f32::consts::PI * 1000.0 * t).sin() * (1.0 - offset as f32 / click as f32)
            } else {
                0.0
            };
            writer.write_sample((s * 20000.0) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn decodes_and_estimates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clicks.wav");
        write_click_wav(&path, 120.0, 10.0);

        let worker = AnalysisWorker::spawn(Arc::new(OnsetTempoEstimator::new())).unwrap();
        worker.submit(path).unwrap();
        match worker.wait(Duration::from_secs(30)) {
            Some(AnalysisEvent::Ready { audio, bpm }) => {
                assert_eq!(audio.file_name, "clicks.wav");
                assert!((bpm - 120.0).abs() < 3.0, "got {bpm}");
            }
            Some(AnalysisEvent::Failed { reason, .. }) => panic!("analysis failed: {reason}"),
            None => panic!("no result"),
        }
    }

    #[test]
    fn unsupported_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "la la la").unwrap();

        let worker = AnalysisWorker::spawn(Arc::new(FixedTempo(100.0))).unwrap();
        worker.submit(path).unwrap();
        match worker.wait(Duration::from_secs(10)) {
            Some(AnalysisEvent::Failed { file_name, .. }) => assert_eq!(file_name, "notes.txt"),
            _ => panic!("expected failure"),
        }
        assert!(worker.poll().is_none());
    }

    #[test]
    fn results_arrive_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.wav");
        let b = dir.path().join("b.wav");
        write_click_wav(&a, 100.0, 1.0);
        write_click_wav(&b, 100.0, 1.0);

        let worker = AnalysisWorker::spawn(Arc::new(FixedTempo(99.0))).unwrap();
        worker.submit(a).unwrap();
        worker.submit(b).unwrap();
        let names: Vec<String> = (0..2)
            .filter_map(|_| match worker.wait(Duration::from_secs(10)) {
                Some(AnalysisEvent::Ready { audio, .. }) => Some(audio.file_name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["a.wav", "b.wav"]);
    }
}
