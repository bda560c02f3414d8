use log::{info, warn};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::{AnalysisRecord, NewAnalysis};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub trait HistoryStore {
    /// Stores a new record, returning it with its id and timestamp.
    fn append(&mut self, analysis: NewAnalysis) -> Result<AnalysisRecord, HistoryError>;

    /// Every record in insertion order.
    fn list_all(&self) -> Vec<AnalysisRecord>;
}

#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    records: Vec<AnalysisRecord>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn append(&mut self, analysis: NewAnalysis) -> Result<AnalysisRecord, HistoryError> {
        let record = analysis.into_record();
        self.records.push(record.clone());
        Ok(record)
    }

    fn list_all(&self) -> Vec<AnalysisRecord> {
        self.records.clone()
    }
}

/// History kept as a JSON array on disk.
///
/// A missing or unreadable file opens as an empty history. Appends rewrite
/// the whole file through a temporary file and a rename, and the in-memory
/// list only changes once that write has succeeded.
#[derive(Debug)]
pub struct JsonHistoryStore {
    path: PathBuf,
    records: Vec<AnalysisRecord>,
}

impl JsonHistoryStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = Self::load(&path);
        info!("Loaded {} history record(s) from {}", records.len(), path.display());
        Self { path, records }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Vec<AnalysisRecord> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!("Could not read history {}: {}", path.display(), e);
                return Vec::new();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(records) => records,
            Err(e) => {
                warn!("Ignoring corrupt history {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }

    fn write(&self, records: &[AnalysisRecord]) -> Result<(), HistoryError> {
        let io_err = |source| HistoryError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(records)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

impl HistoryStore for JsonHistoryStore {
    fn append(&mut self, analysis: NewAnalysis) -> Result<AnalysisRecord, HistoryError> {
        let record = analysis.into_record();
        let mut next = self.records.clone();
        next.push(record.clone());
        self.write(&next)?;
        self.records = next;
        Ok(record)
    }

    fn list_all(&self) -> Vec<AnalysisRecord> {
        self.records.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");

        let mut store = JsonHistoryStore::open(&path);
        assert!(store.list_all().is_empty());
        let first = store.append(NewAnalysis::new("track.mp3", "128")).unwrap();
        let second = store.append(NewAnalysis::new("other.wav", "96")).unwrap();

        let reopened = JsonHistoryStore::open(&path);
        let records = reopened.list_all();
        assert_eq!(records, vec![first.clone(), second]);
        assert_eq!(records[0].file_name, "track.mp3");
        assert_eq!(records[0].bpm, "128");
        assert_ne!(records[0].id, records[1].id);
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "{ not json").unwrap();

        let mut store = JsonHistoryStore::open(&path);
        assert!(store.list_all().is_empty());

        // The next append replaces the corrupt file.
        store.append(NewAnalysis::new("a.mp3", "120")).unwrap();
        assert_eq!(JsonHistoryStore::open(&path).list_all().len(), 1);
    }

    #[test]
    fn failed_write_leaves_list_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the rename fail.
        let path = dir.path().join("history.json");
        std::fs::create_dir(&path).unwrap();

        let mut store = JsonHistoryStore::open(&path);
        assert!(store.append(NewAnalysis::new("a.mp3", "120")).is_err());
        assert!(store.list_all().is_empty());
    }

    #[test]
    fn memory_store_keeps_order() {
        let mut store = MemoryHistoryStore::new();
        store.append(NewAnalysis::new("1.mp3", "100")).unwrap();
        store.append(NewAnalysis::new("2.mp3", "110")).unwrap();
        let names: Vec<_> = store.list_all().into_iter().map(|r| r.file_name).collect();
        assert_eq!(names, vec!["1.mp3", "2.mp3"]);
    }
}
