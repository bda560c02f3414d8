use anyhow::{Context, Result};
use log::warn;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Where the best score survives between sessions.
pub trait HighScoreStore {
    fn load(&self) -> u32;
    fn save(&mut self, score: u32) -> Result<()>;
}

/// Plain-text file holding one integer. Missing or unreadable files count as 0.
pub struct FileHighScoreStore {
    path: PathBuf,
}

impl FileHighScoreStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl HighScoreStore for FileHighScoreStore {
    fn load(&self) -> u32 {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => content.trim().parse().unwrap_or_else(|_| {
                warn!("Ignoring unreadable high score in {}", self.path.display());
                0
            }),
            Err(_) => 0,
        }
    }

    fn save(&mut self, score: u32) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        // Write-then-rename so readers only ever see a whole value.
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, score.to_string())
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

/// In-memory store; clones share the same value.
#[derive(Debug, Clone, Default)]
pub struct MemoryHighScoreStore {
    value: Arc<Mutex<u32>>,
}

impl MemoryHighScoreStore {
    pub fn with_value(value: u32) -> Self {
        Self {
            value: Arc::new(Mutex::new(value)),
        }
    }

    pub fn get(&self) -> u32 {
        *self.value.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl HighScoreStore for MemoryHighScoreStore {
    fn load(&self) -> u32 {
        self.get()
    }

    fn save(&mut self, score: u32) -> Result<()> {
        *self.value.lock().unwrap_or_else(|e| e.into_inner()) = score;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("high-score");
        let mut store = FileHighScoreStore::new(&path);
        assert_eq!(store.load(), 0);

        store.save(120).unwrap();
        assert_eq!(FileHighScoreStore::new(&path).load(), 120);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn garbage_reads_as_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("high-score");
        std::fs::write(&path, "not a number").unwrap();
        assert_eq!(FileHighScoreStore::new(&path).load(), 0);
    }

    #[test]
    fn memory_store_clones_share_value() {
        let store = MemoryHighScoreStore::with_value(10);
        let mut writer = store.clone();
        writer.save(50).unwrap();
        assert_eq!(store.get(), 50);
    }
}
