//! Append-only record of analysed files.

pub mod api;
pub mod store;

pub use api::{handle, ApiError, ApiResponse};
pub use store::{HistoryError, HistoryStore, JsonHistoryStore, MemoryHistoryStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub file_name: String,
    pub bpm: String,
    pub timestamp: DateTime<Utc>,
}

/// Fields supplied by the caller; id and timestamp are assigned on append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAnalysis {
    pub file_name: String,
    pub bpm: String,
}

impl NewAnalysis {
    pub fn new(file_name: impl Into<String>, bpm: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            bpm: bpm.into(),
        }
    }

    pub(crate) fn into_record(self) -> AnalysisRecord {
        AnalysisRecord {
            id: Uuid::new_v4(),
            file_name: self.file_name,
            bpm: self.bpm,
            timestamp: Utc::now(),
        }
    }
}
