//! Filesystem result store: one directory per process id under a shared
//! root, holding the input image, the exported artifacts and `record.json`.
//!
//! Each request only ever touches its own directory, so nothing here locks.
//! Directories are never evicted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use threedai_backend::BackendChoice;
use uuid::Uuid;

pub const INPUT_FILE: &str = "input.jpg";
pub const RECORD_FILE: &str = "record.json";
pub const WORK_DIR: &str = "native";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid process id {0:?}")]
    InvalidId(String),
    #[error("no record for process {0}")]
    UnknownProcess(String),
    #[error("{op} {path:?}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("record {path:?} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// True when the id does not name a stored process.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::InvalidId(_) | StoreError::UnknownProcess(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Pending,
    Done,
    Failed,
}

/// Artifact file names for one process, fixed when the record is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    pub video_file: String,
    pub model_file: String,
}

impl ArtifactLayout {
    pub fn new(video_file: impl Into<String>, model_file: impl Into<String>) -> Self {
        Self {
            video_file: video_file.into(),
            model_file: model_file.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRecord {
    pub process_id: String,
    pub backend: BackendChoice,
    pub status: ProcessStatus,
    pub input_file: String,
    pub video_file: String,
    pub model_file: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            op: "create results root",
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn new_process_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Directory for `process_id`. Only UUIDs are accepted, so an id can
    /// never point outside the root.
    pub fn process_dir(&self, process_id: &str) -> Result<PathBuf, StoreError> {
        let id = Uuid::parse_str(process_id.trim())
            .map_err(|_| StoreError::InvalidId(process_id.to_string()))?;
        Ok(self.root.join(id.to_string()))
    }

    pub fn allocate(&self, process_id: &str) -> Result<PathBuf, StoreError> {
        let dir = self.process_dir(process_id)?;
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            op: "create process dir",
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    pub fn save_input(&self, process_id: &str, image: &[u8]) -> Result<PathBuf, StoreError> {
        let path = self.allocate(process_id)?.join(INPUT_FILE);
        std::fs::write(&path, image).map_err(|source| StoreError::Io {
            op: "write input",
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Scratch directory for a backend's native outputs.
    pub fn work_dir(&self, process_id: &str) -> Result<PathBuf, StoreError> {
        Ok(self.process_dir(process_id)?.join(WORK_DIR))
    }

    pub fn create_record(
        &self,
        process_id: &str,
        backend: BackendChoice,
        layout: &ArtifactLayout,
    ) -> Result<ProcessRecord, StoreError> {
        let dir = self.allocate(process_id)?;
        let now = Utc::now();
        let record = ProcessRecord {
            process_id: dir_name(&dir),
            backend,
            status: ProcessStatus::Pending,
            input_file: INPUT_FILE.to_string(),
            video_file: layout.video_file.clone(),
            model_file: layout.model_file.clone(),
            created_at: now,
            updated_at: now,
            error: None,
        };
        self.write_record(&dir, &record)?;
        Ok(record)
    }

    pub fn record(&self, process_id: &str) -> Result<ProcessRecord, StoreError> {
        let path = self.process_dir(process_id)?.join(RECORD_FILE);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::UnknownProcess(process_id.to_string()));
            }
            Err(source) => {
                return Err(StoreError::Io {
                    op: "read record",
                    path,
                    source,
                })
            }
        };
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt { path, source })
    }

    pub fn mark_done(&self, process_id: &str) -> Result<ProcessRecord, StoreError> {
        self.update(process_id, ProcessStatus::Done, None)
    }

    pub fn mark_failed(&self, process_id: &str, error: &str) -> Result<ProcessRecord, StoreError> {
        self.update(process_id, ProcessStatus::Failed, Some(error.to_string()))
    }

    pub fn video_path(&self, process_id: &str) -> Result<PathBuf, StoreError> {
        let record = self.record(process_id)?;
        Ok(self.process_dir(process_id)?.join(record.video_file))
    }

    pub fn model_path(&self, process_id: &str) -> Result<PathBuf, StoreError> {
        let record = self.record(process_id)?;
        Ok(self.process_dir(process_id)?.join(record.model_file))
    }

    fn update(
        &self,
        process_id: &str,
        status: ProcessStatus,
        error: Option<String>,
    ) -> Result<ProcessRecord, StoreError> {
        let mut record = self.record(process_id)?;
        record.status = status;
        record.error = error;
        record.updated_at = Utc::now();
        self.write_record(&self.process_dir(process_id)?, &record)?;
        Ok(record)
    }

    fn write_record(&self, dir: &Path, record: &ProcessRecord) -> Result<(), StoreError> {
        let path = dir.join(RECORD_FILE);
        let json = serde_json::to_vec_pretty(record).map_err(|source| StoreError::Corrupt {
            path: path.clone(),
            source,
        })?;
        // Write-then-rename so readers never see a half-written record.
        let tmp = dir.join(format!("{RECORD_FILE}.tmp"));
        std::fs::write(&tmp, json).map_err(|source| StoreError::Io {
            op: "write record",
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| StoreError::Io {
            op: "replace record",
            path,
            source,
        })
    }
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
