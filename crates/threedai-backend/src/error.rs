use crate::asset::{BackendChoice, ExportFormat};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("unknown backend {0:?} (expected \"hunyuan\" or \"trellis\")")]
    UnknownBackend(String),
    #[error("unknown export format {0:?} (expected glb, ply, stl or step)")]
    UnknownFormat(String),
    #[error("backend {0} is not configured")]
    NotConfigured(BackendChoice),
    #[error("{backend} pipeline command is empty")]
    EmptyCommand { backend: BackendChoice },
    #[error("failed to launch {backend} pipeline {program:?}: {source}")]
    Spawn {
        backend: BackendChoice,
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{backend} pipeline exited with {status}: {stderr}")]
    PipelineFailed {
        backend: BackendChoice,
        status: String,
        stderr: String,
    },
    #[error("{backend} pipeline printed no manifest")]
    MissingManifest { backend: BackendChoice },
    #[error("{backend} pipeline manifest is invalid: {source}")]
    InvalidManifest {
        backend: BackendChoice,
        #[source]
        source: serde_json::Error,
    },
    #[error("{backend} pipeline produced a {actual} asset, expected {expected}")]
    UnexpectedAsset {
        backend: BackendChoice,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("{backend} pipeline output not found: {path:?}")]
    MissingOutput {
        backend: BackendChoice,
        path: PathBuf,
    },
    #[error("cannot export a {asset} asset as {format}")]
    UnsupportedExport {
        asset: &'static str,
        format: ExportFormat,
    },
    #[error("export to {path:?} failed: {reason}")]
    Export { path: PathBuf, reason: String },
    #[error("{op} {path:?}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
