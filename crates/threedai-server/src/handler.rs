//! Request handling independent of the HTTP transport.
//!
//! A process request moves through `received -> allocated -> generating`
//! and ends `completed` or `failed`; every transition is logged with its
//! process id.

use crate::admission::AdmissionGate;
use crate::config::ServerConfig;
use crate::store::{ArtifactLayout, ResultStore, StoreError};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use threedai_backend::{
    copy_artifact, BackendChoice, BackendError, Backends, ExportFormat, GenerationRequest,
};
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No image provided")]
    MissingImage,
    #[error("{0}")]
    UnknownBackend(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("upload exceeds {limit} bytes")]
    PayloadTooLarge { limit: u64 },
    #[error("{0}")]
    NotFound(&'static str),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn status(&self) -> u16 {
        match self {
            ApiError::MissingImage | ApiError::UnknownBackend(_) | ApiError::BadRequest(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::PayloadTooLarge { .. } => 413,
            ApiError::Backend(_) | ApiError::Store(_) => 500,
        }
    }
}

/// Parsed form fields of a process request.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub image: Option<Vec<u8>>,
    pub prompt: Option<String>,
    pub backend: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessResponse {
    pub process_id: String,
    pub video_url: String,
    pub model3d_url: String,
}

impl ProcessResponse {
    fn for_process(process_id: &str) -> Self {
        Self {
            process_id: process_id.to_string(),
            video_url: format!("/api/results/{process_id}/video"),
            model3d_url: format!("/api/results/{process_id}/model3d"),
        }
    }
}

/// A stored file ready to be streamed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub content_type: &'static str,
    /// Set when the file should be served as an attachment.
    pub download_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HandlerOptions {
    pub default_backend: BackendChoice,
    /// Overrides the backend's native format when set.
    pub export_format: Option<ExportFormat>,
    pub max_concurrent_generations: usize,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            default_backend: BackendChoice::Hunyuan,
            export_format: None,
            max_concurrent_generations: 0,
        }
    }
}

struct Inner {
    store: ResultStore,
    backends: Backends,
    options: HandlerOptions,
    gate: AdmissionGate,
}

/// Cheap to clone; every request thread holds its own handle.
#[derive(Clone)]
pub struct RequestHandler {
    inner: Arc<Inner>,
}

impl RequestHandler {
    pub fn new(store: ResultStore, backends: Backends, options: HandlerOptions) -> Self {
        let gate = AdmissionGate::new(options.max_concurrent_generations);
        Self {
            inner: Arc::new(Inner {
                store,
                backends,
                options,
                gate,
            }),
        }
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, StoreError> {
        let store = ResultStore::open(&config.results_dir)?;
        let options = HandlerOptions {
            default_backend: config.backend,
            export_format: config.export_format,
            max_concurrent_generations: config.max_concurrent_generations,
        };
        Ok(Self::new(store, config.build_backends(), options))
    }

    pub fn store(&self) -> &ResultStore {
        &self.inner.store
    }

    pub fn process(&self, upload: Upload) -> Result<ProcessResponse, ApiError> {
        let inner = &*self.inner;

        let image = match upload.image {
            Some(image) if !image.is_empty() => image,
            _ => return Err(ApiError::MissingImage),
        };
        let choice = match upload.backend.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name
                .parse::<BackendChoice>()
                .map_err(|e| ApiError::UnknownBackend(e.to_string()))?,
            _ => inner.options.default_backend,
        };
        let backend = inner.backends.get(choice)?;
        let prompt = upload.prompt.as_deref().map(str::trim).filter(|p| !p.is_empty());

        let process_id = ResultStore::new_process_id();
        info!(%process_id, backend = %choice, bytes = image.len(), "received");

        let dir = inner.store.allocate(&process_id)?;
        let input = inner.store.save_input(&process_id, &image)?;
        let format = inner
            .options
            .export_format
            .unwrap_or_else(|| backend.native_format());
        let layout = ArtifactLayout::new(backend.preview_video_name(), format.file_name());
        inner.store.create_record(&process_id, choice, &layout)?;
        info!(%process_id, dir = %dir.display(), %format, "allocated");

        let work_dir = inner.store.work_dir(&process_id)?;
        let request = GenerationRequest {
            image: &input,
            prompt,
            work_dir: &work_dir,
        };

        let outcome = {
            let _permit = inner.gate.acquire();
            info!(%process_id, active = inner.gate.active(), "generating");
            backend.generate(&request).and_then(|generation| {
                if let Some(video) = &generation.preview_video {
                    copy_artifact(video, &dir.join(&layout.video_file))?;
                } else {
                    warn!(%process_id, "backend produced no preview video");
                }
                backend.export(&generation.asset, format, &dir.join(&layout.model_file))
            })
        };

        match outcome {
            Ok(()) => {
                inner.store.mark_done(&process_id)?;
                info!(%process_id, "completed");
                Ok(ProcessResponse::for_process(&process_id))
            }
            Err(err) => {
                error!(%process_id, "failed: {err}");
                if let Err(store_err) = inner.store.mark_failed(&process_id, &err.to_string()) {
                    warn!(%process_id, "could not record failure: {store_err}");
                }
                Err(err.into())
            }
        }
    }

    pub fn video(&self, process_id: &str) -> Result<Artifact, ApiError> {
        let path = self.artifact_path(process_id, "Video not found", ResultStore::video_path)?;
        Ok(Artifact {
            path,
            content_type: "video/mp4",
            download_name: None,
        })
    }

    pub fn model(&self, process_id: &str) -> Result<Artifact, ApiError> {
        let path =
            self.artifact_path(process_id, "3D model not found", ResultStore::model_path)?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("bin")
            .to_string();
        Ok(Artifact {
            path,
            content_type: "application/octet-stream",
            download_name: Some(format!("model_{}.{ext}", process_id.trim())),
        })
    }

    fn artifact_path(
        &self,
        process_id: &str,
        missing: &'static str,
        locate: fn(&ResultStore, &str) -> Result<PathBuf, StoreError>,
    ) -> Result<PathBuf, ApiError> {
        match locate(&self.inner.store, process_id) {
            Ok(path) if path.is_file() => Ok(path),
            Ok(_) => Err(ApiError::NotFound(missing)),
            Err(err) if err.is_not_found() => Err(ApiError::NotFound(missing)),
            Err(err) => Err(err.into()),
        }
    }
}

impl std::fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandler")
            .field("root", &self.inner.store.root())
            .field("backends", &self.inner.backends)
            .field("options", &self.inner.options)
            .finish()
    }
}
