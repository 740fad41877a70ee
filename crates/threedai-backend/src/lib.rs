//! Uniform interface over the external image-to-3D generation pipelines.
//!
//! Each backend runs its pipeline as a child process (see [`pipeline`]),
//! checks that the native asset is the kind it expects, and hands the
//! result back as a [`Generation`]. [`export`] then writes the asset in the
//! format the caller wants.

mod asset;
mod error;
pub mod export;
mod hunyuan;
pub mod pipeline;
mod registry;
mod trellis;

pub use asset::{Asset, BackendChoice, ExportFormat, Generation, GenerationRequest};
pub use error::BackendError;
pub use export::{copy_artifact, export};
pub use hunyuan::HunyuanBackend;
pub use pipeline::{AssetKind, ExternalPipeline, Manifest, PipelineCommand};
pub use registry::Backends;
pub use trellis::TrellisBackend;

use std::path::Path;

/// One image-to-3D generation backend.
pub trait Generate3dAsset: Send + Sync {
    fn choice(&self) -> BackendChoice;

    /// Format of the asset this backend produces natively.
    fn native_format(&self) -> ExportFormat;

    /// File name the preview video is stored under.
    fn preview_video_name(&self) -> &'static str;

    fn generate(&self, request: &GenerationRequest<'_>) -> Result<Generation, BackendError>;

    fn export(
        &self,
        asset: &Asset,
        format: ExportFormat,
        output_path: &Path,
    ) -> Result<(), BackendError> {
        export::export(asset, format, output_path)
    }
}
