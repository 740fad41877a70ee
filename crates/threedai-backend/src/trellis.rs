use crate::asset::{Asset, BackendChoice, ExportFormat, Generation, GenerationRequest};
use crate::error::BackendError;
use crate::pipeline::{AssetKind, ExternalPipeline, PipelineCommand};
use crate::Generate3dAsset;

/// TRELLIS image-to-3D. Produces a Gaussian splat PLY and a rendered
/// turntable video.
#[derive(Debug, Clone)]
pub struct TrellisBackend {
    pipeline: ExternalPipeline,
}

impl TrellisBackend {
    pub const DEFAULT_COMMAND: &'static str = "python3 -m threedai_pipelines.trellis";
    pub const VIDEO_FILE: &'static str = "sample_gs.mp4";

    pub fn new(command: PipelineCommand) -> Self {
        Self {
            pipeline: ExternalPipeline::new(BackendChoice::Trellis, command),
        }
    }
}

impl Generate3dAsset for TrellisBackend {
    fn choice(&self) -> BackendChoice {
        BackendChoice::Trellis
    }

    fn native_format(&self) -> ExportFormat {
        ExportFormat::Ply
    }

    fn preview_video_name(&self) -> &'static str {
        Self::VIDEO_FILE
    }

    fn generate(&self, request: &GenerationRequest<'_>) -> Result<Generation, BackendError> {
        let manifest = self.pipeline.run(request, &[])?;
        manifest.ensure_kind(BackendChoice::Trellis, AssetKind::Gaussian)?;
        Ok(Generation {
            asset: Asset::GaussianSplat {
                source: manifest.path,
            },
            preview_video: manifest.video,
        })
    }
}
