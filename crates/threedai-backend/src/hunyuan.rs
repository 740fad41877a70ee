use crate::asset::{Asset, BackendChoice, ExportFormat, Generation, GenerationRequest};
use crate::error::BackendError;
use crate::pipeline::{AssetKind, ExternalPipeline, PipelineCommand};
use crate::Generate3dAsset;

/// Hunyuan3D shape generation with optional texture painting. Produces a
/// GLB mesh.
#[derive(Debug, Clone)]
pub struct HunyuanBackend {
    pipeline: ExternalPipeline,
    texture: bool,
}

impl HunyuanBackend {
    pub const DEFAULT_COMMAND: &'static str = "python3 -m threedai_pipelines.hunyuan";
    pub const VIDEO_FILE: &'static str = "output.mp4";

    pub fn new(command: PipelineCommand) -> Self {
        Self {
            pipeline: ExternalPipeline::new(BackendChoice::Hunyuan, command),
            texture: true,
        }
    }

    pub fn with_texture(mut self, texture: bool) -> Self {
        self.texture = texture;
        self
    }
}

impl Generate3dAsset for HunyuanBackend {
    fn choice(&self) -> BackendChoice {
        BackendChoice::Hunyuan
    }

    fn native_format(&self) -> ExportFormat {
        ExportFormat::Glb
    }

    fn preview_video_name(&self) -> &'static str {
        Self::VIDEO_FILE
    }

    fn generate(&self, request: &GenerationRequest<'_>) -> Result<Generation, BackendError> {
        let extra: &[&str] = if self.texture { &["--texture"] } else { &[] };
        let manifest = self.pipeline.run(request, extra)?;
        manifest.ensure_kind(BackendChoice::Hunyuan, AssetKind::Mesh)?;
        Ok(Generation {
            asset: Asset::Mesh {
                source: manifest.path,
            },
            preview_video: manifest.video,
        })
    }
}
