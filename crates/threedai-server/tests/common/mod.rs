#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use threedai_backend::{
    Asset, BackendChoice, BackendError, Backends, ExportFormat, Generate3dAsset, Generation,
    GenerationRequest,
};
use threedai_server::{HandlerOptions, RequestHandler, ResultStore};

/// In-process stand-in for a generation pipeline.
///
/// The "video" echoes the uploaded image bytes and the "model" echoes the
/// prompt, so tests can tell which request produced which artifact.
pub struct FakeBackend {
    pub choice: BackendChoice,
    pub fail: bool,
    pub delay: Duration,
    pub running: AtomicUsize,
    pub peak: AtomicUsize,
}

impl FakeBackend {
    pub fn new(choice: BackendChoice) -> Self {
        Self {
            choice,
            fail: false,
            delay: Duration::ZERO,
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn failing(choice: BackendChoice) -> Self {
        Self {
            fail: true,
            ..Self::new(choice)
        }
    }

    pub fn slow(choice: BackendChoice, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(choice)
        }
    }
}

impl Generate3dAsset for FakeBackend {
    fn choice(&self) -> BackendChoice {
        self.choice
    }

    fn native_format(&self) -> ExportFormat {
        match self.choice {
            BackendChoice::Hunyuan => ExportFormat::Glb,
            BackendChoice::Trellis => ExportFormat::Ply,
        }
    }

    fn preview_video_name(&self) -> &'static str {
        match self.choice {
            BackendChoice::Hunyuan => "output.mp4",
            BackendChoice::Trellis => "sample_gs.mp4",
        }
    }

    fn generate(&self, request: &GenerationRequest<'_>) -> Result<Generation, BackendError> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        let result = self.write_outputs(request);
        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl FakeBackend {
    fn write_outputs(&self, request: &GenerationRequest<'_>) -> Result<Generation, BackendError> {
        if self.fail {
            return Err(BackendError::PipelineFailed {
                backend: self.choice,
                status: "exit status: 1".to_string(),
                stderr: "CUDA out of memory".to_string(),
            });
        }
        std::fs::create_dir_all(request.work_dir).unwrap();
        let image = std::fs::read(request.image).unwrap();
        let video = request.work_dir.join("render.mp4");
        std::fs::write(&video, &image).unwrap();
        let model = request.work_dir.join("asset.bin");
        std::fs::write(&model, request.prompt.unwrap_or("").as_bytes()).unwrap();
        let asset = match self.choice {
            BackendChoice::Hunyuan => Asset::Mesh { source: model },
            BackendChoice::Trellis => Asset::GaussianSplat { source: model },
        };
        Ok(Generation {
            asset,
            preview_video: Some(video),
        })
    }
}

pub fn handler_with(
    root: &Path,
    backends: Vec<Arc<dyn Generate3dAsset>>,
    options: HandlerOptions,
) -> RequestHandler {
    let store = ResultStore::open(root).unwrap();
    let mut registry = Backends::new();
    for backend in backends {
        registry.register(backend);
    }
    RequestHandler::new(store, registry, options)
}

pub fn fake_handler(root: &Path) -> RequestHandler {
    let hunyuan: Arc<dyn Generate3dAsset> = Arc::new(FakeBackend::new(BackendChoice::Hunyuan));
    let trellis: Arc<dyn Generate3dAsset> = Arc::new(FakeBackend::new(BackendChoice::Trellis));
    handler_with(root, vec![hunyuan, trellis], HandlerOptions::default())
}
