//! Process contract for external generation pipelines.
//!
//! A pipeline is invoked as
//! `<program> <args..> --image <path> --output-dir <dir> [--prompt <text>] [extra..]`
//! and must exit successfully after printing a JSON manifest as its last
//! non-empty line of stdout:
//!
//! ```text
//! {"asset":"mesh","path":"mesh.glb","video":"preview.mp4"}
//! ```
//!
//! Relative paths in the manifest are resolved against the output directory.

use crate::asset::{BackendChoice, GenerationRequest};
use crate::error::BackendError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;
use tracing::{debug, info};

/// How many trailing stderr bytes are kept in a failure message.
const STDERR_TAIL: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl PipelineCommand {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Splits a command line on whitespace. No shell quoting is applied.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl std::fmt::Display for PipelineCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Mesh,
    Gaussian,
}

impl AssetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::Mesh => "mesh",
            AssetKind::Gaussian => "gaussian",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub asset: AssetKind,
    pub path: PathBuf,
    #[serde(default)]
    pub video: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ExternalPipeline {
    backend: BackendChoice,
    command: PipelineCommand,
}

impl ExternalPipeline {
    pub fn new(backend: BackendChoice, command: PipelineCommand) -> Self {
        Self { backend, command }
    }

    /// Runs the pipeline to completion and returns its resolved manifest.
    pub fn run(
        &self,
        request: &GenerationRequest<'_>,
        extra_args: &[&str],
    ) -> Result<Manifest, BackendError> {
        let backend = self.backend;
        if self.command.program.trim().is_empty() {
            return Err(BackendError::EmptyCommand { backend });
        }
        std::fs::create_dir_all(request.work_dir).map_err(|source| BackendError::Io {
            op: "create work dir",
            path: request.work_dir.to_path_buf(),
            source,
        })?;

        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args)
            .arg("--image")
            .arg(request.image)
            .arg("--output-dir")
            .arg(request.work_dir);
        if let Some(prompt) = request.prompt {
            cmd.arg("--prompt").arg(prompt);
        }
        cmd.args(extra_args);

        info!(
            %backend,
            command = %self.command,
            image = %request.image.display(),
            "running generation pipeline"
        );
        let started = Instant::now();
        let output = cmd.output().map_err(|source| BackendError::Spawn {
            backend,
            program: self.command.program.clone(),
            source,
        })?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!(%backend, "pipeline stderr:\n{}", stderr.trim_end());
        }
        if !output.status.success() {
            return Err(BackendError::PipelineFailed {
                backend,
                status: output.status.to_string(),
                stderr: tail(stderr.trim(), STDERR_TAIL).to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let line = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or(BackendError::MissingManifest { backend })?;
        let manifest: Manifest = serde_json::from_str(line)
            .map_err(|source| BackendError::InvalidManifest { backend, source })?;
        let manifest = self.resolve(manifest, request.work_dir)?;

        info!(%backend, elapsed_ms, asset = manifest.asset.as_str(), "pipeline finished");
        Ok(manifest)
    }

    fn resolve(&self, manifest: Manifest, work_dir: &Path) -> Result<Manifest, BackendError> {
        let path = resolve_in(work_dir, &manifest.path);
        if !path.is_file() {
            return Err(BackendError::MissingOutput {
                backend: self.backend,
                path,
            });
        }
        let video = match manifest.video {
            Some(video) => {
                let video = resolve_in(work_dir, &video);
                if !video.is_file() {
                    return Err(BackendError::MissingOutput {
                        backend: self.backend,
                        path: video,
                    });
                }
                Some(video)
            }
            None => None,
        };
        Ok(Manifest {
            asset: manifest.asset,
            path,
            video,
        })
    }
}

impl Manifest {
    pub fn ensure_kind(&self, backend: BackendChoice, kind: AssetKind) -> Result<(), BackendError> {
        if self.asset == kind {
            Ok(())
        } else {
            Err(BackendError::UnexpectedAsset {
                backend,
                expected: kind.as_str(),
                actual: self.asset.as_str(),
            })
        }
    }
}

fn resolve_in(dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        dir.join(path)
    }
}

fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}
