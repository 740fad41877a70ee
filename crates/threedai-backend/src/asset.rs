use crate::error::BackendError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    Hunyuan,
    Trellis,
}

impl BackendChoice {
    pub const ALL: [BackendChoice; 2] = [BackendChoice::Hunyuan, BackendChoice::Trellis];

    pub fn as_str(self) -> &'static str {
        match self {
            BackendChoice::Hunyuan => "hunyuan",
            BackendChoice::Trellis => "trellis",
        }
    }
}

impl fmt::Display for BackendChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendChoice {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        BackendChoice::ALL
            .into_iter()
            .find(|choice| choice.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| BackendError::UnknownBackend(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Glb,
    Ply,
    Stl,
    Step,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 4] = [
        ExportFormat::Glb,
        ExportFormat::Ply,
        ExportFormat::Stl,
        ExportFormat::Step,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Glb => "glb",
            ExportFormat::Ply => "ply",
            ExportFormat::Stl => "stl",
            ExportFormat::Step => "step",
        }
    }

    /// Canonical file name inside a process directory.
    pub fn file_name(self) -> &'static str {
        match self {
            ExportFormat::Glb => "output.glb",
            ExportFormat::Ply => "sample.ply",
            ExportFormat::Stl => "model.stl",
            ExportFormat::Step => "model.step",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = BackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('.');
        let s = if s.eq_ignore_ascii_case("stp") { "step" } else { s };
        ExportFormat::ALL
            .into_iter()
            .find(|format| format.extension().eq_ignore_ascii_case(s))
            .ok_or_else(|| BackendError::UnknownFormat(s.to_string()))
    }
}

/// A backend's native output, before format normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asset {
    /// Textured or untextured triangle mesh stored as GLB.
    Mesh { source: PathBuf },
    /// Gaussian splat point set stored as PLY.
    GaussianSplat { source: PathBuf },
}

impl Asset {
    pub fn source(&self) -> &Path {
        match self {
            Asset::Mesh { source } | Asset::GaussianSplat { source } => source,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Asset::Mesh { .. } => "mesh",
            Asset::GaussianSplat { .. } => "gaussian splat",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub asset: Asset,
    pub preview_video: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub image: &'a Path,
    pub prompt: Option<&'a str>,
    /// Scratch directory the pipeline writes its native outputs into.
    pub work_dir: &'a Path,
}
