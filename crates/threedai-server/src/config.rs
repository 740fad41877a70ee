//! Server configuration: results root from the environment, backend
//! settings from an optional `key=value` file.
//!
//! ```text
//! # threedai.conf
//! backend = trellis
//! hunyuan_command = python3 -m threedai_pipelines.hunyuan
//! export_format = stl
//! texture = false
//! max_concurrent_generations = 1
//! max_upload_bytes = 16777216
//! ```

use crate::http::DEFAULT_MAX_UPLOAD_BYTES;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use threedai_backend::{
    BackendChoice, Backends, ExportFormat, HunyuanBackend, PipelineCommand, TrellisBackend,
};
use tracing::{debug, warn};

pub const RESULTS_DIR_ENV: &str = "THREEDAI_RESULTS_DIR";
pub const DEFAULT_CONFIG_FILE: &str = "threedai.conf";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: expected `key = value`, got {text:?}")]
    Syntax { line: usize, text: String },
    #[error("invalid value {value:?} for `{key}`: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub results_dir: PathBuf,
    pub backend: BackendChoice,
    pub hunyuan_command: PipelineCommand,
    pub trellis_command: PipelineCommand,
    /// `None` keeps each backend's native format.
    pub export_format: Option<ExportFormat>,
    pub texture: bool,
    /// Zero means unbounded.
    pub max_concurrent_generations: usize,
    pub max_upload_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            backend: BackendChoice::Hunyuan,
            hunyuan_command: default_command(HunyuanBackend::DEFAULT_COMMAND),
            trellis_command: default_command(TrellisBackend::DEFAULT_COMMAND),
            export_format: None,
            texture: true,
            max_concurrent_generations: 0,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

pub fn default_results_dir() -> PathBuf {
    std::env::temp_dir().join("threedai_results")
}

fn default_command(line: &str) -> PipelineCommand {
    PipelineCommand::parse(line).unwrap_or_else(|| PipelineCommand::new(line, Vec::<String>::new()))
}

impl ServerConfig {
    /// Defaults, then `THREEDAI_RESULTS_DIR`, then the config file.
    ///
    /// An explicit `path` must exist; without one, `threedai.conf` in the
    /// working directory is read if present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(dir) = std::env::var_os(RESULTS_DIR_ENV).filter(|v| !v.is_empty()) {
            config.results_dir = PathBuf::from(dir);
        }
        match path {
            Some(path) => config.apply_file(path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    config.apply_file(fallback)?;
                }
            }
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_file(path)?;
        Ok(config)
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loading config");
        self.apply_str(&text)
    }

    pub fn apply_str(&mut self, text: &str) -> Result<(), ConfigError> {
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::Syntax {
                    line: idx + 1,
                    text: raw.to_string(),
                });
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(ConfigError::Syntax {
                    line: idx + 1,
                    text: raw.to_string(),
                });
            }
            self.set(key, value.trim())?;
        }
        Ok(())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason,
        };
        match key {
            "backend" => self.backend = value.parse().map_err(|e| invalid(format!("{e}")))?,
            "hunyuan_command" => {
                self.hunyuan_command =
                    PipelineCommand::parse(value).ok_or_else(|| invalid("empty command".into()))?
            }
            "trellis_command" => {
                self.trellis_command =
                    PipelineCommand::parse(value).ok_or_else(|| invalid("empty command".into()))?
            }
            "export_format" => {
                self.export_format = if value.is_empty() || value.eq_ignore_ascii_case("native") {
                    None
                } else {
                    Some(value.parse().map_err(|e| invalid(format!("{e}")))?)
                }
            }
            "texture" => {
                self.texture =
                    parse_bool(value).ok_or_else(|| invalid("expected a boolean".into()))?
            }
            "max_concurrent_generations" => {
                self.max_concurrent_generations = value
                    .parse()
                    .map_err(|e: std::num::ParseIntError| invalid(e.to_string()))?
            }
            "max_upload_bytes" => {
                self.max_upload_bytes = match value.parse() {
                    Ok(0) => return Err(invalid("must be positive".into())),
                    Ok(limit) => limit,
                    Err(e) => return Err(invalid(format!("{e}"))),
                }
            }
            other => warn!(key = other, "ignoring unknown config key"),
        }
        Ok(())
    }

    /// Builds both backends from the configured commands.
    pub fn build_backends(&self) -> Backends {
        Backends::new()
            .with(Arc::new(
                HunyuanBackend::new(self.hunyuan_command.clone()).with_texture(self.texture),
            ))
            .with(Arc::new(TrellisBackend::new(self.trellis_command.clone())))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
