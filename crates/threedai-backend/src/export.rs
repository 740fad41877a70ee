use crate::asset::{Asset, ExportFormat};
use crate::error::BackendError;
use std::path::Path;
use threedai_core::glb::load_glb_mesh;
use threedai_core::step::{write_step, StepOptions, StepOutcome};
use threedai_core::stl::save_binary_stl;
use tracing::{debug, warn};

/// Writes `asset` to `output_path` in `format`.
///
/// Native formats are copied as-is. Meshes can also be converted to STL or
/// STEP; splats have no mesh and only export as PLY.
pub fn export(asset: &Asset, format: ExportFormat, output_path: &Path) -> Result<(), BackendError> {
    let export_err = |reason: String| BackendError::Export {
        path: output_path.to_path_buf(),
        reason,
    };

    match (asset, format) {
        (Asset::Mesh { source }, ExportFormat::Glb)
        | (Asset::GaussianSplat { source }, ExportFormat::Ply) => copy_artifact(source, output_path),
        (Asset::Mesh { source }, ExportFormat::Stl) => {
            let mesh = load_glb_mesh(source).map_err(|e| export_err(e.to_string()))?;
            save_binary_stl(&mesh, output_path).map_err(|e| export_err(e.to_string()))?;
            debug!(path = %output_path.display(), faces = mesh.face_count(), "exported STL");
            Ok(())
        }
        (Asset::Mesh { source }, ExportFormat::Step) => {
            let mesh = load_glb_mesh(source).map_err(|e| export_err(e.to_string()))?;
            let name = output_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("threedai");
            match write_step(&mesh, output_path, &StepOptions::named(name))
                .map_err(|e| export_err(e.to_string()))?
            {
                StepOutcome::Written { faces, skipped } => {
                    debug!(path = %output_path.display(), faces, skipped, "exported STEP");
                }
                StepOutcome::Placeholder { reason } => {
                    warn!(path = %output_path.display(), %reason, "exported placeholder STEP");
                }
            }
            Ok(())
        }
        (asset, format) => Err(BackendError::UnsupportedExport {
            asset: asset.kind_name(),
            format,
        }),
    }
}

/// Copies a pipeline output into place, creating parent directories.
pub fn copy_artifact(source: &Path, dest: &Path) -> Result<(), BackendError> {
    if source == dest {
        return Ok(());
    }
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| BackendError::Io {
            op: "create dir",
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::copy(source, dest).map_err(|err| BackendError::Io {
        op: "copy",
        path: source.to_path_buf(),
        source: err,
    })?;
    Ok(())
}
