//! Boolean conversion entry points. Validation and I/O failures are logged
//! and reported as `false`; nothing here panics or returns an error.

use crate::glb::load_glb_mesh;
use crate::mesh::MeshData;
use crate::step::{write_step, StepOptions, StepOutcome};
use crate::stl::save_binary_stl;
use ndarray::ArrayView2;
use std::path::Path;
use tracing::{debug, error, warn};

pub fn mesh_to_stl(
    vertices: ArrayView2<'_, f64>,
    faces: ArrayView2<'_, i64>,
    output_path: &Path,
) -> bool {
    match MeshData::from_arrays(vertices, faces) {
        Ok(mesh) => write_stl_file(&mesh, output_path),
        Err(err) => {
            warn!(path = %output_path.display(), "invalid mesh for STL export: {err}");
            false
        }
    }
}

pub fn mesh_to_step(
    vertices: ArrayView2<'_, f64>,
    faces: ArrayView2<'_, i64>,
    output_path: &Path,
) -> bool {
    let mesh = match MeshData::from_arrays(vertices, faces) {
        Ok(mesh) => mesh,
        Err(err) => {
            warn!(path = %output_path.display(), "invalid mesh for STEP export: {err}");
            return false;
        }
    };
    let name = output_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("threedai");

    match write_step(&mesh, output_path, &StepOptions::named(name)) {
        Ok(StepOutcome::Written { faces, skipped }) => {
            debug!(path = %output_path.display(), faces, skipped, "wrote STEP file");
            if skipped > 0 {
                warn!(skipped, "skipped degenerate triangles in STEP export");
            }
            true
        }
        Ok(StepOutcome::Placeholder { reason }) => {
            warn!(path = %output_path.display(), %reason, "wrote placeholder STEP file");
            true
        }
        Err(err) => {
            error!("{err}");
            false
        }
    }
}

pub fn glb_to_stl(glb_path: &Path, stl_path: &Path) -> bool {
    match load_glb_mesh(glb_path) {
        Ok(mesh) => write_stl_file(&mesh, stl_path),
        Err(err) => {
            error!(input = %glb_path.display(), "GLB to STL conversion failed: {err}");
            false
        }
    }
}

fn write_stl_file(mesh: &MeshData, path: &Path) -> bool {
    match save_binary_stl(mesh, path) {
        Ok(()) => {
            debug!(path = %path.display(), faces = mesh.face_count(), "wrote STL file");
            true
        }
        Err(err) => {
            error!(path = %path.display(), "failed to write STL: {err}");
            false
        }
    }
}
