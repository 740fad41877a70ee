use std::path::PathBuf;
use threedai_backend::{export, Asset, BackendChoice, BackendError, ExportFormat};
use threedai_core::glb::save_glb;
use threedai_core::mesh::MeshData;
use threedai_core::stl::read_binary_stl;

fn triangle() -> MeshData {
    MeshData::new(
        vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        vec![[0, 1, 2]],
    )
    .unwrap()
}

#[test]
fn native_formats_are_copied() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("native").join("raw.ply");
    std::fs::create_dir_all(source.parent().unwrap()).unwrap();
    std::fs::write(&source, b"ply\nformat binary_little_endian 1.0\n").unwrap();

    let dest = dir.path().join("sample.ply");
    export(
        &Asset::GaussianSplat {
            source: source.clone(),
        },
        ExportFormat::Ply,
        &dest,
    )
    .unwrap();
    assert_eq!(std::fs::read(&source).unwrap(), std::fs::read(&dest).unwrap());
}

#[test]
fn splats_cannot_become_meshes() {
    let dir = tempfile::tempdir().unwrap();
    let asset = Asset::GaussianSplat {
        source: PathBuf::from("sample.ply"),
    };

    for format in [ExportFormat::Glb, ExportFormat::Stl, ExportFormat::Step] {
        let err = export(&asset, format, &dir.path().join("out")).unwrap_err();
        assert!(matches!(err, BackendError::UnsupportedExport { .. }), "{err}");
    }
}

#[test]
fn missing_mesh_source_fails_export() {
    let dir = tempfile::tempdir().unwrap();
    let asset = Asset::Mesh {
        source: dir.path().join("missing.glb"),
    };

    let err = export(&asset, ExportFormat::Stl, &dir.path().join("model.stl")).unwrap_err();
    assert!(matches!(err, BackendError::Export { .. }), "{err}");
}

#[test]
fn mesh_converts_to_stl() {
    let dir = tempfile::tempdir().unwrap();
    let glb = dir.path().join("mesh.glb");
    save_glb(&triangle(), &glb).unwrap();

    let stl = dir.path().join("model.stl");
    export(&Asset::Mesh { source: glb }, ExportFormat::Stl, &stl).unwrap();

    let triangles = read_binary_stl(&std::fs::read(&stl).unwrap()).unwrap();
    assert_eq!(1, triangles.len());
}

#[test]
fn mesh_converts_to_step() {
    let dir = tempfile::tempdir().unwrap();
    let glb = dir.path().join("mesh.glb");
    save_glb(&triangle(), &glb).unwrap();

    let step = dir.path().join("model.step");
    export(&Asset::Mesh { source: glb }, ExportFormat::Step, &step).unwrap();
    assert!(step.is_file());
}

#[test]
fn parses_choices_and_formats() {
    assert_eq!(BackendChoice::Hunyuan, "hunyuan".parse().unwrap());
    assert_eq!(BackendChoice::Trellis, " TRELLIS ".parse().unwrap());
    assert!("meshy".parse::<BackendChoice>().is_err());

    assert_eq!(ExportFormat::Step, "stp".parse().unwrap());
    assert_eq!(ExportFormat::Glb, ".glb".parse().unwrap());
    assert!("obj".parse::<ExportFormat>().is_err());
    assert_eq!("model.step", ExportFormat::Step.file_name());
}
