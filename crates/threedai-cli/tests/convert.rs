use std::process::Command;
use threedai_core::stl::{read_binary_stl, save_binary_stl};
use threedai_core::MeshData;

fn threedai() -> Command {
    Command::new(env!("CARGO_BIN_EXE_threedai"))
}

fn quad() -> MeshData {
    MeshData::new(
        vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ],
        vec![[0, 1, 2], [0, 2, 3]],
    )
    .unwrap()
}

#[test]
fn converts_stl_to_step_and_stl() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("quad.stl");
    save_binary_stl(&quad(), &input).unwrap();
    let step = dir.path().join("out").join("quad.step");
    let stl = dir.path().join("out").join("copy.stl");

    let output = threedai()
        .arg("convert")
        .arg(&input)
        .arg("--step")
        .arg(&step)
        .arg("--stl")
        .arg(&stl)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let step_text = std::fs::read_to_string(&step).unwrap();
    assert!(step_text.starts_with("ISO-10303-21;") || step_text.starts_with("This is a placeholder"));
    let triangles = read_binary_stl(&std::fs::read(&stl).unwrap()).unwrap();
    assert_eq!(2, triangles.len());
}

#[test]
fn convert_requires_an_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("quad.stl");
    save_binary_stl(&quad(), &input).unwrap();

    let output = threedai().arg("convert").arg(&input).output().unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("nothing to do"));
}

#[test]
fn missing_input_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let output = threedai()
        .arg("convert")
        .arg(dir.path().join("absent.glb"))
        .arg("--stl")
        .arg(dir.path().join("out.stl"))
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("input not found"));
    assert!(!dir.path().join("out.stl").exists());
}

#[test]
fn capabilities_prints_json() {
    let output = threedai().arg("capabilities").output().unwrap();
    assert!(output.status.success());
    let caps: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(caps["step_export"].is_object());
    assert!(caps["glb_import"].is_object());
}
