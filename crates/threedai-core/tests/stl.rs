use ndarray::{array, Array2};
use threedai_core::mesh_to_stl;
use threedai_core::stl::{read_binary_stl, HEADER_LEN, RECORD_LEN};

fn read_face_count(bytes: &[u8]) -> u32 {
    u32::from_le_bytes(bytes[HEADER_LEN..HEADER_LEN + 4].try_into().unwrap())
}

#[test]
fn face_count_matches_input() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tetra.stl");
    let vertices = array![
        [0.0, 0.0, 0.0],
        [1.0, 0.0, 0.0],
        [0.0, 1.0, 0.0],
        [0.0, 0.0, 1.0]
    ];
    let faces = array![[0i64, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]];

    assert!(mesh_to_stl(vertices.view(), faces.view(), &path));

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(4, read_face_count(&bytes));
    assert_eq!(HEADER_LEN + 4 + 4 * RECORD_LEN, bytes.len());
    assert!(bytes[..HEADER_LEN].iter().all(|&b| b == 0));
}

#[test]
fn single_triangle_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tri.stl");
    let vertices = array![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 3.0, 0.0]];
    let faces = array![[0i64, 1, 2]];

    assert!(mesh_to_stl(vertices.view(), faces.view(), &path));

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(1, read_face_count(&bytes));

    // Parse the one record by hand: 80-byte header, 4-byte count, 50-byte record.
    let record = &bytes[HEADER_LEN + 4..HEADER_LEN + 4 + RECORD_LEN];
    let f = |i: usize| f32::from_le_bytes(record[i * 4..i * 4 + 4].try_into().unwrap());
    assert_eq!([0.0, 0.0, 1.0], [f(0), f(1), f(2)]);
    assert_eq!([0.0, 0.0, 0.0], [f(3), f(4), f(5)]);
    assert_eq!([2.0, 0.0, 0.0], [f(6), f(7), f(8)]);
    assert_eq!([0.0, 3.0, 0.0], [f(9), f(10), f(11)]);
    assert_eq!([0u8, 0u8], [record[48], record[49]]);

    let parsed = read_binary_stl(&bytes).unwrap();
    assert_eq!(1, parsed.len());
    assert_eq!([2.0, 0.0, 0.0], parsed[0].vertices[1]);
}

#[test]
fn degenerate_triangle_gets_zero_normal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("flat.stl");
    let vertices = array![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [2.0, 2.0, 2.0]];
    let faces = array![[0i64, 1, 2]];

    assert!(mesh_to_stl(vertices.view(), faces.view(), &path));

    let parsed = read_binary_stl(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!([0.0, 0.0, 0.0], parsed[0].normal);
}

#[test]
fn rejects_bad_shapes_without_writing() {
    let dir = tempfile::tempdir().unwrap();

    let path = dir.path().join("bad_vertices.stl");
    let vertices = Array2::<f64>::zeros((3, 2));
    let faces = array![[0i64, 1, 2]];
    assert!(!mesh_to_stl(vertices.view(), faces.view(), &path));
    assert!(!path.exists());

    let path = dir.path().join("bad_faces.stl");
    let vertices = Array2::<f64>::zeros((3, 3));
    let faces = Array2::<i64>::zeros((1, 4));
    assert!(!mesh_to_stl(vertices.view(), faces.view(), &path));
    assert!(!path.exists());
}

#[test]
fn rejects_out_of_range_indices() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("oob.stl");
    let vertices = Array2::<f64>::zeros((3, 3));

    let faces = array![[0i64, 1, 3]];
    assert!(!mesh_to_stl(vertices.view(), faces.view(), &path));

    let faces = array![[0i64, -1, 2]];
    assert!(!mesh_to_stl(vertices.view(), faces.view(), &path));
    assert!(!path.exists());
}

#[test]
fn empty_mesh_writes_header_only() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.stl");
    let vertices = Array2::<f64>::zeros((0, 3));
    let faces = Array2::<i64>::zeros((0, 3));

    assert!(mesh_to_stl(vertices.view(), faces.view(), &path));
    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(HEADER_LEN + 4, bytes.len());
    assert_eq!(0, read_face_count(&bytes));
}
