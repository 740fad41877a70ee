//! Binary STL: 80-byte header, little-endian u32 face count, then one
//! 50-byte record per face (normal, three vertices, u16 attribute).

use crate::mesh::MeshData;
use std::io::{self, Write};
use std::path::Path;
use thiserror::Error;

pub const HEADER_LEN: usize = 80;
pub const RECORD_LEN: usize = 50;

#[derive(Debug, Error)]
pub enum StlError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("binary STL cannot hold {0} faces")]
    TooManyFaces(usize),
    #[error("STL data truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StlTriangle {
    pub normal: [f32; 3],
    pub vertices: [[f32; 3]; 3],
    pub attribute: u16,
}

pub fn write_binary_stl<W: Write>(mesh: &MeshData, mut out: W) -> Result<(), StlError> {
    let count =
        u32::try_from(mesh.face_count()).map_err(|_| StlError::TooManyFaces(mesh.face_count()))?;

    out.write_all(&[0u8; HEADER_LEN])?;
    out.write_all(&count.to_le_bytes())?;

    let mut record = [0u8; RECORD_LEN];
    for face in 0..mesh.face_count() {
        let normal = mesh.face_normal(face);
        let tri = mesh.triangle(face);

        let mut offset = 0;
        for v in std::iter::once(&normal).chain(tri.iter()) {
            for c in v.iter() {
                record[offset..offset + 4].copy_from_slice(&(*c as f32).to_le_bytes());
                offset += 4;
            }
        }
        record[48..50].copy_from_slice(&0u16.to_le_bytes());
        out.write_all(&record)?;
    }
    out.flush()?;
    Ok(())
}

pub fn encode_binary_stl(mesh: &MeshData) -> Result<Vec<u8>, StlError> {
    let mut buf = Vec::with_capacity(HEADER_LEN + 4 + mesh.face_count() * RECORD_LEN);
    write_binary_stl(mesh, &mut buf)?;
    Ok(buf)
}

/// Encodes in memory first so a failed encode leaves no file behind.
pub fn save_binary_stl(mesh: &MeshData, path: &Path) -> Result<(), StlError> {
    let bytes = encode_binary_stl(mesh)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

pub fn read_binary_stl(bytes: &[u8]) -> Result<Vec<StlTriangle>, StlError> {
    if bytes.len() < HEADER_LEN + 4 {
        return Err(StlError::Truncated {
            expected: HEADER_LEN + 4,
            actual: bytes.len(),
        });
    }
    let count = u32::from_le_bytes([
        bytes[HEADER_LEN],
        bytes[HEADER_LEN + 1],
        bytes[HEADER_LEN + 2],
        bytes[HEADER_LEN + 3],
    ]) as usize;
    let expected = HEADER_LEN + 4 + count * RECORD_LEN;
    if bytes.len() < expected {
        return Err(StlError::Truncated {
            expected,
            actual: bytes.len(),
        });
    }

    let body = &bytes[HEADER_LEN + 4..expected];
    Ok(body.chunks_exact(RECORD_LEN).map(parse_record).collect())
}

fn parse_record(record: &[u8]) -> StlTriangle {
    let f = |i: usize| {
        let at = i * 4;
        f32::from_le_bytes([record[at], record[at + 1], record[at + 2], record[at + 3]])
    };
    StlTriangle {
        normal: [f(0), f(1), f(2)],
        vertices: [
            [f(3), f(4), f(5)],
            [f(6), f(7), f(8)],
            [f(9), f(10), f(11)],
        ],
        attribute: u16::from_le_bytes([record[48], record[49]]),
    }
}

/// Rebuilds a triangle-soup mesh from parsed STL records.
pub fn triangles_to_mesh(triangles: &[StlTriangle]) -> MeshData {
    MeshData::from_triangles(triangles.iter().map(|t| {
        t.vertices
            .map(|v| [f64::from(v[0]), f64::from(v[1]), f64::from(v[2])])
    }))
}
