use nalgebra::Vector3;
use ndarray::ArrayView2;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeshError {
    #[error("vertices must have shape (n, 3), got ({rows}, {cols})")]
    VertexShape { rows: usize, cols: usize },
    #[error("faces must have shape (m, 3), got ({rows}, {cols})")]
    FaceShape { rows: usize, cols: usize },
    #[error("face {face} references vertex {index}, but the mesh has {vertex_count} vertices")]
    IndexOutOfRange {
        face: usize,
        index: i64,
        vertex_count: usize,
    },
}

/// Indexed triangle mesh. Every face index is `< vertices.len()`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshData {
    vertices: Vec<[f64; 3]>,
    faces: Vec<[u32; 3]>,
}

impl MeshData {
    pub fn new(vertices: Vec<[f64; 3]>, faces: Vec<[u32; 3]>) -> Result<Self, MeshError> {
        let vertex_count = vertices.len();
        for (face, tri) in faces.iter().enumerate() {
            if let Some(&bad) = tri.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(MeshError::IndexOutOfRange {
                    face,
                    index: i64::from(bad),
                    vertex_count,
                });
            }
        }
        Ok(Self { vertices, faces })
    }

    /// Builds a mesh from an `(n, 3)` vertex array and an `(m, 3)` face array.
    pub fn from_arrays(
        vertices: ArrayView2<'_, f64>,
        faces: ArrayView2<'_, i64>,
    ) -> Result<Self, MeshError> {
        let (rows, cols) = vertices.dim();
        if cols != 3 {
            return Err(MeshError::VertexShape { rows, cols });
        }
        let (face_rows, face_cols) = faces.dim();
        if face_cols != 3 {
            return Err(MeshError::FaceShape {
                rows: face_rows,
                cols: face_cols,
            });
        }

        let verts: Vec<[f64; 3]> = vertices
            .rows()
            .into_iter()
            .map(|row| [row[0], row[1], row[2]])
            .collect();

        let vertex_count = verts.len();
        let mut tris = Vec::with_capacity(face_rows);
        for (face, row) in faces.rows().into_iter().enumerate() {
            let mut tri = [0u32; 3];
            for (slot, &index) in tri.iter_mut().zip(row.iter()) {
                if index < 0 || index as u64 >= vertex_count as u64 {
                    return Err(MeshError::IndexOutOfRange {
                        face,
                        index,
                        vertex_count,
                    });
                }
                *slot = index as u32;
            }
            tris.push(tri);
        }

        Ok(Self {
            vertices: verts,
            faces: tris,
        })
    }

    /// Triangle soup: three fresh vertices per triangle.
    pub fn from_triangles<I>(triangles: I) -> Self
    where
        I: IntoIterator<Item = [[f64; 3]; 3]>,
    {
        let mut vertices = Vec::new();
        let mut faces = Vec::new();
        for tri in triangles {
            let base = vertices.len() as u32;
            vertices.extend(tri);
            faces.push([base, base + 1, base + 2]);
        }
        Self { vertices, faces }
    }

    pub fn vertices(&self) -> &[[f64; 3]] {
        &self.vertices
    }

    pub fn faces(&self) -> &[[u32; 3]] {
        &self.faces
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn triangle(&self, face: usize) -> [Vector3<f64>; 3] {
        let [a, b, c] = self.faces[face];
        [
            self.point(a as usize),
            self.point(b as usize),
            self.point(c as usize),
        ]
    }

    /// Unit normal of `(v1 - v0) x (v2 - v0)`, or zero for degenerate faces.
    pub fn face_normal(&self, face: usize) -> Vector3<f64> {
        let [v0, v1, v2] = self.triangle(face);
        unit_or_zero((v1 - v0).cross(&(v2 - v0)))
    }

    pub fn bounds(&self) -> Option<([f64; 3], [f64; 3])> {
        let first = *self.vertices.first()?;
        let mut min = first;
        let mut max = first;
        for v in &self.vertices[1..] {
            for axis in 0..3 {
                min[axis] = min[axis].min(v[axis]);
                max[axis] = max[axis].max(v[axis]);
            }
        }
        Some((min, max))
    }

    fn point(&self, index: usize) -> Vector3<f64> {
        let [x, y, z] = self.vertices[index];
        Vector3::new(x, y, z)
    }
}

pub(crate) fn unit_or_zero(v: Vector3<f64>) -> Vector3<f64> {
    let len = v.norm();
    if len.is_finite() && len > 0.0 {
        v / len
    } else {
        Vector3::zeros()
    }
}
