use crate::mesh::{MeshData, MeshError};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GlbError {
    #[error("input not found: {0:?}")]
    NotFound(PathBuf),
    #[error("GLB import is unavailable: {0}")]
    Unavailable(String),
    #[cfg(feature = "glb")]
    #[error("load GLB {path:?}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },
    #[cfg(feature = "glb")]
    #[error("serialize glTF document: {0}")]
    Serialize(#[source] gltf::json::Error),
    #[cfg(feature = "glb")]
    #[error("encode GLB container: {0}")]
    Encode(#[source] gltf::Error),
    #[error("{0:?} contains no triangle mesh")]
    NoMesh(PathBuf),
    #[error("cannot encode an empty mesh as GLB")]
    EmptyMesh,
    #[error("write GLB {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Mesh(#[from] MeshError),
}

/// Loads the first mesh of a GLB/glTF file.
///
/// All triangle primitives of that mesh are merged; primitives without an
/// index buffer are read as consecutive triangles.
#[cfg(feature = "glb")]
pub fn load_glb_mesh(path: &Path) -> Result<MeshData, GlbError> {
    use gltf::mesh::Mode;

    if !path.exists() {
        return Err(GlbError::NotFound(path.to_path_buf()));
    }
    let (document, buffers, _) = gltf::import(path).map_err(|source| GlbError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    let mesh = document
        .meshes()
        .next()
        .ok_or_else(|| GlbError::NoMesh(path.to_path_buf()))?;

    let mut vertices: Vec<[f64; 3]> = Vec::new();
    let mut faces: Vec<[u32; 3]> = Vec::new();
    for primitive in mesh.primitives() {
        if primitive.mode() != Mode::Triangles {
            tracing::debug!(mode = ?primitive.mode(), "skipping non-triangle primitive");
            continue;
        }
        let reader =
            primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
        let Some(positions) = reader.read_positions() else {
            continue;
        };

        let base = vertices.len() as u32;
        vertices.extend(positions.map(|[x, y, z]| [f64::from(x), f64::from(y), f64::from(z)]));
        let added = vertices.len() as u32 - base;

        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..added).collect(),
        };
        faces.extend(
            indices
                .chunks_exact(3)
                .map(|tri| [base + tri[0], base + tri[1], base + tri[2]]),
        );
    }

    if faces.is_empty() {
        return Err(GlbError::NoMesh(path.to_path_buf()));
    }
    Ok(MeshData::new(vertices, faces)?)
}

#[cfg(not(feature = "glb"))]
pub fn load_glb_mesh(path: &Path) -> Result<MeshData, GlbError> {
    if !path.exists() {
        return Err(GlbError::NotFound(path.to_path_buf()));
    }
    Err(GlbError::Unavailable(
        crate::capability::glb_import()
            .reason()
            .unwrap_or_default()
            .to_string(),
    ))
}

/// Encodes a mesh as a single-primitive GLB (positions + u32 indices).
#[cfg(feature = "glb")]
pub fn encode_glb(mesh: &MeshData) -> Result<Vec<u8>, GlbError> {
    use gltf::binary::{Glb, Header};
    use gltf::json::accessor::{ComponentType, GenericComponentType, Type};
    use gltf::json::validation::{Checked::Valid, USize64};
    use gltf::json::{self, buffer, mesh as json_mesh};
    use std::borrow::Cow;

    let Some((min, max)) = mesh.bounds() else {
        return Err(GlbError::EmptyMesh);
    };
    if mesh.is_empty() {
        return Err(GlbError::EmptyMesh);
    }

    let mut bin = Vec::with_capacity(mesh.vertex_count() * 12 + mesh.face_count() * 12);
    for v in mesh.vertices() {
        for c in v {
            bin.extend_from_slice(&(*c as f32).to_le_bytes());
        }
    }
    let positions_len = bin.len();
    for tri in mesh.faces() {
        for i in tri {
            bin.extend_from_slice(&i.to_le_bytes());
        }
    }
    let indices_len = bin.len() - positions_len;

    let mut root = json::Root::default();
    root.asset.generator = Some("threedai".to_string());

    let buffer = root.push(json::Buffer {
        byte_length: USize64::from(bin.len()),
        extensions: Default::default(),
        extras: Default::default(),
        name: None,
        uri: None,
    });
    let view = |offset: usize, length: usize, target: buffer::Target| buffer::View {
        buffer,
        byte_length: USize64::from(length),
        byte_offset: Some(USize64::from(offset)),
        byte_stride: None,
        extensions: Default::default(),
        extras: Default::default(),
        name: None,
        target: Some(Valid(target)),
    };
    let positions_view = root.push(view(0, positions_len, buffer::Target::ArrayBuffer));
    let indices_view = root.push(view(
        positions_len,
        indices_len,
        buffer::Target::ElementArrayBuffer,
    ));

    let positions = root.push(json::Accessor {
        buffer_view: Some(positions_view),
        byte_offset: None,
        count: USize64::from(mesh.vertex_count()),
        component_type: Valid(GenericComponentType(ComponentType::F32)),
        extensions: Default::default(),
        extras: Default::default(),
        type_: Valid(Type::Vec3),
        min: Some(json::Value::from(min.map(|c| c as f32).to_vec())),
        max: Some(json::Value::from(max.map(|c| c as f32).to_vec())),
        name: None,
        normalized: false,
        sparse: None,
    });
    let indices = root.push(json::Accessor {
        buffer_view: Some(indices_view),
        byte_offset: None,
        count: USize64::from(mesh.face_count() * 3),
        component_type: Valid(GenericComponentType(ComponentType::U32)),
        extensions: Default::default(),
        extras: Default::default(),
        type_: Valid(Type::Scalar),
        min: None,
        max: None,
        name: None,
        normalized: false,
        sparse: None,
    });

    let primitive = json_mesh::Primitive {
        attributes: [(Valid(json_mesh::Semantic::Positions), positions)]
            .into_iter()
            .collect(),
        extensions: Default::default(),
        extras: Default::default(),
        indices: Some(indices),
        material: None,
        mode: Valid(json_mesh::Mode::Triangles),
        targets: None,
    };
    let mesh_index = root.push(json::Mesh {
        extensions: Default::default(),
        extras: Default::default(),
        name: None,
        primitives: vec![primitive],
        weights: None,
    });
    let node = root.push(json::Node {
        mesh: Some(mesh_index),
        ..Default::default()
    });
    let scene = root.push(json::Scene {
        extensions: Default::default(),
        extras: Default::default(),
        name: None,
        nodes: vec![node],
    });
    root.scene = Some(scene);

    let json_bytes = json::serialize::to_vec(&root).map_err(GlbError::Serialize)?;
    let glb = Glb {
        header: Header {
            magic: *b"glTF",
            version: 2,
            // Recomputed from the padded chunks when written.
            length: 0,
        },
        json: Cow::Owned(json_bytes),
        bin: Some(Cow::Owned(bin)),
    };
    glb.to_vec().map_err(GlbError::Encode)
}

#[cfg(feature = "glb")]
pub fn save_glb(mesh: &MeshData, path: &Path) -> Result<(), GlbError> {
    let bytes = encode_glb(mesh)?;
    let io_err = |source| GlbError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, bytes).map_err(io_err)
}
