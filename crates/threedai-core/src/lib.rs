//! Mesh data and file-format conversion for threedai.
//!
//! The typed layer ([`stl`], [`step`], [`glb`]) returns `Result`s. The
//! [`convert`] module wraps it in the boolean API the service uses, where
//! failures are logged and reported as `false`.

pub mod capability;
pub mod convert;
pub mod glb;
pub mod mesh;
pub mod step;
pub mod stl;

pub use capability::{capabilities, Capabilities, Capability};
pub use convert::{glb_to_stl, mesh_to_step, mesh_to_stl};
pub use mesh::{MeshData, MeshError};
