//! HTTP service that turns an uploaded image into a preview video and a
//! 3D model through one of the generation backends.

pub mod admission;
pub mod config;
pub mod handler;
pub mod http;
pub mod store;

pub use config::{ConfigError, ServerConfig};
pub use handler::{ApiError, Artifact, HandlerOptions, ProcessResponse, RequestHandler, Upload};
pub use http::{HttpError, HttpServer, ShutdownHandle};
pub use store::{ArtifactLayout, ProcessRecord, ProcessStatus, ResultStore, StoreError};
