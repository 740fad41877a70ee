use serde::{Deserialize, Serialize};

/// Whether an optional converter was compiled into this build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum Capability {
    Available,
    Unavailable(String),
}

impl Capability {
    pub fn reason(&self) -> Option<&str> {
        match self {
            Capability::Available => None,
            Capability::Unavailable(reason) => Some(reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub step_export: Capability,
    pub glb_import: Capability,
}

pub fn step_export() -> Capability {
    if cfg!(feature = "step") {
        Capability::Available
    } else {
        Capability::Unavailable("threedai-core was built without the `step` feature".to_string())
    }
}

pub fn glb_import() -> Capability {
    if cfg!(feature = "glb") {
        Capability::Available
    } else {
        Capability::Unavailable("threedai-core was built without the `glb` feature".to_string())
    }
}

pub fn capabilities() -> Capabilities {
    Capabilities {
        step_export: step_export(),
        glb_import: glb_import(),
    }
}
