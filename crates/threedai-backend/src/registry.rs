use crate::asset::BackendChoice;
use crate::error::BackendError;
use crate::Generate3dAsset;
use std::collections::HashMap;
use std::sync::Arc;

/// Explicitly constructed set of backends, looked up per request.
#[derive(Clone, Default)]
pub struct Backends {
    entries: HashMap<BackendChoice, Arc<dyn Generate3dAsset>>,
}

impl Backends {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, backend: Arc<dyn Generate3dAsset>) -> Self {
        self.register(backend);
        self
    }

    /// Registers `backend` under its own choice, replacing any previous one.
    pub fn register(&mut self, backend: Arc<dyn Generate3dAsset>) {
        self.entries.insert(backend.choice(), backend);
    }

    pub fn get(&self, choice: BackendChoice) -> Result<Arc<dyn Generate3dAsset>, BackendError> {
        self.entries
            .get(&choice)
            .cloned()
            .ok_or(BackendError::NotConfigured(choice))
    }

    pub fn choices(&self) -> Vec<BackendChoice> {
        let mut choices: Vec<_> = self.entries.keys().copied().collect();
        choices.sort_by_key(|c| c.as_str());
        choices
    }
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends")
            .field("choices", &self.choices())
            .finish()
    }
}
