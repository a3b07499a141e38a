use std::sync::Arc;

use crate::config::ServerConfig;
use crate::core::CoreState;

/// Application state that can be shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    /// Inference collaborators shared by every session
    pub core_state: Arc<CoreState>,
}

impl AppState {
    /// Build the HTTP collaborator clients described by `config`.
    pub fn new(config: ServerConfig) -> anyhow::Result<Arc<Self>> {
        let core_state = CoreState::new(&config)?;
        Ok(Self::with_core(config, core_state))
    }

    /// Use already constructed collaborators, e.g. test fakes.
    pub fn with_core(config: ServerConfig, core_state: Arc<CoreState>) -> Arc<Self> {
        Arc::new(Self { config, core_state })
    }
}
