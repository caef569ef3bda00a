use std::sync::Arc;

use crate::config::Config;
use crate::generator::FoundationClient;
use crate::registry::ModelRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub config: Arc<Config>,
    pub foundation: Option<FoundationClient>,
}

impl AppState {
    pub fn new(registry: ModelRegistry, config: Config, foundation: Option<FoundationClient>) -> Self {
        Self {
            registry: Arc::new(registry),
            config: Arc::new(config),
            foundation,
        }
    }
}
