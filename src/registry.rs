//! Minimal model registry (SPEC_FULL §2): maps a requested `model` id to
//! either the foundation model or a registered tensor-runtime backend.
//! Out of core scope per spec §1, but the HTTP surface needs *some* way
//! to route `model` -> backend, and §7 requires `model_not_found` when
//! it can't.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::GatewayError;
use crate::generator::Generator;

pub const FOUNDATION_MODEL_ID: &str = "foundation";

pub enum Backend {
    Foundation,
    TensorRuntime(Arc<dyn Generator>),
}

#[derive(Default)]
pub struct ModelRegistry {
    backends: HashMap<String, Backend>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_foundation(mut self) -> Self {
        self.backends
            .insert(FOUNDATION_MODEL_ID.to_string(), Backend::Foundation);
        self
    }

    pub fn register(mut self, model_id: impl Into<String>, generator: Arc<dyn Generator>) -> Self {
        self.backends
            .insert(model_id.into(), Backend::TensorRuntime(generator));
        self
    }

    pub fn resolve(&self, model_id: &str) -> Result<&Backend, GatewayError> {
        self.backends
            .get(model_id)
            .ok_or_else(|| GatewayError::ModelNotFound(model_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::MockGenerator;

    #[test]
    fn unregistered_model_is_not_found() {
        let registry = ModelRegistry::new().with_foundation();
        let err = registry.resolve("ghost").unwrap_err();
        assert!(matches!(err, GatewayError::ModelNotFound(_)));
    }

    #[test]
    fn foundation_and_named_backends_resolve() {
        let generator: Arc<dyn Generator> = Arc::new(MockGenerator::from_text_pieces(Vec::<String>::new()));
        let registry = ModelRegistry::new()
            .with_foundation()
            .register("qwen-local", generator);

        assert!(matches!(
            registry.resolve(FOUNDATION_MODEL_ID).unwrap(),
            Backend::Foundation
        ));
        assert!(matches!(
            registry.resolve("qwen-local").unwrap(),
            Backend::TensorRuntime(_)
        ));
    }
}
