//! Catalog-driven pipeline builder.

use crate::{catalog::StageCatalog, pipeline::StagePipeline};
use std::sync::Arc;
use vigil_core::{BuildError, Builder, PolicyStore, SharedController};

/// Builds a [`StagePipeline`] from a stored policy, resolving each stage kind
/// through a [`StageCatalog`].
pub struct CatalogBuilder {
    store: Arc<dyn PolicyStore>,
    catalog: StageCatalog,
}

impl CatalogBuilder {
    /// Create a builder reading from `store` with the built-in stage kinds.
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self::with_catalog(store, StageCatalog::new())
    }

    /// Create a builder with a custom catalog.
    pub fn with_catalog(store: Arc<dyn PolicyStore>, catalog: StageCatalog) -> Self {
        Self { store, catalog }
    }

    /// The catalog used to resolve stages.
    pub fn catalog(&self) -> &StageCatalog {
        &self.catalog
    }
}

impl Builder for CatalogBuilder {
    fn build(&self, policy: &str) -> Result<SharedController, BuildError> {
        let definition = self.store.policy(policy)?;
        if definition.stages.is_empty() {
            return Err(BuildError::EmptyPolicy(definition.name));
        }

        let stages = definition
            .stages
            .iter()
            .map(|spec| self.catalog.build(spec))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(policy = %policy, stages = stages.len(), "pipeline built");
        Ok(Arc::new(StagePipeline::new(definition.name, stages)))
    }
}
