//! Stage catalog.
//!
//! The catalog maps a stage *kind* (the `kind` of a [`StageSpec`]) to the
//! factory that builds it. Built-in kinds are collected at link time through
//! `inventory`; additional kinds can be registered per catalog at runtime and
//! take precedence over built-ins of the same name.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use vigil_core::{BuildError, Stage, StageSpec};

/// Signature of a built-in stage factory.
pub type StageConstructor = fn(&StageSpec) -> Result<Box<dyn Stage>, BuildError>;

/// A built-in stage factory, submitted through `inventory`.
pub struct StageFactory {
    /// The kind this factory builds.
    pub kind: &'static str,
    /// The factory function.
    pub build: StageConstructor,
}

impl StageFactory {
    /// Create a factory entry.
    pub const fn new(kind: &'static str, build: StageConstructor) -> Self {
        Self { kind, build }
    }
}

inventory::collect!(StageFactory);

type CustomFactory = Arc<dyn Fn(&StageSpec) -> Result<Box<dyn Stage>, BuildError> + Send + Sync>;

/// Resolves stage kinds to factories.
#[derive(Default, Clone)]
pub struct StageCatalog {
    custom: HashMap<String, CustomFactory>,
}

impl StageCatalog {
    /// Create a catalog with only the built-in kinds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for `kind`, replacing any previous one.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&StageSpec) -> Result<Box<dyn Stage>, BuildError> + Send + Sync + 'static,
    {
        self.custom.insert(kind.into(), Arc::new(factory));
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<F>(mut self, kind: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&StageSpec) -> Result<Box<dyn Stage>, BuildError> + Send + Sync + 'static,
    {
        self.register(kind, factory);
        self
    }

    /// Every kind this catalog can build, sorted.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: BTreeSet<String> = inventory::iter::<StageFactory>
            .into_iter()
            .map(|f| f.kind.to_owned())
            .collect();
        kinds.extend(self.custom.keys().cloned());
        kinds.into_iter().collect()
    }

    /// Build the stage described by `spec`.
    pub fn build(&self, spec: &StageSpec) -> Result<Arc<dyn Stage>, BuildError> {
        if let Some(factory) = self.custom.get(&spec.kind) {
            return factory(spec).map(Arc::from);
        }
        inventory::iter::<StageFactory>
            .into_iter()
            .find(|f| f.kind == spec.kind)
            .ok_or_else(|| BuildError::UnknownStage {
                stage: spec.name.clone(),
                kind: spec.kind.clone(),
            })
            .and_then(|f| (f.build)(spec))
            .map(Arc::from)
    }
}

impl std::fmt::Debug for StageCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageCatalog")
            .field("kinds", &self.kinds())
            .finish()
    }
}
