//! Policy definitions and the store that serves them.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Definition of one stage inside a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    /// Name reported in traces.
    pub name: String,
    /// Which stage factory builds this stage.
    pub kind: String,
    /// Factory specific parameters.
    #[serde(default)]
    pub params: Value,
}

impl StageSpec {
    /// Create a stage definition.
    pub fn new(name: impl Into<String>, kind: impl Into<String>, params: Value) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            params,
        }
    }

    /// Read a string parameter.
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

/// A named, ordered list of stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Unique policy name.
    pub name: String,
    /// Stages in execution order.
    #[serde(default)]
    pub stages: Vec<StageSpec>,
}

impl Policy {
    /// Create an empty policy.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Append a stage.
    pub fn with_stage(mut self, stage: StageSpec) -> Self {
        self.stages.push(stage);
        self
    }
}

/// Read-only lookup of policies by name.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a `PolicyStore`",
    label = "missing `PolicyStore` implementation",
    note = "Implement `policy` to serve policies by name."
)]
pub trait PolicyStore: Send + Sync + 'static {
    /// Fetch the current definition of `name`.
    fn policy(&self, name: &str) -> Result<Policy, StoreError>;
}
