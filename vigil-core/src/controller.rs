//! # Controller (built pipeline)
//!
//! A [`Controller`] is the opaque, already-built callable produced by a
//! [`Builder`]. The router never looks inside it: production dispatch calls
//! [`Controller::ingest`] without a trace sink, test dispatch passes one.
//!
//! [`Builder`]: crate::Builder

use crate::{error::BoxError, event::Event};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A single trace line produced while testing a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    /// The stage that produced the line.
    pub stage: String,
    /// What happened in that stage.
    pub message: String,
}

impl Trace {
    /// Create a trace line.
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// Receives stage-level trace lines during a traced run.
pub trait TraceSink {
    /// Whether lines for `stage` should be recorded at all.
    fn is_enabled(&self, stage: &str) -> bool;

    /// Record a line for `stage`.
    fn record(&mut self, stage: &str, message: String);
}

/// A built, runnable processing pipeline.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a `Controller`",
    label = "missing `Controller` implementation",
    note = "Controllers must implement `ingest`."
)]
pub trait Controller: Send + Sync + 'static {
    /// Run the event through the pipeline, returning the processed event.
    fn ingest(&self, event: Event, trace: Option<&mut dyn TraceSink>) -> Result<Event, BoxError>;

    /// Names of the stages this controller runs, in order.
    fn stages(&self) -> Vec<String> {
        Vec::new()
    }
}

/// A controller shared between an entry and the workers running it.
pub type SharedController = Arc<dyn Controller>;
