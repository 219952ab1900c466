//! # Pipeline Stage
//!
//! A [`Stage`] is one step of a processing pipeline: it receives the event
//! being processed, may mutate it, and decides whether the pipeline continues
//! (`Next`) or ends here (`Stop`).
//!
//! Stages are the unit reported in test traces: every executed stage yields
//! exactly one trace line under its [`Stage::name`].

use crate::{error::BoxError, event::Event};

/// Result of stage execution indicating whether the pipeline continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Continue with the next stage.
    Next,
    /// End the pipeline successfully; later stages are skipped.
    Stop,
}

/// One step of a processing pipeline.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a pipeline `Stage`",
    label = "missing `Stage` implementation",
    note = "Stages must implement `name` and `apply`."
)]
pub trait Stage: Send + Sync + 'static {
    /// The name reported in traces.
    fn name(&self) -> &str;

    /// Process the event in place.
    fn apply(&self, event: &mut Event) -> Result<Flow, BoxError>;
}
