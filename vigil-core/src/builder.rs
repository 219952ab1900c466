//! Collaborator interfaces consumed by the router.
//!
//! - [`Builder`] turns a policy name into a runnable [`Controller`]
//! - [`Decoder`] turns raw text into an [`Event`]

use crate::{
    controller::SharedController,
    error::{BuildError, ParseError},
    event::Event,
};

/// Builds runnable pipelines from named policies.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a pipeline `Builder`",
    label = "missing `Builder` implementation",
    note = "Implement `build` to turn a policy name into a controller."
)]
pub trait Builder: Send + Sync + 'static {
    /// Build a fresh controller for `policy`.
    fn build(&self, policy: &str) -> Result<SharedController, BuildError>;
}

/// Decodes raw event text.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not an event `Decoder`",
    label = "missing `Decoder` implementation",
    note = "Implement `decode` to parse raw text into an `Event`."
)]
pub trait Decoder: Send + Sync + 'static {
    /// Parse `raw` into an event.
    fn decode(&self, raw: &str) -> Result<Event, ParseError>;
}
