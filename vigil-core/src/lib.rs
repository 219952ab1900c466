//! # vigil-core
//!
//! Core types for the vigil event router.
//!
//! This crate has minimal dependencies and is designed to be imported by
//! pipeline builders, stores and decoders that plug into the router without
//! depending on the dispatch engine itself.
//!
//! # Building Blocks
//!
//! ## [`Event`]
//!
//! The normalized unit of telemetry: a subject (agent/source) plus a JSON
//! document. Moved through queues, owned by exactly one worker at a time.
//!
//! ## [`Stage`] and [`Controller`]
//!
//! A pipeline is a sequence of stages. Once built, the router only sees it as
//! an opaque [`Controller`] that ingests an event, optionally reporting
//! stage-level [`Trace`] lines to a [`TraceSink`].
//!
//! ## [`FilterSpec`]
//!
//! The routing predicate attached to every entry.
//!
//! ## Collaborators
//!
//! - [`Builder`] - builds controllers from policy names
//! - [`PolicyStore`] - serves policy definitions
//! - [`Decoder`] - parses raw event text
//!
//! # Error Types
//!
//! - [`BuildError`] - Pipeline construction errors
//! - [`StoreError`] - Policy lookup errors
//! - [`ParseError`] - Raw event decoding errors
//! - [`FieldError`] - Event field write errors

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod builder;
mod controller;
mod error;
mod event;
mod filter;
mod policy;
mod stage;

// Re-exports
pub use builder::{Builder, Decoder};
pub use controller::{Controller, SharedController, Trace, TraceSink};
pub use error::{BoxError, BuildError, FieldError, ParseError, StoreError};
pub use event::Event;
pub use filter::FilterSpec;
pub use policy::{Policy, PolicyStore, StageSpec};
pub use stage::{Flow, Stage};
