//! # vigil-std
//!
//! Standard implementations for the vigil event router.
//!
//! This crate provides:
//! - **Queues**: [`Queue`], the bounded closable MPMC queue feeding workers
//! - **Pipelines**: [`StagePipeline`], [`StageCatalog`] and the built-in
//!   [`stages`]
//! - **Collaborators**: [`MemoryStore`], [`CatalogBuilder`], [`WazuhDecoder`],
//!   [`JsonDecoder`]
//! - **Testing**: controllers and a builder for router tests in [`testing`]

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

// Re-export core traits
pub use vigil_core;

// Modules
pub mod builder;
pub mod catalog;
pub mod decoder;
pub mod pipeline;
pub mod queue;
pub mod stages;
pub mod store;
pub mod testing;

pub use builder::CatalogBuilder;
pub use catalog::{StageCatalog, StageFactory};
pub use decoder::{JsonDecoder, WazuhDecoder};
pub use pipeline::StagePipeline;
pub use queue::{Queue, QueueError};
pub use store::MemoryStore;
