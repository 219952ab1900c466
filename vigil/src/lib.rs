//! # vigil - Priority-Ordered Event Router
//!
//! `vigil` is the dispatch core of a security-telemetry engine. It routes a
//! continuous stream of normalized events into exactly one of several
//! priority-ordered pipelines ("entries"), and separately runs on-demand test
//! requests through named pipelines, returning traced results through a
//! future without slowing production traffic down.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use vigil::{EntryPost, FilterSpec, Options, RouterAdmin, RouterApi, RouterConfig, TesterApi};
//!
//! let admin = RouterAdmin::new(RouterConfig::default(), builder, decoder)?;
//! admin.post_entry(EntryPost::new("host1", "policy-a", FilterSpec::subject("host1"), 1))?;
//! admin.post_entry(EntryPost::new("default", "policy-b", FilterSpec::subject("*"), 2))?;
//! admin.start()?;
//!
//! admin.post_event(event)?;                       // fire-and-forget
//! let output = admin.ingest_test(event, Options::full_trace())?.await?;
//! ```
//!
//! ## Architecture
//!
//! | Component | Role |
//! |-----------|------|
//! | [`RouterAdmin`] | Owns both entry sets, both queues and both worker pools |
//! | [`Router`] | A production entry: filter, priority, built pipeline |
//! | [`Tester`] | A test entry: same, plus traced runs and an idle lifetime |
//! | [`TestFuture`] | The caller's handle on a queued test request |
//!
//! Production entries and test entries live in separate sets with separate
//! locks and queues. Structural changes (post, delete, reload, reprioritize)
//! are serialized per set and never hold the lock dispatch reads while a
//! pipeline is being built.
//!
//! ## Error Types
//!
//! - [`RouterError`] - Everything the router and tester APIs return
//! - [`ConfigError`] - Configuration loading and validation

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod admin;
mod api;
pub mod config;
mod entry;
mod error;
mod router;
mod set;
mod stats;
mod tester;
mod worker;

pub use admin::{LifecycleState, RouterAdmin};
pub use api::{RouterApi, TesterApi};
pub use config::{
    ConfigError, DecoderKind, DispatchMode, EngineConfig, LoggingConfig, NoMatchPolicy,
    RouterConfig,
};
pub use entry::{
    Entry, EntryPost, EntryStatus, MAX_PRIORITY, MIN_PRIORITY, TestEntry, TestEntryPost,
};
pub use error::{Result, RouterError};
pub use router::Router;
pub use stats::DispatchStats;
pub use tester::{Options, Output, TestFuture, TestResult, TraceLevel, Tester};

// Core types callers need alongside the router.
pub use vigil_core::{Event, FilterSpec, Trace};
pub use vigil_std;
