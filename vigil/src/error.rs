//! Error taxonomy of the router façade.
//!
//! Every administrative operation returns [`RouterError`] synchronously.
//! Failures inside pipelines never reach the caller of `post_event`; on the
//! testing path they are delivered through the [`TestFuture`].
//!
//! [`TestFuture`]: crate::TestFuture

use crate::config::ConfigError;
use thiserror::Error;
use vigil_core::{BoxError, BuildError, ParseError};
use vigil_std::QueueError;

/// Errors returned by the router and tester APIs.
#[derive(Error, Debug)]
pub enum RouterError {
    /// No entry with the given name exists, or no entry matched the event.
    #[error("no entry found for '{0}'")]
    NotFound(String),

    /// An entry with the same name already exists in the set.
    #[error("entry '{0}' already exists")]
    DuplicateName(String),

    /// The priority is out of range or already taken.
    #[error("priority {priority} rejected: {reason}")]
    PriorityConflict {
        /// The rejected priority.
        priority: u32,
        /// Why it was rejected.
        reason: String,
    },

    /// The pipeline for a policy could not be built.
    #[error("failed to build policy '{policy}': {source}")]
    BuildFailed {
        /// The policy that failed.
        policy: String,
        /// The builder's error.
        #[source]
        source: BuildError,
    },

    /// Raw event text could not be decoded.
    #[error("failed to parse event: {0}")]
    Parse(#[from] ParseError),

    /// The router was stopped and no longer accepts work.
    #[error("queue is closed")]
    QueueClosed,

    /// A queued test request was cancelled before it ran.
    #[error("test request cancelled")]
    Cancelled,

    /// A pipeline returned an error or panicked.
    #[error("pipeline of entry '{entry}' failed: {source}")]
    PipelineRuntime {
        /// The entry whose pipeline failed.
        entry: String,
        /// The pipeline's error.
        #[source]
        source: BoxError,
    },

    /// `start` was called on a running router.
    #[error("router is already running")]
    AlreadyRunning,

    /// `start` was called after `stop`.
    #[error("router has been stopped")]
    Stopped,

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<QueueError> for RouterError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Closed => RouterError::QueueClosed,
        }
    }
}

impl RouterError {
    pub(crate) fn build_failed(policy: &str, source: BuildError) -> Self {
        RouterError::BuildFailed {
            policy: policy.to_owned(),
            source,
        }
    }

    pub(crate) fn runtime(entry: &str, source: BoxError) -> Self {
        RouterError::PipelineRuntime {
            entry: entry.to_owned(),
            source,
        }
    }
}

/// Result alias for router operations.
pub type Result<T, E = RouterError> = std::result::Result<T, E>;
