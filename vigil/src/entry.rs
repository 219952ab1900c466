//! Entry descriptors and snapshots.
//!
//! An *entry* is a named, prioritized pipeline plus the filter that decides
//! which events it receives. Callers describe new entries with [`EntryPost`]
//! and [`TestEntryPost`]; reads return the [`Entry`] and [`TestEntry`]
//! snapshots, which are copies taken under the set's read lock.

use crate::error::{Result, RouterError};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use vigil_core::{BuildError, FilterSpec, SharedController};

/// Highest precedence a priority can express.
pub const MIN_PRIORITY: u32 = 1;
/// Lowest precedence a priority can express.
pub const MAX_PRIORITY: u32 = 1000;

/// Reject priorities outside `MIN_PRIORITY..=MAX_PRIORITY`.
pub(crate) fn check_priority(priority: u32) -> Result<()> {
    if (MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
        Ok(())
    } else {
        Err(RouterError::PriorityConflict {
            priority,
            reason: format!("must be within {MIN_PRIORITY}..={MAX_PRIORITY}"),
        })
    }
}

/// Whether an entry takes part in matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// The pipeline is built and receives events.
    Enabled,
    /// The last reload failed; the entry is skipped during matching.
    Disabled,
}

// ============================================================================
// Posts
// ============================================================================

/// Description of a new production entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryPost {
    /// Unique name within the production set.
    pub name: String,
    /// Policy the pipeline is built from.
    pub policy: String,
    /// Which events the entry receives.
    #[serde(default)]
    pub filter: FilterSpec,
    /// Position in the set; lower numbers win.
    pub priority: u32,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
}

impl EntryPost {
    /// Describe an entry.
    pub fn new(
        name: impl Into<String>,
        policy: impl Into<String>,
        filter: FilterSpec,
        priority: u32,
    ) -> Self {
        Self {
            name: name.into(),
            policy: policy.into(),
            filter,
            priority,
            description: None,
        }
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Description of a new test entry.
///
/// Unlike production entries the priority is optional; when omitted the
/// entry goes after every existing test entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestEntryPost {
    /// Unique name within the test set.
    pub name: String,
    /// Policy the pipeline is built from.
    pub policy: String,
    /// Which events the entry receives when no target is named.
    #[serde(default)]
    pub filter: FilterSpec,
    /// Position in the set; assigned automatically when `None`.
    #[serde(default)]
    pub priority: Option<u32>,
    /// Idle time after which the entry can be expired.
    #[serde(default, with = "humantime_serde")]
    pub lifetime: Option<Duration>,
    /// Free-form description.
    #[serde(default)]
    pub description: Option<String>,
}

impl TestEntryPost {
    /// Describe a test entry with an automatic priority and no lifetime.
    pub fn new(name: impl Into<String>, policy: impl Into<String>, filter: FilterSpec) -> Self {
        Self {
            name: name.into(),
            policy: policy.into(),
            filter,
            priority: None,
            lifetime: None,
            description: None,
        }
    }

    /// Use an explicit priority.
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Expire the entry after `lifetime` without use.
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

// ============================================================================
// Snapshots
// ============================================================================

/// Snapshot of a production entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    /// Entry name.
    pub name: String,
    /// Policy name.
    pub policy: String,
    /// Routing filter.
    pub filter: FilterSpec,
    /// Current priority.
    pub priority: u32,
    /// Description, if any.
    pub description: Option<String>,
    /// Current status.
    pub status: EntryStatus,
    /// When the pipeline was last built successfully.
    pub last_update: DateTime<Utc>,
}

/// Snapshot of a test entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestEntry {
    /// Entry name.
    pub name: String,
    /// Policy name.
    pub policy: String,
    /// Routing filter.
    pub filter: FilterSpec,
    /// Current priority.
    pub priority: u32,
    /// Description, if any.
    pub description: Option<String>,
    /// Current status.
    pub status: EntryStatus,
    /// Idle lifetime, if any.
    #[serde(with = "humantime_serde")]
    pub lifetime: Option<Duration>,
    /// When the entry was created or last received a test.
    pub last_use: DateTime<Utc>,
}

// ============================================================================
// Pipeline slot
// ============================================================================

/// The built pipeline of an entry plus its build bookkeeping.
///
/// Readers clone the controller handle and run it outside the lock, so a
/// swap never waits for in-flight events.
pub(crate) struct PipelineSlot {
    controller: RwLock<SharedController>,
    enabled: AtomicBool,
    last_update: Mutex<DateTime<Utc>>,
    last_error: Mutex<Option<String>>,
}

impl PipelineSlot {
    pub(crate) fn new(controller: SharedController) -> Self {
        Self {
            controller: RwLock::new(controller),
            enabled: AtomicBool::new(true),
            last_update: Mutex::new(Utc::now()),
            last_error: Mutex::new(None),
        }
    }

    pub(crate) fn controller(&self) -> SharedController {
        self.controller.read().clone()
    }

    /// Install a freshly built pipeline and re-enable the entry.
    pub(crate) fn replace(&self, controller: SharedController) {
        *self.controller.write() = controller;
        *self.last_update.lock() = Utc::now();
        self.last_error.lock().take();
        self.enabled.store(true, Ordering::Release);
    }

    /// Keep the current pipeline but take the entry out of matching.
    pub(crate) fn fail(&self, err: &BuildError) {
        *self.last_error.lock() = Some(err.to_string());
        self.enabled.store(false, Ordering::Release);
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub(crate) fn status(&self) -> EntryStatus {
        if self.is_enabled() {
            EntryStatus::Enabled
        } else {
            EntryStatus::Disabled
        }
    }

    pub(crate) fn last_update(&self) -> DateTime<Utc> {
        *self.last_update.lock()
    }

    pub(crate) fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }
}
