//! The two administrative protocols of the router.
//!
//! [`RouterApi`] manages production entries and ingests events
//! fire-and-forget. [`TesterApi`] manages test entries and ingests test
//! requests that resolve through a [`TestFuture`]. Both are implemented by
//! [`RouterAdmin`]; callers that only need one side can take it as
//! `&dyn RouterApi` or `&dyn TesterApi`.
//!
//! [`RouterAdmin`]: crate::RouterAdmin

use crate::{
    entry::{Entry, EntryPost, TestEntry, TestEntryPost},
    error::Result,
    tester::{Options, TestFuture},
};
use vigil_core::Event;

/// Production entry management and event ingestion.
#[diagnostic::on_unimplemented(
    message = "`{Self}` does not expose the production router API",
    label = "missing `RouterApi` implementation"
)]
pub trait RouterApi: Send + Sync {
    /// Build and register a production entry.
    ///
    /// Fails with `DuplicateName`, `PriorityConflict` or `BuildFailed`.
    fn post_entry(&self, entry: EntryPost) -> Result<()>;

    /// Remove a production entry.
    fn delete_entry(&self, name: &str) -> Result<()>;

    /// Snapshot of one production entry.
    fn get_entry(&self, name: &str) -> Result<Entry>;

    /// Snapshots of every production entry, in priority order.
    fn get_entries(&self) -> Vec<Entry>;

    /// Rebuild an entry's pipeline from the current policy.
    ///
    /// On failure the previous pipeline is kept but the entry is disabled
    /// until a later reload succeeds.
    fn reload_entry(&self, name: &str) -> Result<()>;

    /// Move an entry to a new priority.
    fn change_entry_priority(&self, name: &str, priority: u32) -> Result<()>;

    /// Enqueue an event for production dispatch.
    ///
    /// Blocks while the queue is full; fails with `QueueClosed` once the
    /// router is stopped.
    fn post_event(&self, event: Event) -> Result<()>;

    /// Decode raw text and enqueue the event.
    fn post_str_event(&self, raw: &str) -> Result<()>;
}

/// Test entry management and test ingestion.
#[diagnostic::on_unimplemented(
    message = "`{Self}` does not expose the tester API",
    label = "missing `TesterApi` implementation"
)]
pub trait TesterApi: Send + Sync {
    /// Build and register a test entry, assigning a priority if none is given.
    fn post_test_entry(&self, entry: TestEntryPost) -> Result<()>;

    /// Remove a test entry.
    fn delete_test_entry(&self, name: &str) -> Result<()>;

    /// Snapshot of one test entry.
    fn get_test_entry(&self, name: &str) -> Result<TestEntry>;

    /// Snapshots of every test entry, in priority order.
    fn get_test_entries(&self) -> Vec<TestEntry>;

    /// Rebuild a test entry's pipeline from the current policy.
    fn reload_test_entry(&self, name: &str) -> Result<()>;

    /// Move a test entry to a new priority.
    fn change_test_entry_priority(&self, name: &str, priority: u32) -> Result<()>;

    /// Queue a test run.
    ///
    /// The target is `options.entry` if set, otherwise the first matching
    /// test entry. Fails with `NotFound` without queuing anything when there
    /// is no target.
    fn ingest_test(&self, event: Event, options: Options) -> Result<TestFuture>;

    /// Decode raw text and queue a test run.
    fn ingest_test_str(&self, raw: &str, options: Options) -> Result<TestFuture>;

    /// Remove test entries idle for longer than their lifetime.
    ///
    /// Returns the names of the removed entries.
    fn expire_test_entries(&self) -> Vec<String>;
}
