//! Test entries and the request/response protocol around them.
//!
//! # Overview
//!
//! Testing runs an event through a named pipeline and hands back the
//! processed event together with stage-level traces. Requests travel through
//! their own queue to their own workers, so a slow test never holds up
//! production traffic.
//!
//! ```text
//! ingest_test(event, options)
//!        │  resolve tester (first match or options.entry)
//!        ▼
//! ┌──────────────┐   pop    ┌─────────────┐  run   ┌────────┐
//! │ test queue   │ ───────► │ test worker │ ─────► │ Tester │
//! └──────────────┘          └─────────────┘        └────────┘
//!        ▲                         │ resolve
//!        │                         ▼
//!   PendingTest ─────────────► TestFuture
//! ```
//!
//! A [`TestFuture`] resolves exactly once: with an [`Output`], with the
//! pipeline's error, or with [`RouterError::Cancelled`] when the router is
//! stopped before the request runs.

use crate::{
    entry::{PipelineSlot, TestEntry, TestEntryPost},
    error::{Result, RouterError},
    router::run_guarded,
    set::Ranked,
};
use chrono::{DateTime, TimeDelta, Utc};
use futures::channel::oneshot;
use parking_lot::Mutex;
use std::{
    collections::BTreeSet,
    future::Future,
    pin::Pin,
    sync::atomic::{AtomicU32, Ordering},
    task::{Context, Poll},
    time::Duration,
};
use vigil_core::{BuildError, Event, FilterSpec, Trace, TraceSink};

// ============================================================================
// Options and output
// ============================================================================

/// Which stages report traces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TraceLevel {
    /// No traces.
    #[default]
    None,
    /// Only the named stages.
    Named(BTreeSet<String>),
    /// Every executed stage.
    Full,
}

/// Options of a single test request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// Trace level.
    pub trace: TraceLevel,
    /// Test entry to run directly, bypassing filter matching.
    pub entry: Option<String>,
}

impl Options {
    /// No traces, first-match selection.
    pub fn none() -> Self {
        Self::default()
    }

    /// Trace every stage.
    pub fn full_trace() -> Self {
        Self {
            trace: TraceLevel::Full,
            entry: None,
        }
    }

    /// Trace only the given stages.
    pub fn named_trace<I, S>(stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            trace: TraceLevel::Named(stages.into_iter().map(Into::into).collect()),
            entry: None,
        }
    }

    /// Target a test entry by name.
    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = Some(entry.into());
        self
    }
}

/// Result of a test run.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    /// The processed event.
    pub event: Event,
    /// Trace lines in execution order.
    pub traces: Vec<Trace>,
}

/// What a [`TestFuture`] resolves to.
pub type TestResult = Result<Output>;

/// Collects trace lines allowed by a [`TraceLevel`].
struct TraceCollector<'a> {
    level: &'a TraceLevel,
    traces: Vec<Trace>,
}

impl TraceSink for TraceCollector<'_> {
    fn is_enabled(&self, stage: &str) -> bool {
        match self.level {
            TraceLevel::None => false,
            TraceLevel::Named(stages) => stages.contains(stage),
            TraceLevel::Full => true,
        }
    }

    fn record(&mut self, stage: &str, message: String) {
        self.traces.push(Trace::new(stage, message));
    }
}

// ============================================================================
// Tester
// ============================================================================

/// A test entry.
pub struct Tester {
    name: String,
    policy: String,
    filter: FilterSpec,
    description: Option<String>,
    priority: AtomicU32,
    lifetime: Option<Duration>,
    last_use: Mutex<DateTime<Utc>>,
    slot: PipelineSlot,
}

impl Tester {
    pub(crate) fn new(
        post: TestEntryPost,
        priority: u32,
        controller: vigil_core::SharedController,
    ) -> Self {
        Self {
            name: post.name,
            policy: post.policy,
            filter: post.filter,
            description: post.description,
            priority: AtomicU32::new(priority),
            lifetime: post.lifetime,
            last_use: Mutex::new(Utc::now()),
            slot: PipelineSlot::new(controller),
        }
    }

    /// The entry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current priority.
    pub fn priority(&self) -> u32 {
        self.priority.load(Ordering::Acquire)
    }

    /// The policy the pipeline is built from.
    pub fn policy(&self) -> &str {
        &self.policy
    }

    /// Whether the entry takes part in matching.
    pub fn is_enabled(&self) -> bool {
        self.slot.is_enabled()
    }

    /// Whether the entry is enabled and its filter accepts `event`.
    pub fn matches(&self, event: &Event) -> bool {
        self.is_enabled() && self.filter.matches(event)
    }

    /// Record a use, pushing back expiry.
    pub fn touch(&self) {
        *self.last_use.lock() = Utc::now();
    }

    /// Whether the entry has been idle longer than its lifetime at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let Some(lifetime) = self.lifetime else {
            return false;
        };
        let Ok(lifetime) = TimeDelta::from_std(lifetime) else {
            return false;
        };
        self.last_use
            .lock()
            .checked_add_signed(lifetime)
            .is_some_and(|deadline| deadline < now)
    }

    /// Run `event` through the pipeline, collecting traces per `options`.
    ///
    /// A disabled entry fails with [`RouterError::BuildFailed`] carrying the
    /// last build error.
    pub fn run(&self, event: Event, options: &Options) -> TestResult {
        if !self.slot.is_enabled() {
            let reason = self
                .slot
                .last_error()
                .unwrap_or_else(|| "entry is disabled".to_owned());
            return Err(RouterError::build_failed(
                &self.policy,
                BuildError::Custom(reason.into()),
            ));
        }

        let controller = self.slot.controller();
        match &options.trace {
            TraceLevel::None => {
                let event = run_guarded(&self.name, &controller, event, None)?;
                Ok(Output {
                    event,
                    traces: Vec::new(),
                })
            }
            level => {
                let mut collector = TraceCollector {
                    level,
                    traces: Vec::new(),
                };
                let event = run_guarded(&self.name, &controller, event, Some(&mut collector))?;
                Ok(Output {
                    event,
                    traces: collector.traces,
                })
            }
        }
    }

    pub(crate) fn slot(&self) -> &PipelineSlot {
        &self.slot
    }

    /// Copy the entry's current state.
    pub fn snapshot(&self) -> TestEntry {
        TestEntry {
            name: self.name.clone(),
            policy: self.policy.clone(),
            filter: self.filter.clone(),
            priority: self.priority(),
            description: self.description.clone(),
            status: self.slot.status(),
            lifetime: self.lifetime,
            last_use: *self.last_use.lock(),
        }
    }
}

impl Ranked for Tester {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u32 {
        Tester::priority(self)
    }

    fn set_priority(&self, priority: u32) {
        self.priority.store(priority, Ordering::Release);
    }
}

impl std::fmt::Debug for Tester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tester")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("priority", &self.priority())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

// ============================================================================
// Pending requests
// ============================================================================

/// A queued test request.
///
/// Refers to its tester by name; the worker resolves it again when the
/// request runs, so a deleted entry yields [`RouterError::NotFound`].
pub(crate) struct PendingTest {
    pub(crate) event: Event,
    pub(crate) options: Options,
    pub(crate) entry: String,
    responder: oneshot::Sender<TestResult>,
}

impl PendingTest {
    /// Create a request and the future its caller waits on.
    pub(crate) fn new(event: Event, options: Options, entry: String) -> (Self, TestFuture) {
        let (responder, receiver) = oneshot::channel();
        let pending = Self {
            event,
            options,
            entry,
            responder,
        };
        (pending, TestFuture { receiver })
    }

    /// Split into the request parts and the completion handle.
    pub(crate) fn into_parts(self) -> (Event, Options, String, Responder) {
        (
            self.event,
            self.options,
            self.entry,
            Responder(self.responder),
        )
    }

    /// Resolve with [`RouterError::Cancelled`].
    pub(crate) fn cancel(self) {
        Responder(self.responder).resolve(Err(RouterError::Cancelled));
    }
}

/// Completion handle of a [`PendingTest`].
pub(crate) struct Responder(oneshot::Sender<TestResult>);

impl Responder {
    pub(crate) fn resolve(self, result: TestResult) {
        // The caller may have dropped its future.
        let _ = self.0.send(result);
    }
}

// ============================================================================
// Future
// ============================================================================

/// The caller's handle on a queued test request.
///
/// Await it, poll it with [`try_take`](Self::try_take), or block on it with
/// [`wait`](Self::wait).
#[must_use = "a test result is only observable through its future"]
#[derive(Debug)]
pub struct TestFuture {
    receiver: oneshot::Receiver<TestResult>,
}

impl TestFuture {
    /// Take the result if it is ready, without blocking.
    pub fn try_take(&mut self) -> Option<TestResult> {
        match self.receiver.try_recv() {
            Ok(Some(result)) => Some(result),
            Ok(None) => None,
            Err(oneshot::Canceled) => Some(Err(RouterError::Cancelled)),
        }
    }

    /// Block the current thread until the result is available.
    pub fn wait(self) -> TestResult {
        futures::executor::block_on(self)
    }
}

impl Future for TestFuture {
    type Output = TestResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().receiver)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(RouterError::Cancelled)))
    }
}
