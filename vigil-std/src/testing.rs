//! Testing utilities for vigil.
//!
//! This module provides controllers and a builder that make router behaviour
//! observable in tests.
//!
//! # Features
//!
//! - [`RecordingController`]: records every event it ingests
//! - [`FailingController`]: always returns an error
//! - [`PanickingController`]: always panics
//! - [`BlockingController`]: parks the calling worker until released
//! - [`StaticBuilder`]: a [`Builder`] serving pre-made controllers by name

use parking_lot::{Condvar, Mutex, RwLock};
use serde_json::json;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use vigil_core::{
    BoxError, BuildError, Builder, Controller, Event, SharedController, StoreError, TraceSink,
};

/// Field written by [`RecordingController`] with its label.
pub const ROUTED_TO: &str = "/routed_to";

// ============================================================================
// Recording Controller
// ============================================================================

/// A controller that records all events it receives.
///
/// Clones share the same record, so a test can keep one clone while the
/// router owns another.
///
/// # Example
///
/// ```rust,ignore
/// let recorder = RecordingController::new("A");
/// let builder = StaticBuilder::new().with_controller("policy-a", recorder.shared());
///
/// // Route events...
///
/// assert_eq!(recorder.subjects(), vec!["host1"]);
/// ```
#[derive(Clone)]
pub struct RecordingController {
    label: String,
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingController {
    /// Create a recorder tagging events with `label`.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A shared handle usable as a router pipeline.
    pub fn shared(&self) -> SharedController {
        Arc::new(self.clone())
    }

    /// The label written into ingested events.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Get a clone of the recorded events.
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Subjects of the recorded events, in ingestion order.
    pub fn subjects(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .map(|e| e.subject().to_owned())
            .collect()
    }

    /// Get the number of recorded events.
    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    /// Clear all recorded events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Controller for RecordingController {
    fn ingest(
        &self,
        mut event: Event,
        trace: Option<&mut dyn TraceSink>,
    ) -> Result<Event, BoxError> {
        self.events.lock().push(event.clone());
        event.set(ROUTED_TO, json!(self.label))?;
        if let Some(sink) = trace {
            if sink.is_enabled(&self.label) {
                sink.record(&self.label, "recorded".to_owned());
            }
        }
        Ok(event)
    }

    fn stages(&self) -> Vec<String> {
        vec![self.label.clone()]
    }
}

// ============================================================================
// Failure controllers
// ============================================================================

/// A controller that always fails.
#[derive(Debug, Clone)]
pub struct FailingController {
    message: String,
    calls: Arc<AtomicUsize>,
}

impl FailingController {
    /// Create a controller failing with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// How many times the controller was invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Controller for FailingController {
    fn ingest(&self, _event: Event, _trace: Option<&mut dyn TraceSink>) -> Result<Event, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.message.clone().into())
    }
}

/// A controller that always panics.
#[derive(Debug, Clone, Copy, Default)]
pub struct PanickingController;

impl Controller for PanickingController {
    fn ingest(&self, event: Event, _trace: Option<&mut dyn TraceSink>) -> Result<Event, BoxError> {
        panic!("controller panicked on event from {}", event.subject())
    }
}

// ============================================================================
// Blocking Controller
// ============================================================================

/// A controller that parks every caller until [`release`](Self::release).
///
/// Useful to keep workers busy while a test fills a queue.
#[derive(Clone, Default)]
pub struct BlockingController {
    gate: Arc<(Mutex<bool>, Condvar)>,
    entered: Arc<AtomicUsize>,
}

impl BlockingController {
    /// Create a closed gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the gate, letting every parked and future caller through.
    pub fn release(&self) {
        let (open, cvar) = &*self.gate;
        *open.lock() = true;
        cvar.notify_all();
    }

    /// Number of callers that entered the controller so far.
    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }
}

impl Controller for BlockingController {
    fn ingest(&self, event: Event, _trace: Option<&mut dyn TraceSink>) -> Result<Event, BoxError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let (open, cvar) = &*self.gate;
        let mut guard = open.lock();
        while !*guard {
            cvar.wait(&mut guard);
        }
        Ok(event)
    }
}

// ============================================================================
// Static Builder
// ============================================================================

type Factory = Arc<dyn Fn() -> Result<SharedController, BuildError> + Send + Sync>;

/// A [`Builder`] serving controllers registered by policy name.
///
/// Unknown policies fail with [`StoreError::NotFound`]. Registrations can be
/// changed while a router holds the builder, which makes reload behaviour
/// testable.
#[derive(Default)]
pub struct StaticBuilder {
    factories: RwLock<HashMap<String, Factory>>,
    builds: Mutex<HashMap<String, usize>>,
}

impl StaticBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `controller` for `policy`.
    pub fn with_controller(self, policy: impl Into<String>, controller: SharedController) -> Self {
        self.set_controller(policy, controller);
        self
    }

    /// Serve the result of `factory` for `policy`.
    pub fn with_factory<F>(self, policy: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<SharedController, BuildError> + Send + Sync + 'static,
    {
        self.set_factory(policy, factory);
        self
    }

    /// Replace the controller served for `policy`.
    pub fn set_controller(&self, policy: impl Into<String>, controller: SharedController) {
        self.set_factory(policy, move || Ok(Arc::clone(&controller)));
    }

    /// Replace the factory for `policy`.
    pub fn set_factory<F>(&self, policy: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<SharedController, BuildError> + Send + Sync + 'static,
    {
        self.factories.write().insert(policy.into(), Arc::new(factory));
    }

    /// Stop serving `policy`.
    pub fn remove(&self, policy: &str) {
        self.factories.write().remove(policy);
    }

    /// How many successful builds were made for `policy`.
    pub fn builds(&self, policy: &str) -> usize {
        self.builds.lock().get(policy).copied().unwrap_or(0)
    }
}

impl Builder for StaticBuilder {
    fn build(&self, policy: &str) -> Result<SharedController, BuildError> {
        let factory = self
            .factories
            .read()
            .get(policy)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(policy.to_owned()))?;
        let controller = factory()?;
        *self.builds.lock().entry(policy.to_owned()).or_insert(0) += 1;
        Ok(controller)
    }
}
