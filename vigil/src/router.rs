//! Production routers.
//!
//! A [`Router`] owns one production entry: its descriptor, its filter and its
//! built pipeline. Workers call [`Router::process`] after releasing the set
//! lock; errors and panics raised by the pipeline come back as
//! [`RouterError::PipelineRuntime`] and never unwind into the worker.

use crate::{
    entry::{Entry, EntryPost, PipelineSlot},
    error::{Result, RouterError},
    set::Ranked,
};
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::atomic::{AtomicU32, Ordering},
};
use vigil_core::{Event, FilterSpec, SharedController, TraceSink};

/// Run a controller, turning errors and panics into [`RouterError`].
pub(crate) fn run_guarded(
    entry: &str,
    controller: &SharedController,
    event: Event,
    trace: Option<&mut dyn TraceSink>,
) -> Result<Event> {
    match panic::catch_unwind(AssertUnwindSafe(|| controller.ingest(event, trace))) {
        Ok(Ok(event)) => Ok(event),
        Ok(Err(source)) => Err(RouterError::runtime(entry, source)),
        Err(payload) => Err(RouterError::runtime(
            entry,
            format!("panicked: {}", panic_message(&*payload)).into(),
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic payload"
    }
}

/// A production entry.
pub struct Router {
    name: String,
    policy: String,
    filter: FilterSpec,
    description: Option<String>,
    priority: AtomicU32,
    slot: PipelineSlot,
}

impl Router {
    pub(crate) fn new(post: EntryPost, controller: SharedController) -> Self {
        Self {
            name: post.name,
            policy: post.policy,
            filter: post.filter,
            description: post.description,
            priority: AtomicU32::new(post.priority),
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

    /// The routing filter.
    pub fn filter(&self) -> &FilterSpec {
        &self.filter
    }

    /// Whether the entry takes part in matching.
    pub fn is_enabled(&self) -> bool {
        self.slot.is_enabled()
    }

    /// Whether the entry is enabled and its filter accepts `event`.
    pub fn matches(&self, event: &Event) -> bool {
        self.is_enabled() && self.filter.matches(event)
    }

    /// Run `event` through the current pipeline.
    pub fn process(&self, event: Event) -> Result<Event> {
        let controller = self.slot.controller();
        run_guarded(&self.name, &controller, event, None)
    }

    pub(crate) fn slot(&self) -> &PipelineSlot {
        &self.slot
    }

    /// Copy the entry's current state.
    pub fn snapshot(&self) -> Entry {
        Entry {
            name: self.name.clone(),
            policy: self.policy.clone(),
            filter: self.filter.clone(),
            priority: self.priority(),
            description: self.description.clone(),
            status: self.slot.status(),
            last_update: self.slot.last_update(),
        }
    }
}

impl Ranked for Router {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u32 {
        Router::priority(self)
    }

    fn set_priority(&self, priority: u32) {
        self.priority.store(priority, Ordering::Release);
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .field("priority", &self.priority())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
