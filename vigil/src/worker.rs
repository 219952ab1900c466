//! Worker loops.
//!
//! Production workers pop events, pick the target entries under the set's
//! read lock and run them after the lock is released. Test workers pop
//! pending requests, re-resolve their tester by name and resolve the caller's
//! future. Both loops end when their queue is closed and drained; anything
//! they pop after the running flag is cleared is discarded or cancelled.

use crate::{
    admin::Inner,
    config::{DispatchMode, NoMatchPolicy},
    error::RouterError,
    router::Router,
    stats::bump,
};
use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};
use tracing::{debug, info_span, warn};
use vigil_core::Event;

/// Spawn one named thread running `body`.
pub(crate) fn spawn(
    name: String,
    inner: &Arc<Inner>,
    body: fn(&Inner),
) -> Result<JoinHandle<()>, RouterError> {
    let inner = Arc::clone(inner);
    thread::Builder::new()
        .name(name)
        .spawn(move || body(&inner))
        .map_err(RouterError::WorkerSpawn)
}

// ============================================================================
// Production
// ============================================================================

pub(crate) fn router_loop(inner: &Inner) {
    let span = info_span!("router_worker", thread = thread::current().name().unwrap_or("?"));
    let _enter = span.enter();
    debug!("worker started");

    while let Ok(event) = inner.events.pop() {
        if !inner.is_running() {
            bump(&inner.stats.discarded);
            continue;
        }
        dispatch(inner, event);
    }

    debug!("worker exiting");
}

fn dispatch(inner: &Inner, event: Event) {
    match inner.config.dispatch {
        DispatchMode::FirstMatch => match inner.production.find(|r| r.matches(&event)) {
            Some(router) => process(inner, &router, event),
            None => no_match(inner, event),
        },
        DispatchMode::Broadcast => {
            let targets = inner.production.select(|r| r.matches(&event));
            match targets.split_last() {
                Some((last, rest)) => {
                    for router in rest {
                        process(inner, router, event.clone());
                    }
                    process(inner, last, event);
                }
                None => no_match(inner, event),
            }
        }
    }
}

fn no_match(inner: &Inner, event: Event) {
    match &inner.config.no_match {
        NoMatchPolicy::Drop => {
            bump(&inner.stats.unmatched);
            debug!(subject = %event.subject(), "no entry matched, event dropped");
        }
        NoMatchPolicy::Route { entry } => {
            match inner.production.get(entry).filter(|r| r.is_enabled()) {
                Some(router) => process(inner, &router, event),
                None => {
                    bump(&inner.stats.unmatched);
                    warn!(
                        subject = %event.subject(),
                        fallback = %entry,
                        "fallback entry unavailable, event dropped"
                    );
                }
            }
        }
    }
}

fn process(inner: &Inner, router: &Router, event: Event) {
    match router.process(event) {
        Ok(_) => bump(&inner.stats.processed),
        Err(e) => {
            bump(&inner.stats.failed);
            warn!(entry = %router.name(), error = %e, "pipeline failed, event dropped");
        }
    }
}

// ============================================================================
// Testing
// ============================================================================

pub(crate) fn tester_loop(inner: &Inner) {
    let span = info_span!("tester_worker", thread = thread::current().name().unwrap_or("?"));
    let _enter = span.enter();
    debug!("worker started");

    while let Ok(pending) = inner.tests.pop() {
        if !inner.is_running() {
            bump(&inner.stats.tests_cancelled);
            pending.cancel();
            continue;
        }

        let (event, options, entry, responder) = pending.into_parts();
        let result = match inner.testing.get(&entry) {
            Some(tester) => tester.run(event, &options),
            None => Err(RouterError::NotFound(entry.clone())),
        };
        match &result {
            Ok(output) => {
                bump(&inner.stats.tests_completed);
                debug!(entry = %entry, traces = output.traces.len(), "test completed");
            }
            Err(e) => {
                bump(&inner.stats.tests_failed);
                debug!(entry = %entry, error = %e, "test failed");
            }
        }
        responder.resolve(result);
    }

    debug!("worker exiting");
}
