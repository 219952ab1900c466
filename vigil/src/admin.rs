//! The router façade.
//!
//! [`RouterAdmin`] owns both entry sets, both queues and both worker pools,
//! and drives the `Created → Running → Stopped` lifecycle.
//!
//! # Lifecycle
//!
//! - [`start`](RouterAdmin::start) spawns the production and test workers.
//!   Starting twice fails with [`RouterError::AlreadyRunning`]; starting
//!   after a stop fails with [`RouterError::Stopped`].
//! - [`stop`](RouterAdmin::stop) clears the running flag, closes both queues,
//!   joins every worker and cancels test requests still queued. It is
//!   idempotent and also runs on drop.
//!
//! Entries can be managed and work can be queued before `start`; queued
//! events and tests wait for the workers.

use crate::{
    api::{RouterApi, TesterApi},
    config::RouterConfig,
    entry::{Entry, EntryPost, MAX_PRIORITY, TestEntry, TestEntryPost, check_priority},
    error::{Result, RouterError},
    router::Router,
    set::EntrySet,
    stats::{Counters, DispatchStats, bump},
    tester::{Options, PendingTest, TestFuture, Tester},
    worker,
};
use chrono::Utc;
use parking_lot::Mutex;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::JoinHandle,
};
use tracing::{debug, error, info, warn};
use vigil_core::{Builder, Decoder, Event, SharedController};
use vigil_std::Queue;

/// Lifecycle state of a [`RouterAdmin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Built, workers not started.
    Created,
    /// Workers are running.
    Running,
    /// Stopped for good.
    Stopped,
}

enum Lifecycle {
    Created,
    Running(Vec<JoinHandle<()>>),
    Stopped,
}

/// State shared between the façade and its workers.
pub(crate) struct Inner {
    pub(crate) config: RouterConfig,
    builder: Arc<dyn Builder>,
    decoder: Arc<dyn Decoder>,
    pub(crate) production: EntrySet<Router>,
    pub(crate) testing: EntrySet<Tester>,
    pub(crate) events: Queue<Event>,
    pub(crate) tests: Queue<PendingTest>,
    running: AtomicBool,
    pub(crate) stats: Counters,
}

impl Inner {
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn build(&self, policy: &str) -> Result<SharedController> {
        self.builder
            .build(policy)
            .map_err(|source| RouterError::build_failed(policy, source))
    }
}

/// Owner of the production and test entry sets, their queues and workers.
///
/// # Example
///
/// ```rust,ignore
/// let admin = RouterAdmin::new(RouterConfig::default(), builder, decoder)?;
/// admin.post_entry(EntryPost::new("web", "web-policy", FilterSpec::subject("web-*"), 10))?;
/// admin.start()?;
/// admin.post_str_event("1:[001] (web-01) 10.0.0.5->/var/log/auth.log:login")?;
///
/// let output = admin
///     .ingest_test(event, Options::full_trace().with_entry("web-test"))?
///     .await?;
/// ```
pub struct RouterAdmin {
    inner: Arc<Inner>,
    lifecycle: Mutex<Lifecycle>,
}

impl RouterAdmin {
    /// Create a router in the `Created` state.
    pub fn new(
        config: RouterConfig,
        builder: Arc<dyn Builder>,
        decoder: Arc<dyn Decoder>,
    ) -> Result<Self> {
        config.validate()?;
        let inner = Inner {
            events: Queue::new(config.queue_capacity),
            tests: Queue::new(config.test_queue_capacity),
            config,
            builder,
            decoder,
            production: EntrySet::new(),
            testing: EntrySet::new(),
            running: AtomicBool::new(false),
            stats: Counters::default(),
        };
        Ok(Self {
            inner: Arc::new(inner),
            lifecycle: Mutex::new(Lifecycle::Created),
        })
    }

    /// Spawn the worker pools.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock();
        match *lifecycle {
            Lifecycle::Created => {}
            Lifecycle::Running(_) => return Err(RouterError::AlreadyRunning),
            Lifecycle::Stopped => return Err(RouterError::Stopped),
        }

        self.inner.running.store(true, Ordering::Release);
        let config = &self.inner.config;
        let mut handles = Vec::with_capacity(config.workers + config.test_workers);
        let spawned = (0..config.workers)
            .map(|id| (format!("vigil-router-{id}"), worker::router_loop as fn(&Inner)))
            .chain(
                (0..config.test_workers)
                    .map(|id| (format!("vigil-tester-{id}"), worker::tester_loop as fn(&Inner))),
            )
            .try_for_each(|(name, body)| {
                handles.push(worker::spawn(name, &self.inner, body)?);
                Ok::<_, RouterError>(())
            });

        if let Err(e) = spawned {
            error!(error = %e, "failed to start workers");
            *lifecycle = Lifecycle::Running(handles);
            drop(lifecycle);
            self.stop();
            return Err(e);
        }

        info!(
            workers = config.workers,
            test_workers = config.test_workers,
            "router started"
        );
        *lifecycle = Lifecycle::Running(handles);
        Ok(())
    }

    /// Stop the workers and cancel queued test requests.
    pub fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock();
        let handles = match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Running(handles) => handles,
            Lifecycle::Created => Vec::new(),
            Lifecycle::Stopped => return,
        };

        self.inner.running.store(false, Ordering::Release);
        self.inner.events.close();
        self.inner.tests.close();

        for handle in handles {
            if handle.join().is_err() {
                error!("worker thread panicked");
            }
        }

        while let Some(pending) = self.inner.tests.try_pop() {
            bump(&self.inner.stats.tests_cancelled);
            pending.cancel();
        }
        while self.inner.events.try_pop().is_some() {
            bump(&self.inner.stats.discarded);
        }

        let stats = self.stats();
        info!(
            processed = stats.processed,
            discarded = stats.discarded,
            tests_cancelled = stats.tests_cancelled,
            "router stopped"
        );
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        match *self.lifecycle.lock() {
            Lifecycle::Created => LifecycleState::Created,
            Lifecycle::Running(_) => LifecycleState::Running,
            Lifecycle::Stopped => LifecycleState::Stopped,
        }
    }

    /// Whether the workers are running.
    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    /// Snapshot of the dispatch counters.
    pub fn stats(&self) -> DispatchStats {
        self.inner.stats.snapshot()
    }

    /// Events waiting in the production queue.
    pub fn queue_len(&self) -> usize {
        self.inner.events.len()
    }

    /// Requests waiting in the test queue.
    pub fn test_queue_len(&self) -> usize {
        self.inner.tests.len()
    }

    /// The configuration the router was built with.
    pub fn config(&self) -> &RouterConfig {
        &self.inner.config
    }

    fn decode(&self, raw: &str) -> Result<Event> {
        Ok(self.inner.decoder.decode(raw)?)
    }
}

impl Drop for RouterAdmin {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for RouterAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterAdmin")
            .field("state", &self.state())
            .field("entries", &self.inner.production.len())
            .field("test_entries", &self.inner.testing.len())
            .field("queued", &self.queue_len())
            .finish()
    }
}

// ============================================================================
// Production API
// ============================================================================

impl RouterApi for RouterAdmin {
    fn post_entry(&self, entry: EntryPost) -> Result<()> {
        let set = &self.inner.production;
        let _admin = set.lock_admin();

        check_priority(entry.priority)?;
        set.check_vacancy(&entry.name, entry.priority)?;
        let controller = self.inner.build(&entry.policy)?;

        let (name, priority) = (entry.name.clone(), entry.priority);
        set.insert(Arc::new(Router::new(entry, controller)))?;
        info!(entry = %name, priority, "entry added");
        Ok(())
    }

    fn delete_entry(&self, name: &str) -> Result<()> {
        let set = &self.inner.production;
        let _admin = set.lock_admin();
        set.remove(name)
            .ok_or_else(|| RouterError::NotFound(name.to_owned()))?;
        info!(entry = %name, "entry deleted");
        Ok(())
    }

    fn get_entry(&self, name: &str) -> Result<Entry> {
        self.inner
            .production
            .get(name)
            .map(|r| r.snapshot())
            .ok_or_else(|| RouterError::NotFound(name.to_owned()))
    }

    fn get_entries(&self) -> Vec<Entry> {
        self.inner.production.collect(|r| r.snapshot())
    }

    fn reload_entry(&self, name: &str) -> Result<()> {
        let set = &self.inner.production;
        let _admin = set.lock_admin();
        let router = set
            .get(name)
            .ok_or_else(|| RouterError::NotFound(name.to_owned()))?;

        match self.inner.build(router.policy()) {
            Ok(controller) => {
                set.exclusive(|| router.slot().replace(controller));
                info!(entry = %name, "entry reloaded");
                Ok(())
            }
            Err(e) => {
                if let RouterError::BuildFailed { source, .. } = &e {
                    router.slot().fail(source);
                }
                warn!(entry = %name, error = %e, "reload failed, entry disabled");
                Err(e)
            }
        }
    }

    fn change_entry_priority(&self, name: &str, priority: u32) -> Result<()> {
        let set = &self.inner.production;
        let _admin = set.lock_admin();
        check_priority(priority)?;
        set.reprioritize(name, priority)?;
        info!(entry = %name, priority, "entry priority changed");
        Ok(())
    }

    fn post_event(&self, event: Event) -> Result<()> {
        Ok(self.inner.events.push(event)?)
    }

    fn post_str_event(&self, raw: &str) -> Result<()> {
        let event = self.decode(raw)?;
        self.post_event(event)
    }
}

// ============================================================================
// Testing API
// ============================================================================

impl TesterApi for RouterAdmin {
    fn post_test_entry(&self, mut entry: TestEntryPost) -> Result<()> {
        let set = &self.inner.testing;
        let _admin = set.lock_admin();

        let priority = match entry.priority {
            Some(priority) => priority,
            None => match set.max_priority() {
                Some(max) if max >= MAX_PRIORITY => {
                    return Err(RouterError::PriorityConflict {
                        priority: max.saturating_add(1),
                        reason: "no free priority left after the last test entry".into(),
                    });
                }
                Some(max) => max + 1,
                None => 1,
            },
        };
        check_priority(priority)?;
        set.check_vacancy(&entry.name, priority)?;
        if entry.lifetime.is_none() {
            entry.lifetime = self.inner.config.default_test_lifetime;
        }
        let controller = self.inner.build(&entry.policy)?;

        let name = entry.name.clone();
        set.insert(Arc::new(Tester::new(entry, priority, controller)))?;
        info!(entry = %name, priority, "test entry added");
        Ok(())
    }

    fn delete_test_entry(&self, name: &str) -> Result<()> {
        let set = &self.inner.testing;
        let _admin = set.lock_admin();
        set.remove(name)
            .ok_or_else(|| RouterError::NotFound(name.to_owned()))?;
        info!(entry = %name, "test entry deleted");
        Ok(())
    }

    fn get_test_entry(&self, name: &str) -> Result<TestEntry> {
        self.inner
            .testing
            .get(name)
            .map(|t| t.snapshot())
            .ok_or_else(|| RouterError::NotFound(name.to_owned()))
    }

    fn get_test_entries(&self) -> Vec<TestEntry> {
        self.inner.testing.collect(|t| t.snapshot())
    }

    fn reload_test_entry(&self, name: &str) -> Result<()> {
        let set = &self.inner.testing;
        let _admin = set.lock_admin();
        let tester = set
            .get(name)
            .ok_or_else(|| RouterError::NotFound(name.to_owned()))?;

        match self.inner.build(tester.policy()) {
            Ok(controller) => {
                set.exclusive(|| tester.slot().replace(controller));
                info!(entry = %name, "test entry reloaded");
                Ok(())
            }
            Err(e) => {
                if let RouterError::BuildFailed { source, .. } = &e {
                    tester.slot().fail(source);
                }
                warn!(entry = %name, error = %e, "reload failed, test entry disabled");
                Err(e)
            }
        }
    }

    fn change_test_entry_priority(&self, name: &str, priority: u32) -> Result<()> {
        let set = &self.inner.testing;
        let _admin = set.lock_admin();
        check_priority(priority)?;
        set.reprioritize(name, priority)?;
        info!(entry = %name, priority, "test entry priority changed");
        Ok(())
    }

    fn ingest_test(&self, event: Event, options: Options) -> Result<TestFuture> {
        let tester = match &options.entry {
            Some(name) => self
                .inner
                .testing
                .get(name)
                .ok_or_else(|| RouterError::NotFound(name.clone()))?,
            None => self
                .inner
                .testing
                .find(|t| t.matches(&event))
                .ok_or_else(|| RouterError::NotFound(event.subject().to_owned()))?,
        };
        tester.touch();

        let (pending, future) = PendingTest::new(event, options, tester.name().to_owned());
        self.inner.tests.push(pending)?;
        debug!(entry = %tester.name(), "test queued");
        Ok(future)
    }

    fn ingest_test_str(&self, raw: &str, options: Options) -> Result<TestFuture> {
        let event = self.decode(raw)?;
        self.ingest_test(event, options)
    }

    fn expire_test_entries(&self) -> Vec<String> {
        let set = &self.inner.testing;
        let _admin = set.lock_admin();
        let now = Utc::now();
        let removed: Vec<String> = set
            .remove_where(|t| t.is_expired(now))
            .iter()
            .map(|t| t.name().to_owned())
            .collect();
        for name in &removed {
            info!(entry = %name, "test entry expired");
        }
        removed
    }
}
