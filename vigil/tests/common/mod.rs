#![allow(dead_code)]

use serde_json::json;
use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};
use vigil::{Event, RouterAdmin, RouterConfig};
use vigil_core::{Policy, StageSpec};
use vigil_std::{
    CatalogBuilder, JsonDecoder, MemoryStore, WazuhDecoder,
    testing::{RecordingController, StaticBuilder},
};

// ============================================================================
// Events
// ============================================================================

pub fn event(subject: &str) -> Event {
    Event::new(subject, json!({"agent": {"name": subject}, "rule": {"level": 3}}))
}

// ============================================================================
// Routers
// ============================================================================

/// A small config: one worker of each kind, small queues.
pub fn config() -> RouterConfig {
    RouterConfig::default()
        .with_workers(1)
        .with_test_workers(1)
        .with_capacities(64, 64)
}

/// A router over a [`StaticBuilder`] the test can keep mutating.
pub fn static_router(config: RouterConfig, builder: &Arc<StaticBuilder>) -> RouterAdmin {
    RouterAdmin::new(config, builder.clone(), Arc::new(JsonDecoder::new())).unwrap()
}

/// Recorders `A` and `B` served for policies `policy-a` and `policy-b`.
pub fn recorders() -> (Arc<StaticBuilder>, RecordingController, RecordingController) {
    let a = RecordingController::new("A");
    let b = RecordingController::new("B");
    let builder = Arc::new(
        StaticBuilder::new()
            .with_controller("policy-a", a.shared())
            .with_controller("policy-b", b.shared()),
    );
    (builder, a, b)
}

/// A store holding a two-stage `enrich` policy and a failing `strict` one.
pub fn policy_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::with_policies([
        Policy::new("enrich")
            .with_stage(StageSpec::new(
                "decode",
                "set",
                json!({"field": "/decoded", "value": true}),
            ))
            .with_stage(StageSpec::new(
                "classify",
                "set",
                json!({"field": "/category", "value": "auth"}),
            )),
        Policy::new("strict")
            .with_stage(StageSpec::new("check", "require", json!({"field": "/missing"}))),
    ]))
}

/// A router building real stage pipelines from [`policy_store`].
pub fn catalog_router(config: RouterConfig) -> (RouterAdmin, Arc<MemoryStore>) {
    let store = policy_store();
    let builder = Arc::new(CatalogBuilder::new(store.clone()));
    let admin = RouterAdmin::new(config, builder, Arc::new(WazuhDecoder::new())).unwrap();
    (admin, store)
}

// ============================================================================
// Waiting
// ============================================================================

/// Poll `cond` until it holds or five seconds pass.
pub fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}
