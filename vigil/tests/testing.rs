use serde_json::json;
use std::{sync::Arc, thread, time::Duration};
use vigil::{
    EntryStatus, FilterSpec, Options, RouterError, TestEntryPost, TesterApi, Trace,
};
use vigil_std::testing::{FailingController, RecordingController, StaticBuilder};

mod common;
use common::{catalog_router, config, event, recorders, static_router};

#[tokio::test]
async fn test_full_trace_reports_every_stage_in_order() {
    let (admin, _store) = catalog_router(config());
    admin
        .post_test_entry(TestEntryPost::new("enrich", "enrich", FilterSpec::All))
        .unwrap();
    admin.start().unwrap();

    let output = admin
        .ingest_test(event("host1"), Options::full_trace())
        .unwrap()
        .await
        .unwrap();

    assert_eq!(
        output.traces,
        vec![
            Trace::new("decode", "success"),
            Trace::new("classify", "success"),
        ]
    );
    assert_eq!(output.event.get("/category"), Some(&json!("auth")));
    assert_eq!(admin.stats().tests_completed, 1);
}

#[tokio::test]
async fn test_named_trace_filters_stages() {
    let (admin, _store) = catalog_router(config());
    admin
        .post_test_entry(TestEntryPost::new("enrich", "enrich", FilterSpec::All))
        .unwrap();
    admin.start().unwrap();

    let output = admin
        .ingest_test(event("host1"), Options::named_trace(["classify"]))
        .unwrap()
        .await
        .unwrap();
    assert_eq!(output.traces, vec![Trace::new("classify", "success")]);

    let output = admin
        .ingest_test(event("host1"), Options::none())
        .unwrap()
        .await
        .unwrap();
    assert!(output.traces.is_empty());
    assert_eq!(output.event.get("/decoded"), Some(&json!(true)));
}

#[test]
fn test_no_match_fails_without_queueing() {
    let (builder, _, _) = recorders();
    let admin = static_router(config(), &builder);
    admin
        .post_test_entry(TestEntryPost::new("A", "policy-a", FilterSpec::subject("host1")))
        .unwrap();

    // Not started: queued requests stay observable.
    let _pending = admin.ingest_test(event("host1"), Options::none()).unwrap();
    assert_eq!(admin.test_queue_len(), 1);

    assert!(matches!(
        admin.ingest_test(event("host2"), Options::none()),
        Err(RouterError::NotFound(_))
    ));
    assert!(matches!(
        admin.ingest_test(event("host1"), Options::none().with_entry("missing")),
        Err(RouterError::NotFound(name)) if name == "missing"
    ));
    assert_eq!(admin.test_queue_len(), 1);
}

#[tokio::test]
async fn test_named_entry_bypasses_filter() {
    let (builder, a, b) = recorders();
    let admin = static_router(config(), &builder);
    admin
        .post_test_entry(TestEntryPost::new("A", "policy-a", FilterSpec::All))
        .unwrap();
    admin
        .post_test_entry(TestEntryPost::new("B", "policy-b", FilterSpec::subject("nobody")))
        .unwrap();
    admin.start().unwrap();

    let output = admin
        .ingest_test(event("host1"), Options::none().with_entry("B"))
        .unwrap()
        .await
        .unwrap();
    assert_eq!(output.event.get("/routed_to"), Some(&json!("B")));
    assert_eq!(b.count(), 1);
    assert_eq!(a.count(), 0);
}

#[tokio::test]
async fn test_pipeline_errors_resolve_the_future() {
    let builder = Arc::new(
        StaticBuilder::new().with_controller("fails", Arc::new(FailingController::new("nope"))),
    );
    let admin = static_router(config(), &builder);
    admin
        .post_test_entry(TestEntryPost::new("fails", "fails", FilterSpec::All))
        .unwrap();
    admin.start().unwrap();

    let err = admin
        .ingest_test(event("host1"), Options::full_trace())
        .unwrap()
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::PipelineRuntime { entry, .. } if entry == "fails"));
    assert_eq!(admin.stats().tests_failed, 1);
}

#[tokio::test]
async fn test_stage_failure_is_traced_and_returned() {
    let (admin, _store) = catalog_router(config());
    admin
        .post_test_entry(TestEntryPost::new("strict", "strict", FilterSpec::All))
        .unwrap();
    admin.start().unwrap();

    let err = admin
        .ingest_test(event("host1"), Options::full_trace())
        .unwrap()
        .await
        .unwrap_err();
    assert!(err.to_string().contains("missing required field '/missing'"));
}

#[test]
fn test_auto_assigned_priorities() {
    let (builder, _, _) = recorders();
    let admin = static_router(config(), &builder);
    for name in ["t1", "t2", "t3"] {
        admin
            .post_test_entry(TestEntryPost::new(name, "policy-a", FilterSpec::All))
            .unwrap();
    }
    admin
        .post_test_entry(TestEntryPost::new("t10", "policy-a", FilterSpec::All).with_priority(10))
        .unwrap();
    admin
        .post_test_entry(TestEntryPost::new("t11", "policy-a", FilterSpec::All))
        .unwrap();

    let priorities: Vec<_> = admin
        .get_test_entries()
        .into_iter()
        .map(|e| (e.name, e.priority))
        .collect();
    assert_eq!(
        priorities,
        vec![
            ("t1".to_owned(), 1),
            ("t2".to_owned(), 2),
            ("t3".to_owned(), 3),
            ("t10".to_owned(), 10),
            ("t11".to_owned(), 11),
        ]
    );

    admin.change_test_entry_priority("t1", 20).unwrap();
    assert_eq!(admin.get_test_entries().last().unwrap().name, "t1");
    assert!(matches!(
        admin.post_test_entry(TestEntryPost::new("t2", "policy-a", FilterSpec::All)),
        Err(RouterError::DuplicateName(_))
    ));
}

#[test]
fn test_expiry_removes_idle_entries() {
    let (builder, _, _) = recorders();
    let admin = static_router(
        config().with_default_test_lifetime(Duration::from_secs(3600)),
        &builder,
    );
    admin
        .post_test_entry(
            TestEntryPost::new("short", "policy-a", FilterSpec::All)
                .with_lifetime(Duration::from_millis(1)),
        )
        .unwrap();
    admin
        .post_test_entry(TestEntryPost::new("long", "policy-b", FilterSpec::All))
        .unwrap();
    assert_eq!(
        admin.get_test_entry("long").unwrap().lifetime,
        Some(Duration::from_secs(3600))
    );

    thread::sleep(Duration::from_millis(20));
    assert_eq!(admin.expire_test_entries(), vec!["short".to_owned()]);
    assert!(matches!(
        admin.get_test_entry("short"),
        Err(RouterError::NotFound(_))
    ));
    assert!(admin.expire_test_entries().is_empty());
}

#[test]
fn test_ingest_touches_entry() {
    let (builder, _, _) = recorders();
    let admin = static_router(config(), &builder);
    admin
        .post_test_entry(
            TestEntryPost::new("A", "policy-a", FilterSpec::All).with_description("staging"),
        )
        .unwrap();
    let entry = admin.get_test_entry("A").unwrap();
    assert_eq!(entry.description.as_deref(), Some("staging"));
    let before = entry.last_use;

    thread::sleep(Duration::from_millis(5));
    let _pending = admin.ingest_test(event("h"), Options::none()).unwrap();
    assert!(admin.get_test_entry("A").unwrap().last_use > before);
}

#[test]
fn test_deleted_entry_resolves_not_found() {
    let (builder, _, _) = recorders();
    let admin = static_router(config(), &builder);
    admin
        .post_test_entry(TestEntryPost::new("A", "policy-a", FilterSpec::All))
        .unwrap();
    let future = admin.ingest_test(event("h"), Options::none()).unwrap();
    admin.delete_test_entry("A").unwrap();
    admin.start().unwrap();

    assert!(matches!(future.wait(), Err(RouterError::NotFound(name)) if name == "A"));
}

#[test]
fn test_reload_failure_disables_test_entry() {
    let recorder = RecordingController::new("A");
    let builder = Arc::new(StaticBuilder::new().with_controller("policy-a", recorder.shared()));
    let admin = static_router(config(), &builder);
    admin
        .post_test_entry(TestEntryPost::new("A", "policy-a", FilterSpec::All))
        .unwrap();
    admin.start().unwrap();

    builder.remove("policy-a");
    assert!(matches!(
        admin.reload_test_entry("A"),
        Err(RouterError::BuildFailed { .. })
    ));
    assert_eq!(
        admin.get_test_entry("A").unwrap().status,
        EntryStatus::Disabled
    );

    // Disabled entries are skipped by matching but can still be named.
    assert!(matches!(
        admin.ingest_test(event("h"), Options::none()),
        Err(RouterError::NotFound(_))
    ));
    let err = admin
        .ingest_test(event("h"), Options::none().with_entry("A"))
        .unwrap()
        .wait()
        .unwrap_err();
    assert!(matches!(err, RouterError::BuildFailed { .. }));
    assert_eq!(recorder.count(), 0);
}

#[test]
fn test_raw_test_input() {
    let (admin, _store) = catalog_router(config());
    admin
        .post_test_entry(TestEntryPost::new("enrich", "enrich", FilterSpec::subject("web-01")))
        .unwrap();
    admin.start().unwrap();

    let mut future = admin
        .ingest_test_str(
            "1:[001] (web-01) 10.0.0.5->/var/log/auth.log:Failed password",
            Options::full_trace(),
        )
        .unwrap();
    let output = loop {
        if let Some(result) = future.try_take() {
            break result.unwrap();
        }
        thread::sleep(Duration::from_millis(5));
    };
    assert_eq!(output.event.get("/agent/ip"), Some(&json!("10.0.0.5")));
    assert_eq!(output.traces.len(), 2);

    assert!(matches!(
        admin.ingest_test_str("", Options::none()),
        Err(RouterError::Parse(_))
    ));
    assert_eq!(admin.test_queue_len(), 0);
}
