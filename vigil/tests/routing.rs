use std::sync::Arc;
use vigil::{
    DispatchMode, EntryPost, EntryStatus, FilterSpec, NoMatchPolicy, RouterAdmin, RouterApi,
    RouterError,
};
use vigil_core::BuildError;
use vigil_std::{
    WazuhDecoder,
    testing::{FailingController, PanickingController, RecordingController, StaticBuilder},
};

mod common;
use common::{config, event, recorders, static_router, wait_until};

fn post_ab(admin: &RouterAdmin) {
    admin
        .post_entry(EntryPost::new("A", "policy-a", FilterSpec::subject("host1"), 1))
        .unwrap();
    admin
        .post_entry(EntryPost::new("B", "policy-b", FilterSpec::subject("*"), 2))
        .unwrap();
}

#[test]
fn test_first_match_and_delete() {
    let (builder, a, b) = recorders();
    let admin = static_router(config(), &builder);
    post_ab(&admin);
    admin.start().unwrap();

    admin.post_event(event("host1")).unwrap();
    admin.post_event(event("host2")).unwrap();
    assert!(wait_until(|| a.count() == 1 && b.count() == 1));
    assert_eq!(a.subjects(), vec!["host1".to_owned()]);
    assert_eq!(b.subjects(), vec!["host2".to_owned()]);

    admin.delete_entry("A").unwrap();
    admin.post_event(event("host1")).unwrap();
    assert!(wait_until(|| b.count() == 2));
    assert_eq!(b.subjects()[1], "host1");
    assert_eq!(a.count(), 1);
    assert!(wait_until(|| admin.stats().processed == 3));
}

#[test]
fn test_get_and_delete_round_trip() {
    let (builder, _, _) = recorders();
    let admin = static_router(config(), &builder);
    post_ab(&admin);

    let entry = admin.get_entry("A").unwrap();
    assert_eq!(entry.name, "A");
    assert_eq!(entry.priority, 1);
    assert_eq!(entry.policy, "policy-a");
    assert_eq!(entry.status, EntryStatus::Enabled);
    assert_eq!(entry.description, None);

    admin
        .post_entry(
            EntryPost::new("C", "policy-a", FilterSpec::All, 3).with_description("audit hosts"),
        )
        .unwrap();
    assert_eq!(
        admin.get_entry("C").unwrap().description.as_deref(),
        Some("audit hosts")
    );
    admin.delete_entry("C").unwrap();

    let names: Vec<_> = admin.get_entries().into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["A", "B"]);

    admin.delete_entry("A").unwrap();
    assert!(matches!(admin.get_entry("A"), Err(RouterError::NotFound(_))));
    assert!(matches!(admin.delete_entry("A"), Err(RouterError::NotFound(_))));
}

#[test]
fn test_post_entry_rejections() {
    let (builder, _, _) = recorders();
    let admin = static_router(config(), &builder);
    post_ab(&admin);
    let builds = builder.builds("policy-a");

    assert!(matches!(
        admin.post_entry(EntryPost::new("A", "policy-a", FilterSpec::All, 3)),
        Err(RouterError::DuplicateName(name)) if name == "A"
    ));
    assert!(matches!(
        admin.post_entry(EntryPost::new("C", "policy-a", FilterSpec::All, 2)),
        Err(RouterError::PriorityConflict { priority: 2, .. })
    ));
    assert!(matches!(
        admin.post_entry(EntryPost::new("C", "policy-a", FilterSpec::All, 0)),
        Err(RouterError::PriorityConflict { priority: 0, .. })
    ));
    assert!(matches!(
        admin.post_entry(EntryPost::new("C", "policy-a", FilterSpec::All, 1001)),
        Err(RouterError::PriorityConflict { priority: 1001, .. })
    ));
    // Rejected posts never reach the builder.
    assert_eq!(builder.builds("policy-a"), builds);

    assert!(matches!(
        admin.post_entry(EntryPost::new("C", "unknown", FilterSpec::All, 3)),
        Err(RouterError::BuildFailed { policy, .. }) if policy == "unknown"
    ));
    assert_eq!(admin.get_entries().len(), 2);
}

#[test]
fn test_change_priority_reroutes() {
    let (builder, a, b) = recorders();
    let admin = static_router(config(), &builder);
    admin
        .post_entry(EntryPost::new("A", "policy-a", FilterSpec::All, 1))
        .unwrap();
    admin
        .post_entry(EntryPost::new("B", "policy-b", FilterSpec::All, 2))
        .unwrap();
    admin.start().unwrap();

    admin.post_event(event("host1")).unwrap();
    assert!(wait_until(|| a.count() == 1));

    admin.change_entry_priority("A", 3).unwrap();
    let order: Vec<_> = admin
        .get_entries()
        .into_iter()
        .map(|e| (e.name, e.priority))
        .collect();
    assert_eq!(order, vec![("B".to_owned(), 2), ("A".to_owned(), 3)]);

    admin.post_event(event("host1")).unwrap();
    assert!(wait_until(|| b.count() == 1));
    assert_eq!(a.count(), 1);

    assert!(matches!(
        admin.change_entry_priority("A", 2),
        Err(RouterError::PriorityConflict { .. })
    ));
    assert!(matches!(
        admin.change_entry_priority("missing", 5),
        Err(RouterError::NotFound(_))
    ));
}

#[test]
fn test_failed_reload_disables_until_fixed() {
    let (builder, a, b) = recorders();
    let admin = static_router(config(), &builder);
    post_ab(&admin);
    admin.start().unwrap();

    builder.set_factory("policy-a", || Err(BuildError::EmptyPolicy("policy-a".into())));
    assert!(matches!(
        admin.reload_entry("A"),
        Err(RouterError::BuildFailed { .. })
    ));
    assert_eq!(admin.get_entry("A").unwrap().status, EntryStatus::Disabled);

    admin.post_event(event("host1")).unwrap();
    assert!(wait_until(|| b.count() == 1));
    assert_eq!(a.count(), 0);

    let replacement = RecordingController::new("A2");
    builder.set_controller("policy-a", replacement.shared());
    admin.reload_entry("A").unwrap();
    assert_eq!(admin.get_entry("A").unwrap().status, EntryStatus::Enabled);

    admin.post_event(event("host1")).unwrap();
    assert!(wait_until(|| replacement.count() == 1));
    assert_eq!(a.count(), 0);
    assert!(matches!(admin.reload_entry("nope"), Err(RouterError::NotFound(_))));
}

#[test]
fn test_broadcast_delivers_to_every_match() {
    let (builder, a, b) = recorders();
    let admin = static_router(config().with_dispatch(DispatchMode::Broadcast), &builder);
    post_ab(&admin);
    admin.start().unwrap();

    admin.post_event(event("host1")).unwrap();
    admin.post_event(event("host2")).unwrap();
    assert!(wait_until(|| a.count() == 1 && b.count() == 2));
    assert_eq!(b.subjects(), vec!["host1".to_owned(), "host2".to_owned()]);
}

#[test]
fn test_no_match_policies() {
    let (builder, a, b) = recorders();
    let dropping = static_router(config(), &builder);
    dropping
        .post_entry(EntryPost::new("A", "policy-a", FilterSpec::subject("host1"), 1))
        .unwrap();
    dropping.start().unwrap();
    dropping.post_event(event("host9")).unwrap();
    assert!(wait_until(|| dropping.stats().unmatched == 1));
    assert_eq!(a.count(), 0);

    let routing = static_router(
        config().with_no_match(NoMatchPolicy::Route {
            entry: "fallback".into(),
        }),
        &builder,
    );
    routing
        .post_entry(EntryPost::new("A", "policy-a", FilterSpec::subject("host1"), 1))
        .unwrap();
    routing
        .post_entry(EntryPost::new(
            "fallback",
            "policy-b",
            FilterSpec::subject("never"),
            1000,
        ))
        .unwrap();
    routing.start().unwrap();
    routing.post_event(event("host9")).unwrap();
    assert!(wait_until(|| b.count() == 1));
    assert_eq!(routing.stats().unmatched, 0);
}

#[test]
fn test_pipeline_failures_do_not_kill_workers() {
    let good = RecordingController::new("good");
    let failing = FailingController::new("bad event");
    let builder = Arc::new(
        StaticBuilder::new()
            .with_controller("panics", Arc::new(PanickingController))
            .with_controller("fails", Arc::new(failing.clone()))
            .with_controller("good", good.shared()),
    );
    let admin = static_router(config(), &builder);
    admin
        .post_entry(EntryPost::new("panics", "panics", FilterSpec::subject("p"), 1))
        .unwrap();
    admin
        .post_entry(EntryPost::new("fails", "fails", FilterSpec::subject("f"), 2))
        .unwrap();
    admin
        .post_entry(EntryPost::new("good", "good", FilterSpec::All, 3))
        .unwrap();
    admin.start().unwrap();

    admin.post_event(event("p")).unwrap();
    admin.post_event(event("f")).unwrap();
    admin.post_event(event("ok")).unwrap();
    assert!(wait_until(|| good.count() == 1));
    assert!(wait_until(|| admin.stats().processed == 1));
    assert_eq!(admin.stats().failed, 2);
    assert_eq!(failing.calls(), 1);
}

#[test]
fn test_raw_events_route_by_agent_name() {
    let (builder, a, b) = recorders();
    let admin = RouterAdmin::new(config(), builder.clone(), Arc::new(WazuhDecoder::new())).unwrap();
    post_ab(&admin);
    admin.start().unwrap();

    admin
        .post_str_event("1:[001] (host1) 10.0.0.1->/var/log/auth.log:Failed password")
        .unwrap();
    admin.post_str_event("1:/var/log/syslog:kernel: oops").unwrap();
    assert!(wait_until(|| a.count() == 1 && b.count() == 1));
    assert_eq!(b.subjects(), vec!["/var/log/syslog".to_owned()]);

    assert!(matches!(
        admin.post_str_event("garbage"),
        Err(RouterError::Parse(_))
    ));
}
