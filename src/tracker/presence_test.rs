use super::*;
use crate::tracker::test_helpers::{Call, Harness, test_config};

#[tokio::test(start_paused = true)]
async fn project_change_sends_switch_then_heartbeat() {
    let h = Harness::signed_in(test_config()).await;
    h.tracker.start_session().await;
    h.transport.clear_calls();

    h.tracker.set_current_project(Some("p1")).await;
    h.tracker.set_current_project(Some("p2")).await;

    let calls = h.transport.calls();
    assert_eq!(calls.len(), 4);
    assert!(matches!(&calls[0], Call::Switch(r) if r.new_project_id.as_deref() == Some("p1")));
    assert!(matches!(&calls[1], Call::Heartbeat(s) if s.current_project_id.as_deref() == Some("p1")));
    assert!(matches!(&calls[2], Call::Switch(r) if r.new_project_id.as_deref() == Some("p2")));
    assert!(matches!(&calls[3], Call::Heartbeat(s) if s.current_project_id.as_deref() == Some("p2")));
    assert_eq!(h.tracker.current_project().as_deref(), Some("p2"));
}

#[tokio::test(start_paused = true)]
async fn same_project_again_is_noop() {
    let h = Harness::signed_in(test_config()).await;
    h.tracker.start_session().await;
    h.tracker.set_current_project(Some("p1")).await;
    h.transport.clear_calls();

    h.tracker.set_current_project(Some("p1")).await;

    assert!(h.transport.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn leaving_a_project_is_announced() {
    let h = Harness::signed_in(test_config()).await;
    h.tracker.start_session().await;
    h.tracker.set_current_project(Some("p1")).await;
    h.transport.clear_calls();

    h.tracker.set_current_project(None).await;

    assert!(matches!(&h.transport.calls()[0], Call::Switch(r) if r.new_project_id.is_none()));
    assert_eq!(h.tracker.current_project(), None);
}

#[tokio::test(start_paused = true)]
async fn offline_project_change_is_local_only() {
    let h = Harness::signed_in(test_config()).await;
    h.tracker.start_session().await;
    h.tracker.set_online(false).await;
    h.transport.clear_calls();

    h.tracker.set_current_project(Some("p1")).await;

    assert!(h.transport.calls().is_empty());
    assert_eq!(h.tracker.current_project().as_deref(), Some("p1"));
    assert_eq!(h.stored().unwrap().current_project_id.as_deref(), Some("p1"));
}

#[tokio::test(start_paused = true)]
async fn presence_without_session_is_empty() {
    let h = Harness::signed_in(test_config()).await;

    h.tracker.set_current_project(Some("p1")).await;
    h.tracker.set_current_page(Some("notes"));

    assert_eq!(h.tracker.current_project(), None);
    assert_eq!(h.tracker.current_page(), None);
    assert!(h.transport.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn current_page_is_persisted() {
    let h = Harness::signed_in(test_config()).await;
    h.tracker.start_session().await;

    h.tracker.set_current_page(Some("notes"));

    assert_eq!(h.tracker.current_page().as_deref(), Some("notes"));
    assert_eq!(h.stored().unwrap().current_page.as_deref(), Some("notes"));
}

#[test]
fn prune_joins_drops_entries_past_cooldown() {
    let start = tokio::time::Instant::now();
    let mut joins = std::collections::HashMap::new();
    joins.insert("old".to_owned(), start);
    joins.insert("new".to_owned(), start + Duration::from_secs(50));

    prune_joins(&mut joins, start + Duration::from_secs(70), Duration::from_secs(60));

    assert!(joins.contains_key("new"));
    assert!(!joins.contains_key("old"));
}
