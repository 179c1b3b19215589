use super::*;
use crate::api::ApiError;
use crate::session::SessionDescriptor;
use crate::tracker::test_helpers::{Harness, T0, test_config};
use std::time::Duration;

fn descriptor(last_activity: i64, user_id: &str) -> SessionDescriptor {
    SessionDescriptor {
        session_id: "stored-1".into(),
        start_time: T0 - 10 * 60_000,
        last_activity,
        current_project_id: Some("p1".into()),
        current_page: Some("notes".into()),
        user_id: Some(user_id.into()),
    }
}

// =============================================================================
// start
// =============================================================================

#[tokio::test(start_paused = true)]
async fn start_session_is_idempotent() {
    let h = Harness::signed_in(test_config()).await;

    let first = h.tracker.start_session().await;
    let second = h.tracker.start_session().await;

    assert_eq!(first.as_deref(), Some("srv-1"));
    assert_eq!(first, second);
    assert_eq!(h.transport.starts(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_starts_share_one_backend_call() {
    let h = Harness::signed_in(test_config()).await;
    *h.transport.start_delay.lock().unwrap() = Some(Duration::from_secs(1));

    let (a, b) = tokio::join!(h.tracker.start_session(), h.tracker.start_session());

    assert_eq!(a.as_deref(), Some("srv-1"));
    assert_eq!(a, b);
    assert_eq!(h.transport.starts(), 1);
}

#[tokio::test(start_paused = true)]
async fn start_without_user_does_nothing() {
    let h = Harness::anonymous(test_config());

    assert_eq!(h.tracker.start_session().await, None);
    assert!(h.transport.calls().is_empty());
    assert_eq!(h.tracker.phase(), Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn unreachable_backend_falls_back_to_local_id() {
    let h = Harness::signed_in(test_config()).await;
    *h.transport.start_error.lock().unwrap() = Some(ApiError::Network("refused".into()));

    let id = h.tracker.start_session().await.unwrap();

    assert!(id.starts_with(LOCAL_SESSION_PREFIX));
    let info = h.tracker.current_session().unwrap();
    assert_eq!(info.source, SessionSource::Local);
    assert_eq!(info.start_time, T0);
}

#[tokio::test(start_paused = true)]
async fn offline_start_skips_backend() {
    let h = Harness::signed_in(test_config()).await;
    h.tracker.set_online(false).await;

    let id = h.tracker.start_session().await.unwrap();

    assert!(id.starts_with(LOCAL_SESSION_PREFIX));
    assert_eq!(h.transport.starts(), 0);
}

#[tokio::test(start_paused = true)]
async fn rejected_start_returns_to_idle() {
    let h = Harness::signed_in(test_config()).await;
    *h.transport.start_error.lock().unwrap() = Some(ApiError::Unauthorized { status: 401 });

    assert_eq!(h.tracker.start_session().await, None);
    assert_eq!(h.tracker.phase(), Phase::Idle);
    assert!(!h.tracker.has_active_session());
}

#[tokio::test(start_paused = true)]
async fn start_invalidated_by_first_heartbeat_returns_none() {
    let h = Harness::signed_in(test_config()).await;
    h.transport
        .heartbeat_errors
        .lock()
        .unwrap()
        .push_back(ApiError::Unauthorized { status: 401 });

    assert_eq!(h.tracker.start_session().await, None);
    assert_eq!(h.tracker.phase(), Phase::Ended);
    assert!(!h.tracker.has_active_session());
    assert!(h.stored().is_none());
}

#[tokio::test(start_paused = true)]
async fn started_session_is_persisted_with_user() {
    let h = Harness::signed_in(test_config()).await;
    h.tracker.start_session().await;

    let stored = h.stored().unwrap();
    assert_eq!(stored.session_id, "srv-1");
    assert_eq!(stored.user_id.as_deref(), Some("u1"));
    assert_eq!(stored.start_time, T0);
}

// =============================================================================
// restore
// =============================================================================

#[tokio::test(start_paused = true)]
async fn fresh_descriptor_is_restored_with_original_start_time() {
    let h = Harness::signed_in(test_config()).await;
    h.seed(&descriptor(T0 - 2 * 60_000, "u1"));

    let id = h.tracker.start_session().await.unwrap();

    assert_eq!(id, "stored-1");
    assert_eq!(h.transport.starts(), 0);
    let info = h.tracker.current_session().unwrap();
    assert_eq!(info.start_time, T0 - 10 * 60_000);
    assert_eq!(info.source, SessionSource::Restored);
    assert_eq!(h.tracker.current_project().as_deref(), Some("p1"));
    assert_eq!(h.tracker.current_page().as_deref(), Some("notes"));
}

#[tokio::test(start_paused = true)]
async fn stale_descriptor_is_discarded() {
    let h = Harness::signed_in(test_config()).await;
    h.seed(&descriptor(T0 - 20 * 60_000, "u1"));

    let id = h.tracker.start_session().await.unwrap();

    assert_eq!(id, "srv-1");
    assert_eq!(h.tracker.current_session().unwrap().start_time, T0);
    assert_eq!(h.stored().unwrap().session_id, "srv-1");
}

#[tokio::test(start_paused = true)]
async fn descriptor_of_another_user_is_discarded() {
    let h = Harness::signed_in(test_config()).await;
    h.seed(&descriptor(T0 - 60_000, "u2"));

    assert_eq!(h.tracker.start_session().await.as_deref(), Some("srv-1"));
}

// =============================================================================
// end
// =============================================================================

#[tokio::test(start_paused = true)]
async fn end_session_reports_duration_in_seconds_and_clears_store() {
    let h = Harness::signed_in(test_config()).await;
    h.tracker.start_session().await;
    h.clock.advance_ms(90_500);

    assert!(h.tracker.end_session().await);

    let ends = h.transport.ends();
    assert_eq!(ends.len(), 1);
    assert_eq!(ends[0].session_id, "srv-1");
    assert_eq!(ends[0].duration, 90);
    assert!(h.stored().is_none());
    assert_eq!(h.tracker.phase(), Phase::Ended);
    assert!(!h.tracker.heartbeat_armed());
}

#[tokio::test(start_paused = true)]
async fn concurrent_end_calls_end_once() {
    let h = Harness::signed_in(test_config()).await;
    h.tracker.start_session().await;
    *h.transport.end_delay.lock().unwrap() = Some(Duration::from_secs(1));

    let (a, b) = tokio::join!(h.tracker.end_session(), h.tracker.end_session());

    assert!(a ^ b);
    assert_eq!(h.transport.ends().len(), 1);
    assert!(!h.tracker.has_active_session());
}

#[tokio::test(start_paused = true)]
async fn end_without_session_is_noop() {
    let h = Harness::signed_in(test_config()).await;

    assert!(!h.tracker.end_session().await);
    assert!(h.transport.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn new_session_can_start_after_end() {
    let h = Harness::signed_in(test_config()).await;
    h.tracker.start_session().await;
    h.tracker.end_session().await;

    assert_eq!(h.tracker.start_session().await.as_deref(), Some("srv-2"));
    assert_eq!(h.transport.starts(), 2);
}

#[tokio::test(start_paused = true)]
async fn logout_during_start_discards_late_response() {
    let h = Harness::signed_in(test_config()).await;
    *h.transport.start_delay.lock().unwrap() = Some(Duration::from_secs(1));

    let (started, ()) = tokio::join!(h.tracker.start_session(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        h.tracker.logout().await;
    });

    assert_eq!(started, None);
    assert!(!h.tracker.has_active_session());
    assert_eq!(h.tracker.phase(), Phase::Idle);
    assert!(h.stored().is_none());
}
