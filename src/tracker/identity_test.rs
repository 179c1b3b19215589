use super::*;
use crate::api::ApiError;
use crate::tracker::TrackOutcome;
use crate::tracker::test_helpers::{Harness, test_config};
use std::sync::atomic::Ordering;

#[tokio::test(start_paused = true)]
async fn refresh_auth_signs_in_current_user() {
    let h = Harness::anonymous(test_config());
    *h.transport.me.lock().unwrap() = Some(Ok(AuthUser::new("u1")));

    assert!(h.tracker.refresh_auth().await);
    assert!(h.tracker.is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn refresh_auth_unauthorized_signs_out_and_ends_session() {
    let h = Harness::signed_in(test_config()).await;
    h.tracker.start_session().await;

    assert!(!h.tracker.refresh_auth().await);

    assert!(!h.tracker.is_authenticated());
    assert!(!h.tracker.has_active_session());
    assert_eq!(h.transport.ends().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn refresh_auth_network_error_keeps_state() {
    let h = Harness::signed_in(test_config()).await;
    *h.transport.me.lock().unwrap() = Some(Err(ApiError::Network("timeout".into())));

    assert!(h.tracker.refresh_auth().await);
    assert!(h.tracker.is_authenticated());
}

#[tokio::test(start_paused = true)]
async fn switching_user_ends_previous_session() {
    let h = Harness::signed_in(test_config()).await;
    h.tracker.start_session().await;

    h.tracker.login(AuthUser::new("u2")).await;

    assert_eq!(h.transport.ends().len(), 1);
    assert!(!h.tracker.has_active_session());
    assert_eq!(h.tracker.start_session().await.as_deref(), Some("srv-2"));
    assert_eq!(h.tracker.current_session().unwrap().user_id.as_deref(), Some("u2"));
}

#[tokio::test(start_paused = true)]
async fn same_user_login_keeps_session() {
    let h = Harness::signed_in(test_config()).await;
    let id = h.tracker.start_session().await.unwrap();

    h.tracker.login(AuthUser::new("u1")).await;

    assert!(h.transport.ends().is_empty());
    assert_eq!(h.tracker.current_session().unwrap().session_id, id);
}

#[tokio::test(start_paused = true)]
async fn logout_clears_backlog_and_store() {
    let h = Harness::signed_in(test_config()).await;
    h.tracker.start_session().await;
    h.transport.track_failures.store(100, Ordering::SeqCst);
    h.tracker.track_action("save", None).await;
    assert_eq!(h.tracker.backlog_len(), 1);

    h.tracker.logout().await;

    assert_eq!(h.tracker.backlog_len(), 0);
    assert!(h.stored().is_none());
    assert!(!h.tracker.is_authenticated());
    assert_eq!(h.tracker.track_action("save", None).await, TrackOutcome::Dropped);
}
