//! Channel join/leave lifecycle tests

use huddle_core::{
    CallConfig, ChannelSession, EngineEvent, LoopbackEngine, MediaKind, ParticipantUid, RtcEngine,
    SessionEvent,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn harness_with(config: CallConfig) -> (Arc<LoopbackEngine>, Arc<ChannelSession>) {
    let engine = Arc::new(LoopbackEngine::new());
    let session = Arc::new(ChannelSession::new(
        engine.clone() as Arc<dyn RtcEngine>,
        config,
    ));
    (engine, session)
}

fn harness() -> (Arc<LoopbackEngine>, Arc<ChannelSession>) {
    harness_with(CallConfig::new("test-app", "lifecycle"))
}

async fn wait_for_roster_len(session: &ChannelSession, len: usize) {
    for _ in 0..200 {
        if session.roster().await.len() == len {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("roster did not reach expected size within timeout");
}

#[tokio::test]
async fn join_twice_connects_once() {
    let (engine, session) = harness();

    assert!(session.join().await);
    assert!(session.join().await);

    assert_eq!(engine.join_count(), 1);
    assert!(session.is_connected());
    assert!(engine.is_joined());
}

#[tokio::test]
async fn rejected_join_reports_false_and_allows_retry() {
    let (engine, session) = harness();
    engine.fail_next_join();

    assert!(!session.join().await);
    assert!(!session.is_connected());

    // a fresh user-initiated attempt goes through
    assert!(session.join().await);
    assert_eq!(engine.join_count(), 2);
}

#[tokio::test]
async fn invalid_config_join_is_reported_not_thrown() {
    let (engine, session) = harness_with(CallConfig::new("", "lifecycle"));

    assert!(!session.join().await);
    assert!(!session.is_connected());
    assert_eq!(engine.join_count(), 1);
}

#[tokio::test]
async fn shutdown_stops_remote_tracks_and_leaves() {
    let (engine, session) = harness();
    assert!(session.join().await);

    let uid = ParticipantUid(8);
    let video = engine.add_remote_track(uid, MediaKind::Video);
    let audio = engine.add_remote_track(uid, MediaKind::Audio);
    session
        .handle_engine_event(EngineEvent::UserPublished {
            uid,
            kind: MediaKind::Video,
        })
        .await;
    session
        .handle_engine_event(EngineEvent::UserPublished {
            uid,
            kind: MediaKind::Audio,
        })
        .await;

    session.shutdown().await;

    assert!(!session.is_connected());
    assert!(!engine.is_joined());
    assert!(session.roster().await.is_empty());
    assert_eq!(video.stop_count(), 1);
    assert_eq!(audio.stop_count(), 1);
}

#[tokio::test]
async fn shutdown_without_join_is_noop() {
    let (engine, session) = harness();

    session.shutdown().await;

    assert!(!session.is_connected());
    assert_eq!(engine.join_count(), 0);
}

#[tokio::test]
async fn event_pump_feeds_roster() {
    let (engine, session) = harness();
    assert!(session.join().await);
    Arc::clone(&session).attach_event_pump();

    engine.announce_publish(ParticipantUid(21), MediaKind::Video);

    wait_for_roster_len(&session, 1).await;
}

#[tokio::test]
async fn session_events_reach_subscribers() {
    let (engine, session) = harness();
    let mut events = session.subscribe_events();

    assert!(session.join().await);
    Arc::clone(&session).attach_event_pump();
    let first = timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, SessionEvent::Connected);

    let uid = ParticipantUid(30);
    engine.announce_publish(uid, MediaKind::Video);
    let second = timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second, SessionEvent::VideoPublished { uid });

    engine.announce_leave(uid);
    let third = timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(third, SessionEvent::ParticipantLeft { uid });
}
