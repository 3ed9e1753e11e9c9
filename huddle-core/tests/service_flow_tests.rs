//! End-to-end call flows through the service facade

use huddle_core::{
    CallConfig, CallService, LoopbackEngine, MediaKind, ParticipantUid, RtcEngine, TrackSource,
};
use std::sync::Arc;
use std::time::Duration;

fn harness() -> (Arc<LoopbackEngine>, CallService) {
    let engine = Arc::new(LoopbackEngine::new());
    let service = CallService::builder(
        engine.clone() as Arc<dyn RtcEngine>,
        CallConfig::new("test-app", "standup"),
    )
    .with_display_name("Alice")
    .build();
    (engine, service)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within timeout");
}

#[tokio::test]
async fn name_submit_then_join_previews_local_video_once() {
    let (engine, service) = harness();
    assert_eq!(service.local_label(), "Alice");

    assert!(service.join_call().await);

    let camera = engine.local_track(TrackSource::Camera).unwrap();
    assert_eq!(camera.play_count(), 1);
    assert_eq!(camera.last_sink().unwrap().as_str(), "local-video");
    assert_eq!(engine.join_count(), 1);
}

#[tokio::test]
async fn repeated_join_call_neither_reconnects_nor_reacquires() {
    let (engine, service) = harness();

    assert!(service.join_call().await);
    assert!(service.join_call().await);

    assert_eq!(engine.join_count(), 1);
    let camera = engine.local_track(TrackSource::Camera).unwrap();
    assert_eq!(camera.play_count(), 1);
}

#[tokio::test]
async fn failed_join_skips_media_initialization() {
    let (engine, service) = harness();
    engine.fail_next_join();

    assert!(!service.join_call().await);

    assert!(!service.is_connected());
    assert!(engine.local_track(TrackSource::Camera).is_none());
    assert!(engine.local_track(TrackSource::Microphone).is_none());
}

#[tokio::test]
async fn media_failure_keeps_the_call_alive() {
    let (engine, service) = harness();
    engine.fail_camera_acquisition();

    assert!(service.join_call().await);

    assert!(service.is_connected());
    assert!(engine.published_sources().is_empty());
}

#[tokio::test]
async fn roster_and_labels_follow_remote_publishes() {
    let (engine, service) = harness();
    assert!(service.join_call().await);

    let uid = ParticipantUid(42);
    engine.announce_publish(uid, MediaKind::Video);

    let mut seen = Vec::new();
    for _ in 0..200 {
        seen = service.roster().await;
        if !seen.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].uid, uid);

    assert_eq!(service.participant_label(uid), "User");
    service.set_participant_name(uid, "Robin");
    assert_eq!(service.participant_label(uid), "Robin");
}

#[tokio::test]
async fn participant_volume_is_clamped_to_remote_range() {
    let (engine, service) = harness();
    assert!(service.join_call().await);

    let uid = ParticipantUid(42);
    let audio = engine.announce_publish(uid, MediaKind::Audio);
    wait_until(|| audio.play_count() == 1).await;

    service.set_participant_volume(uid, 400).await;
    assert_eq!(audio.volume(), 100);

    service.set_participant_volume(uid, -3).await;
    assert_eq!(audio.volume(), 0);

    // unknown participants are a silent no-op
    service.set_participant_volume(ParticipantUid(999), 50).await;
}

#[tokio::test]
async fn toggles_route_through_the_media_session() {
    let (engine, service) = harness();
    assert!(service.join_call().await);

    service.toggle_audio().await;
    assert!(service.is_audio_muted().await);

    service.toggle_video().await;
    assert!(!service.is_video_enabled().await);

    service.toggle_screen_sharing().await;
    assert!(service.is_screen_sharing());
    assert!(engine.published_sources().contains(&TrackSource::Screen));

    service.set_local_volume(700).await;
    assert_eq!(service.local_volume(), 700);
}

#[tokio::test]
async fn leave_call_tears_everything_down() {
    let (engine, service) = harness();
    assert!(service.join_call().await);

    let uid = ParticipantUid(13);
    let video = engine.announce_publish(uid, MediaKind::Video);
    wait_until(|| video.play_count() == 1).await;

    service.leave_call().await;

    assert!(!service.is_connected());
    assert!(!engine.is_joined());
    assert!(service.roster().await.is_empty());
    assert_eq!(video.stop_count(), 1);
    assert_eq!(
        engine
            .local_track(TrackSource::Camera)
            .unwrap()
            .close_count(),
        1
    );
}
