//! Local media acquisition, toggle, and screen-share transition tests

use huddle_core::{CallConfig, LoopbackEngine, MediaSession, RtcEngine, ScreenShare, TrackSource};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

async fn joined_engine() -> Arc<LoopbackEngine> {
    let engine = Arc::new(LoopbackEngine::new());
    engine
        .join(&CallConfig::new("test-app", "media"))
        .await
        .unwrap();
    engine
}

async fn initialized(engine: &Arc<LoopbackEngine>) -> MediaSession {
    let media = MediaSession::new(engine.clone() as Arc<dyn RtcEngine>);
    assert!(media.initialize_tracks().await);
    media
}

/// Count of camera/screen tracks in the published set; the exclusivity
/// invariant requires this to be at most one at any observation point.
fn published_video_like(engine: &LoopbackEngine) -> usize {
    engine
        .published_sources()
        .iter()
        .filter(|s| matches!(s, TrackSource::Camera | TrackSource::Screen))
        .count()
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
async fn initialize_publishes_microphone_and_camera() {
    let engine = joined_engine().await;
    let media = initialized(&engine).await;

    let sources = engine.published_sources();
    assert_eq!(sources.len(), 2);
    assert!(sources.contains(&TrackSource::Microphone));
    assert!(sources.contains(&TrackSource::Camera));

    let camera = engine.local_track(TrackSource::Camera).unwrap();
    assert_eq!(camera.play_count(), 1);
    assert_eq!(camera.last_sink().unwrap().as_str(), "local-video");
    assert!(media.has_tracks().await);
}

#[tokio::test]
async fn failed_acquisition_leaves_no_partial_state() {
    let engine = joined_engine().await;
    engine.fail_camera_acquisition();
    let media = MediaSession::new(engine.clone() as Arc<dyn RtcEngine>);

    assert!(!media.initialize_tracks().await);

    assert!(engine.published_sources().is_empty());
    assert!(!media.has_tracks().await);
    // the microphone acquired concurrently is released again
    let mic = engine.local_track(TrackSource::Microphone).unwrap();
    assert_eq!(mic.close_count(), 1);
}

#[tokio::test]
async fn publish_failure_releases_both_tracks() {
    // engine never joined, so the publish is rejected
    let engine = Arc::new(LoopbackEngine::new());
    let media = MediaSession::new(engine.clone() as Arc<dyn RtcEngine>);

    assert!(!media.initialize_tracks().await);

    assert!(!media.has_tracks().await);
    let mic = engine.local_track(TrackSource::Microphone).unwrap();
    let camera = engine.local_track(TrackSource::Camera).unwrap();
    assert_eq!(mic.close_count(), 1);
    assert_eq!(camera.close_count(), 1);
}

#[tokio::test]
async fn toggle_audio_flips_mute_and_enabled() {
    let engine = joined_engine().await;
    let media = initialized(&engine).await;
    let mic = engine.local_track(TrackSource::Microphone).unwrap();

    assert!(!media.is_audio_muted().await);
    assert!(mic.is_enabled());

    media.toggle_audio().await;
    assert!(media.is_audio_muted().await);
    assert!(!mic.is_enabled());

    media.toggle_audio().await;
    assert!(!media.is_audio_muted().await);
    assert!(mic.is_enabled());
}

#[tokio::test]
async fn toggle_video_flips_enabled() {
    let engine = joined_engine().await;
    let media = initialized(&engine).await;
    let camera = engine.local_track(TrackSource::Camera).unwrap();

    media.toggle_video().await;
    assert!(!media.is_video_enabled().await);
    assert!(!camera.is_enabled());

    media.toggle_video().await;
    assert!(media.is_video_enabled().await);
    assert!(camera.is_enabled());
}

#[tokio::test]
async fn toggles_without_tracks_are_noops() {
    let engine = joined_engine().await;
    let media = MediaSession::new(engine.clone() as Arc<dyn RtcEngine>);

    media.toggle_audio().await;
    media.toggle_video().await;

    assert!(!media.is_audio_muted().await);
    assert!(media.is_video_enabled().await);
}

#[tokio::test]
async fn screen_share_swaps_camera_for_screen() {
    let engine = joined_engine().await;
    let media = initialized(&engine).await;

    media.toggle_screen_sharing().await;

    assert!(media.is_screen_sharing());
    let sources = engine.published_sources();
    assert!(sources.contains(&TrackSource::Screen));
    assert!(!sources.contains(&TrackSource::Camera));
    // audio publication is independent of the camera/screen exclusivity
    assert!(sources.contains(&TrackSource::Microphone));
    assert_eq!(published_video_like(&engine), 1);

    let camera = engine.local_track(TrackSource::Camera).unwrap();
    assert_eq!(camera.stop_count(), 1);
    let screen = engine.local_track(TrackSource::Screen).unwrap();
    assert_eq!(screen.play_count(), 1);
    assert_eq!(screen.last_sink().unwrap().as_str(), "local-video");
}

#[tokio::test]
async fn leaving_screen_share_restores_camera() {
    let engine = joined_engine().await;
    let media = initialized(&engine).await;

    media.toggle_screen_sharing().await;
    media.toggle_screen_sharing().await;

    assert!(!media.is_screen_sharing());
    let sources = engine.published_sources();
    assert!(sources.contains(&TrackSource::Camera));
    assert!(!sources.contains(&TrackSource::Screen));
    assert_eq!(published_video_like(&engine), 1);

    let screen = engine.local_track(TrackSource::Screen).unwrap();
    assert_eq!(screen.close_count(), 1);
    let camera = engine.local_track(TrackSource::Camera).unwrap();
    assert!(camera.is_enabled());
    assert_eq!(camera.play_count(), 2);
    assert!(media.is_video_enabled().await);
}

#[tokio::test]
async fn denied_screen_capture_keeps_camera_published() {
    let engine = joined_engine().await;
    let media = initialized(&engine).await;
    let camera = engine.local_track(TrackSource::Camera).unwrap();

    engine.deny_screen_capture();
    media.toggle_screen_sharing().await;

    assert!(!media.is_screen_sharing());
    assert!(engine.published_sources().contains(&TrackSource::Camera));
    assert_eq!(camera.stop_count(), 0);
    assert_eq!(camera.play_count(), 1);

    // the denial is not sticky; the next toggle succeeds
    media.toggle_screen_sharing().await;
    assert!(media.is_screen_sharing());
}

#[tokio::test]
async fn browser_stop_control_ends_screen_share() {
    let engine = joined_engine().await;
    let media = initialized(&engine).await;

    media.toggle_screen_sharing().await;
    let screen = engine.local_track(TrackSource::Screen).unwrap();

    screen.fire_ended();
    wait_until(|| !media.is_screen_sharing()).await;

    assert!(!engine.published_sources().contains(&TrackSource::Screen));
    assert_eq!(screen.close_count(), 1);
    // the external stop path does not republish the camera; a fresh toggle
    // is needed, mirroring the documented no-rollback behavior
    assert!(!engine.published_sources().contains(&TrackSource::Camera));
}

#[tokio::test]
async fn screen_share_direct_start_and_stop() {
    let engine = joined_engine().await;
    let share = Arc::new(ScreenShare::new(engine.clone() as Arc<dyn RtcEngine>));

    let track = Arc::clone(&share).start().await;
    assert!(track.is_some());
    assert!(share.is_active());
    assert!(share.current_track().await.is_some());
    assert!(engine.published_sources().contains(&TrackSource::Screen));

    share.stop().await;
    assert!(!share.is_active());
    assert!(share.current_track().await.is_none());
    assert!(engine.published_sources().is_empty());
    // a second stop is a no-op
    share.stop().await;
}

#[tokio::test]
async fn screen_share_direct_start_denied_yields_none() {
    let engine = joined_engine().await;
    let share = Arc::new(ScreenShare::new(engine.clone() as Arc<dyn RtcEngine>));
    engine.deny_screen_capture();

    let track = Arc::clone(&share).start().await;
    assert!(track.is_none());
    assert!(!share.is_active());
    assert!(engine.published_sources().is_empty());
}

#[tokio::test]
async fn local_volume_clamps_and_applies() {
    let engine = joined_engine().await;
    let media = initialized(&engine).await;
    let mic = engine.local_track(TrackSource::Microphone).unwrap();

    media.set_local_volume(4000).await;
    assert_eq!(media.local_volume(), 1000);
    assert_eq!(mic.volume(), 1000);

    media.set_local_volume(-20).await;
    assert_eq!(media.local_volume(), 0);
    assert_eq!(mic.volume(), 0);

    media.set_local_volume(250).await;
    assert_eq!(mic.volume(), 250);
}

#[tokio::test]
async fn shutdown_releases_everything() {
    let engine = joined_engine().await;
    let media = initialized(&engine).await;
    media.toggle_screen_sharing().await;

    media.shutdown().await;

    assert!(!media.has_tracks().await);
    assert!(!media.is_screen_sharing());
    assert_eq!(
        engine
            .local_track(TrackSource::Microphone)
            .unwrap()
            .close_count(),
        1
    );
    assert_eq!(
        engine
            .local_track(TrackSource::Screen)
            .unwrap()
            .close_count(),
        1
    );
}
