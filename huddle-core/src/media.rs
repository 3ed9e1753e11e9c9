//! Local media session control
//!
//! Owns microphone/camera acquisition, publication, and the mute, video, and
//! screen-share toggles. The invariant maintained here: at most one of
//! {camera track, screen track} is published at any time; audio is
//! independent of that exclusivity.

use crate::engine::{LocalTrack, RtcEngine};
use crate::screen::ScreenShare;
use crate::types::SinkId;
use crate::volume;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Local track handles and toggle flags
#[derive(Default)]
struct LocalMediaState {
    audio_track: Option<Arc<dyn LocalTrack>>,
    video_track: Option<Arc<dyn LocalTrack>>,
    is_audio_muted: bool,
    is_video_enabled: bool,
}

/// Media session controller
///
/// Every operation resolves to a success flag or plain completion; failures
/// are logged and never raised to the caller.
pub struct MediaSession {
    engine: Arc<dyn RtcEngine>,
    state: RwLock<LocalMediaState>,
    screen: Arc<ScreenShare>,
    local_volume: AtomicU32,
}

impl MediaSession {
    /// Create a session with no acquired tracks
    #[must_use]
    pub fn new(engine: Arc<dyn RtcEngine>) -> Self {
        let screen = Arc::new(ScreenShare::new(Arc::clone(&engine)));
        Self {
            engine,
            state: RwLock::new(LocalMediaState {
                is_video_enabled: true,
                ..LocalMediaState::default()
            }),
            screen,
            local_volume: AtomicU32::new(100),
        }
    }

    /// Acquire and publish the microphone and camera tracks
    ///
    /// Both captures run concurrently; on any failure every acquired track
    /// is released again so no partial-publish state persists, and the
    /// result is `false`. On success the camera plays into the local preview
    /// sink and the current local gain is applied to the microphone.
    #[tracing::instrument(skip(self))]
    pub async fn initialize_tracks(&self) -> bool {
        let (audio_res, video_res) = tokio::join!(
            self.engine.create_microphone_track(),
            self.engine.create_camera_track(),
        );

        let (audio, video) = match (audio_res, video_res) {
            (Ok(audio), Ok(video)) => (audio, video),
            (audio_res, video_res) => {
                for e in [&audio_res, &video_res]
                    .into_iter()
                    .filter_map(|r| r.as_ref().err())
                {
                    if e.is_permission_denied() {
                        tracing::warn!(error = %e, "media permission denied by user");
                    } else {
                        tracing::error!(error = %e, "failed to acquire local track");
                    }
                }
                for track in [audio_res, video_res].into_iter().flatten() {
                    release_quietly(&track).await;
                }
                return false;
            }
        };

        if let Err(e) = self
            .engine
            .publish(&[Arc::clone(&audio), Arc::clone(&video)])
            .await
        {
            tracing::error!(error = %e, "failed to publish local tracks");
            release_quietly(&audio).await;
            release_quietly(&video).await;
            return false;
        }

        if let Err(e) = video.play(&SinkId::local()).await {
            tracing::error!(error = %e, "failed to start local preview");
        }

        let gain = self.local_volume.load(Ordering::SeqCst) as i32;
        volume::adjust_local_volume(Some(&audio), gain).await;

        let mut state = self.state.write().await;
        state.audio_track = Some(audio);
        state.video_track = Some(video);
        tracing::info!("local tracks published");
        true
    }

    /// Flip the microphone mute flag
    ///
    /// No-op without an acquired audio track. The flag only changes when the
    /// engine accepted the enable call.
    pub async fn toggle_audio(&self) {
        let mut state = self.state.write().await;
        let Some(track) = state.audio_track.clone() else {
            return;
        };
        let muted = !state.is_audio_muted;
        match track.set_enabled(!muted).await {
            Ok(()) => {
                state.is_audio_muted = muted;
                tracing::debug!(muted, "microphone toggled");
            }
            Err(e) => tracing::error!(error = %e, "failed to toggle microphone"),
        }
    }

    /// Flip the camera enabled flag
    ///
    /// No-op without an acquired video track.
    pub async fn toggle_video(&self) {
        let mut state = self.state.write().await;
        let Some(track) = state.video_track.clone() else {
            return;
        };
        let enabled = !state.is_video_enabled;
        match track.set_enabled(enabled).await {
            Ok(()) => {
                state.is_video_enabled = enabled;
                tracing::debug!(enabled, "camera toggled");
            }
            Err(e) => tracing::error!(error = %e, "failed to toggle camera"),
        }
    }

    /// Switch between camera and screen publication
    ///
    /// Entering: the screen capture is acquired first (so a denied
    /// permission prompt leaves the camera untouched), then the camera is
    /// unpublished and stopped, then the screen track goes live. Leaving:
    /// the screen track is stopped, then the camera is re-enabled,
    /// republished, and resumes the local preview.
    ///
    /// Step failures after the capture is acquired are logged without
    /// rollback: a screen publish failure leaves both camera and screen
    /// unpublished until the user retries. The state lock is held for the
    /// whole transition, so overlapping toggles serialize; there is no
    /// single-flight rejection.
    #[tracing::instrument(skip(self))]
    pub async fn toggle_screen_sharing(&self) {
        let mut state = self.state.write().await;
        if !self.screen.is_active() {
            let Some(screen_track) = self.screen.acquire().await else {
                tracing::warn!("screen share unavailable; camera publication unchanged");
                return;
            };
            if let Some(camera) = state.video_track.clone() {
                if let Err(e) = self.engine.unpublish(&camera).await {
                    tracing::error!(error = %e, "failed to unpublish camera for screen share");
                }
                if let Err(e) = camera.stop().await {
                    tracing::error!(error = %e, "failed to stop camera preview");
                }
            }
            if !Arc::clone(&self.screen).go_live(screen_track).await {
                tracing::warn!("screen share did not start; camera stays unpublished until retried");
            }
        } else {
            self.screen.stop().await;
            if let Some(camera) = state.video_track.clone() {
                match camera.set_enabled(true).await {
                    Ok(()) => state.is_video_enabled = true,
                    Err(e) => tracing::error!(error = %e, "failed to re-enable camera"),
                }
                if let Err(e) = self.engine.publish(&[Arc::clone(&camera)]).await {
                    tracing::error!(error = %e, "failed to republish camera");
                }
                if let Err(e) = camera.play(&SinkId::local()).await {
                    tracing::error!(error = %e, "failed to resume local preview");
                }
            }
        }
    }

    /// Clamp and apply a local capture gain, remembering it for later tracks
    pub async fn set_local_volume(&self, volume: i32) {
        let clamped = volume::clamp_local(volume);
        self.local_volume.store(clamped, Ordering::SeqCst);
        let state = self.state.read().await;
        volume::adjust_local_volume(state.audio_track.as_ref(), volume).await;
    }

    /// The last requested local gain, clamped
    #[must_use]
    pub fn local_volume(&self) -> u32 {
        self.local_volume.load(Ordering::SeqCst)
    }

    /// Whether the microphone is muted
    pub async fn is_audio_muted(&self) -> bool {
        self.state.read().await.is_audio_muted
    }

    /// Whether the camera is enabled
    pub async fn is_video_enabled(&self) -> bool {
        self.state.read().await.is_video_enabled
    }

    /// Whether a screen track is live
    #[must_use]
    pub fn is_screen_sharing(&self) -> bool {
        self.screen.is_active()
    }

    /// Whether local tracks have been acquired
    pub async fn has_tracks(&self) -> bool {
        let state = self.state.read().await;
        state.audio_track.is_some() || state.video_track.is_some()
    }

    /// Release every local track and stop any screen share
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) {
        self.screen.stop().await;
        let mut state = self.state.write().await;
        if let Some(track) = state.audio_track.take() {
            release_quietly(&track).await;
        }
        if let Some(track) = state.video_track.take() {
            release_quietly(&track).await;
        }
        tracing::info!("local media released");
    }
}

async fn release_quietly(track: &Arc<dyn LocalTrack>) {
    if let Err(e) = track.close().await {
        tracing::error!(error = %e, "failed to release local track");
    }
}

impl std::fmt::Debug for MediaSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaSession")
            .field("screen_sharing", &self.is_screen_sharing())
            .finish()
    }
}
