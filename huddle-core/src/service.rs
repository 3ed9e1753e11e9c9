//! Call service orchestration
//!
//! [`CallService`] is the surface the UI shell wires against: it composes
//! the channel session and the media session over one injected engine
//! handle, and carries the cosmetic display-name mapping.

use crate::config::CallConfig;
use crate::engine::RtcEngine;
use crate::media::MediaSession;
use crate::presence::ChannelSession;
use crate::types::{DisplayNames, ParticipantUid, RemoteParticipant, SessionEvent, SessionId};
use crate::volume;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Facade over one call session
pub struct CallService {
    engine: Arc<dyn RtcEngine>,
    session: Arc<ChannelSession>,
    media: Arc<MediaSession>,
    names: parking_lot::RwLock<DisplayNames>,
}

impl CallService {
    /// Create a service over an engine handle and static configuration
    #[must_use]
    pub fn new(engine: Arc<dyn RtcEngine>, config: CallConfig) -> Self {
        let session = Arc::new(ChannelSession::new(Arc::clone(&engine), config));
        let media = Arc::new(MediaSession::new(Arc::clone(&engine)));
        Self {
            engine,
            session,
            media,
            names: parking_lot::RwLock::new(DisplayNames::new()),
        }
    }

    /// Create a builder
    #[must_use]
    pub fn builder(engine: Arc<dyn RtcEngine>, config: CallConfig) -> CallServiceBuilder {
        CallServiceBuilder::new(engine, config)
    }

    /// The injected engine handle
    #[must_use]
    pub fn engine(&self) -> &Arc<dyn RtcEngine> {
        &self.engine
    }

    /// Session identifier for log correlation
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session.id()
    }

    /// Join the channel and bring up local media
    ///
    /// The page-load flow: once the user submits a name the shell calls this
    /// exactly once. Returns whether the channel was joined; a media
    /// initialization failure keeps the call alive (the user stays in the
    /// channel without published tracks) and is only logged. Idempotent like
    /// the underlying join: an extra call neither reconnects nor re-acquires
    /// tracks.
    #[tracing::instrument(skip(self), fields(session = %self.session.id()))]
    pub async fn join_call(&self) -> bool {
        if !self.session.join().await {
            return false;
        }
        Arc::clone(&self.session).attach_event_pump();
        if !self.media.has_tracks().await && !self.media.initialize_tracks().await {
            tracing::warn!("joined channel but local media failed to initialize");
        }
        true
    }

    /// Tear down local media and leave the channel
    #[tracing::instrument(skip(self), fields(session = %self.session.id()))]
    pub async fn leave_call(&self) {
        self.media.shutdown().await;
        self.session.shutdown().await;
    }

    /// Whether the channel is joined
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Flip the microphone mute flag
    pub async fn toggle_audio(&self) {
        self.media.toggle_audio().await;
    }

    /// Flip the camera enabled flag
    pub async fn toggle_video(&self) {
        self.media.toggle_video().await;
    }

    /// Switch between camera and screen publication
    pub async fn toggle_screen_sharing(&self) {
        self.media.toggle_screen_sharing().await;
    }

    /// Whether the microphone is muted
    pub async fn is_audio_muted(&self) -> bool {
        self.media.is_audio_muted().await
    }

    /// Whether the camera is enabled
    pub async fn is_video_enabled(&self) -> bool {
        self.media.is_video_enabled().await
    }

    /// Whether a screen track is live
    #[must_use]
    pub fn is_screen_sharing(&self) -> bool {
        self.media.is_screen_sharing()
    }

    /// Clamp and apply a local capture gain
    pub async fn set_local_volume(&self, volume: i32) {
        self.media.set_local_volume(volume).await;
    }

    /// The last requested local gain, clamped
    #[must_use]
    pub fn local_volume(&self) -> u32 {
        self.media.local_volume()
    }

    /// Clamp and apply a playback gain for one remote participant
    ///
    /// No-op when the participant is unknown or publishes no audio.
    pub async fn set_participant_volume(&self, uid: ParticipantUid, volume: i32) {
        let participant = self.session.participant(uid).await;
        let track = participant.and_then(|p| p.audio_track);
        volume::adjust_remote_volume(track.as_ref(), volume).await;
    }

    /// Participants currently publishing video, in join order
    pub async fn roster(&self) -> Vec<RemoteParticipant> {
        self.session.roster().await
    }

    /// Subscribe to roster and connection changes
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.session.subscribe_events()
    }

    /// Record the local user's display name
    pub fn set_display_name(&self, name: impl Into<String>) {
        self.names.write().set_local(name);
    }

    /// Record a display-name override for a remote participant
    pub fn set_participant_name(&self, uid: ParticipantUid, name: impl Into<String>) {
        self.names.write().set(uid, name);
    }

    /// Label for the local tile ("You" until a name is submitted)
    #[must_use]
    pub fn local_label(&self) -> String {
        self.names.read().local_label()
    }

    /// Label for a remote participant's tile ("User" without an override)
    #[must_use]
    pub fn participant_label(&self, uid: ParticipantUid) -> String {
        self.names.read().label(uid)
    }
}

impl std::fmt::Debug for CallService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallService")
            .field("session", &self.session)
            .finish()
    }
}

/// Call service builder
pub struct CallServiceBuilder {
    engine: Arc<dyn RtcEngine>,
    config: CallConfig,
    display_name: Option<String>,
}

impl CallServiceBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new(engine: Arc<dyn RtcEngine>, config: CallConfig) -> Self {
        Self {
            engine,
            config,
            display_name: None,
        }
    }

    /// Pre-set the local display name
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Build the service
    #[must_use]
    pub fn build(self) -> CallService {
        let service = CallService::new(self.engine, self.config);
        if let Some(name) = self.display_name {
            service.set_display_name(name);
        }
        service
    }
}
