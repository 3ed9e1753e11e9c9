//! RTC engine abstraction
//!
//! The engine is the one external collaborator of this crate: it owns every
//! hard real-time media problem (transport, bitrate adaptation, codecs, NAT
//! traversal). This module only defines the capability surface the session
//! controllers orchestrate against, so any engine — a vendor SDK binding or
//! the in-process [`crate::loopback::LoopbackEngine`] — can be injected.

use crate::config::CallConfig;
use crate::types::{MediaKind, ParticipantUid, SinkId, TrackSource};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine refused the channel join
    #[error("join rejected: {0}")]
    JoinRejected(String),

    /// The user denied a capture permission prompt
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A capture device is missing or busy
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// A publish/subscribe/track call failed inside the engine
    #[error("track operation failed: {0}")]
    TrackOperation(String),

    /// Operation requires a joined channel
    #[error("not connected to a channel")]
    NotConnected,
}

impl EngineError {
    /// Whether this failure is a user permission denial
    ///
    /// Permission denials are expected user actions and are logged at a
    /// lower severity than genuine engine faults.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }
}

/// Callback fired when a capture ends outside the application
///
/// Browsers expose a native "Stop sharing" control for screen capture; the
/// engine invokes this callback so the session can run its regular stop path.
pub type TrackEndedCallback = Box<dyn Fn() + Send + Sync>;

/// A locally captured track handle
#[async_trait]
pub trait LocalTrack: Send + Sync {
    /// Media kind carried by this track
    fn kind(&self) -> MediaKind;

    /// Capture source of this track
    fn source(&self) -> TrackSource;

    /// Render the track into a sink
    async fn play(&self, sink: &SinkId) -> Result<(), EngineError>;

    /// Stop rendering without releasing the capture
    async fn stop(&self) -> Result<(), EngineError>;

    /// Release the capture and all resources behind the track
    async fn close(&self) -> Result<(), EngineError>;

    /// Enable or disable the capture (mute/unmute semantics)
    async fn set_enabled(&self, enabled: bool) -> Result<(), EngineError>;

    /// Set the capture gain; valid range is engine-defined per track kind
    async fn set_volume(&self, volume: u32) -> Result<(), EngineError>;

    /// Register the externally-terminated callback
    ///
    /// At most one callback is retained; a second registration replaces the
    /// first.
    fn on_ended(&self, callback: TrackEndedCallback);
}

/// A subscribed remote track handle
#[async_trait]
pub trait RemoteTrack: Send + Sync {
    /// Media kind carried by this track
    fn kind(&self) -> MediaKind;

    /// Render the track; audio plays without a sink
    async fn play(&self, sink: Option<&SinkId>) -> Result<(), EngineError>;

    /// Stop rendering
    async fn stop(&self) -> Result<(), EngineError>;

    /// Set the playback gain; valid range is engine-defined
    async fn set_volume(&self, volume: u32) -> Result<(), EngineError>;
}

/// Presence notifications emitted by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// A remote user published a track
    UserPublished {
        /// Publishing user
        uid: ParticipantUid,
        /// Published media kind
        kind: MediaKind,
    },
    /// A remote user unpublished a track
    UserUnpublished {
        /// Unpublishing user
        uid: ParticipantUid,
        /// Unpublished media kind
        kind: MediaKind,
    },
    /// A remote user left the channel
    UserLeft {
        /// Leaving user
        uid: ParticipantUid,
    },
}

/// The injected RTC engine capability set
///
/// One handle exists per session, created at session start and released at
/// session end. Event delivery uses a broadcast channel: subscribing via
/// [`RtcEngine::events`] is the registration step, dropping the receiver is
/// the deregistration step.
#[async_trait]
pub trait RtcEngine: Send + Sync {
    /// Connect to the configured channel
    async fn join(&self, config: &CallConfig) -> Result<(), EngineError>;

    /// Disconnect from the channel
    async fn leave(&self) -> Result<(), EngineError>;

    /// Publish local tracks to the channel
    async fn publish(&self, tracks: &[Arc<dyn LocalTrack>]) -> Result<(), EngineError>;

    /// Withdraw a previously published track
    async fn unpublish(&self, track: &Arc<dyn LocalTrack>) -> Result<(), EngineError>;

    /// Subscribe to one media kind of a remote user
    async fn subscribe(
        &self,
        uid: ParticipantUid,
        kind: MediaKind,
    ) -> Result<Arc<dyn RemoteTrack>, EngineError>;

    /// Drop the subscription for one media kind of a remote user
    async fn unsubscribe(&self, uid: ParticipantUid, kind: MediaKind) -> Result<(), EngineError>;

    /// Subscribe to presence events
    fn events(&self) -> broadcast::Receiver<EngineEvent>;

    /// Acquire a microphone audio track
    async fn create_microphone_track(&self) -> Result<Arc<dyn LocalTrack>, EngineError>;

    /// Acquire a camera video track
    async fn create_camera_track(&self) -> Result<Arc<dyn LocalTrack>, EngineError>;

    /// Acquire a screen-capture video track (no captured audio)
    async fn create_screen_track(&self) -> Result<Arc<dyn LocalTrack>, EngineError>;
}
