//! Huddle - client-session coordination for multi-party video calls
//!
//! This library is the thin coordination layer a call page needs on top of a
//! real-time-communication engine: channel join/leave, the remote-participant
//! roster, local track publication, and the mute/video/screen-share toggles.
//! Everything hard about real-time media — transport, adaptive bitrate,
//! codecs, NAT traversal — lives inside the injected engine, which this crate
//! treats as an opaque collaborator behind the [`RtcEngine`] trait.
//!
//! # Examples
//!
//! ```rust,no_run
//! use huddle_core::{CallConfig, CallService, LoopbackEngine};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let engine = Arc::new(LoopbackEngine::new());
//! let config = CallConfig::new("demo-app", "standup");
//!
//! let service = CallService::builder(engine, config)
//!     .with_display_name("Alice")
//!     .build();
//!
//! if service.join_call().await {
//!     service.toggle_audio().await;
//!     service.leave_call().await;
//! }
//! # }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::panic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

/// Session types and data structures
pub mod types;

/// Static call configuration
pub mod config;

/// RTC engine abstraction
pub mod engine;

/// Channel presence and the remote roster
pub mod presence;

/// Local media session control
pub mod media;

/// Screen-capture share control
pub mod screen;

/// Gain clamping for local and remote tracks
pub mod volume;

/// Call service orchestration
pub mod service;

/// In-process engine for demos and tests
pub mod loopback;

// Re-export main types at crate root
pub use config::{CallConfig, ConfigError};
pub use engine::{
    EngineError, EngineEvent, LocalTrack, RemoteTrack, RtcEngine, TrackEndedCallback,
};
pub use loopback::{LoopbackEngine, LoopbackLocalTrack, LoopbackRemoteTrack};
pub use media::MediaSession;
pub use presence::ChannelSession;
pub use screen::ScreenShare;
pub use service::{CallService, CallServiceBuilder};
pub use types::{
    DisplayNames, MediaKind, ParticipantUid, RemoteParticipant, SessionEvent, SessionId, SinkId,
    TrackSource,
};
pub use volume::{
    adjust_local_volume, adjust_remote_volume, clamp_local, clamp_remote, LOCAL_VOLUME_MAX,
    REMOTE_VOLUME_MAX,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::CallConfig;
    pub use crate::engine::{EngineError, EngineEvent, LocalTrack, RemoteTrack, RtcEngine};
    pub use crate::loopback::LoopbackEngine;
    pub use crate::media::MediaSession;
    pub use crate::presence::ChannelSession;
    pub use crate::service::{CallService, CallServiceBuilder};
    pub use crate::types::{
        MediaKind, ParticipantUid, RemoteParticipant, SessionEvent, SinkId, TrackSource,
    };
}
