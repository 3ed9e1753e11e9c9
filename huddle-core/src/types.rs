//! Session types and data structures

use crate::engine::RemoteTrack;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Unique identifier for one call-page session
///
/// Exactly one session exists per call page; the id only serves log
/// correlation and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric identifier the engine assigns to a remote participant
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct ParticipantUid(pub u64);

impl ParticipantUid {
    /// Create a participant uid from its numeric value
    #[must_use]
    pub fn new(uid: u64) -> Self {
        Self(uid)
    }
}

impl fmt::Display for ParticipantUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ParticipantUid {
    fn from(uid: u64) -> Self {
        Self(uid)
    }
}

/// Kind of media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    /// Audio stream
    Audio,
    /// Video stream
    Video,
}

/// Capture source of a local track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackSource {
    /// Microphone audio capture
    Microphone,
    /// Camera video capture
    Camera,
    /// Screen video capture
    Screen,
}

/// Opaque rendering-target handle the engine plays video into
///
/// Sinks are never interpreted by this crate; the engine resolves them to
/// whatever surface it renders on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SinkId(String);

impl SinkId {
    /// Sink for the local camera or screen preview
    #[must_use]
    pub fn local() -> Self {
        Self("local-video".to_string())
    }

    /// Sink for a remote participant's video tile
    #[must_use]
    pub fn remote(uid: ParticipantUid) -> Self {
        Self(format!("remote-video-{uid}"))
    }

    /// The raw sink identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Roster entry for a remote participant
///
/// Created when the engine signals a published user, removed on unpublish
/// or leave. Track handles are shared with the engine.
#[derive(Clone)]
pub struct RemoteParticipant {
    /// Engine-assigned uid
    pub uid: ParticipantUid,
    /// Subscribed remote video track, if the participant publishes video
    pub video_track: Option<Arc<dyn RemoteTrack>>,
    /// Subscribed remote audio track, if the participant publishes audio
    pub audio_track: Option<Arc<dyn RemoteTrack>>,
    /// When this participant first appeared; only affects tile ordering
    pub joined_at: DateTime<Utc>,
}

impl RemoteParticipant {
    /// Create an empty roster entry for a uid
    #[must_use]
    pub fn new(uid: ParticipantUid) -> Self {
        Self {
            uid,
            video_track: None,
            audio_track: None,
            joined_at: Utc::now(),
        }
    }

    /// Whether the participant currently publishes video
    #[must_use]
    pub fn has_video(&self) -> bool {
        self.video_track.is_some()
    }

    /// Whether the participant currently publishes audio
    #[must_use]
    pub fn has_audio(&self) -> bool {
        self.audio_track.is_some()
    }
}

impl fmt::Debug for RemoteParticipant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteParticipant")
            .field("uid", &self.uid)
            .field("video", &self.has_video())
            .field("audio", &self.has_audio())
            .field("joined_at", &self.joined_at)
            .finish()
    }
}

/// Display-name mapping for the local user and remote participants
///
/// Purely cosmetic; labels fall back to "You" / "User" when no name was
/// submitted for the slot.
#[derive(Debug, Clone, Default)]
pub struct DisplayNames {
    local: Option<String>,
    by_uid: HashMap<ParticipantUid, String>,
}

impl DisplayNames {
    /// Create an empty mapping
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the local user's name
    pub fn set_local(&mut self, name: impl Into<String>) {
        self.local = Some(name.into());
    }

    /// The local user's name, if submitted
    #[must_use]
    pub fn local(&self) -> Option<&str> {
        self.local.as_deref()
    }

    /// Record a name override for a remote participant
    pub fn set(&mut self, uid: ParticipantUid, name: impl Into<String>) {
        self.by_uid.insert(uid, name.into());
    }

    /// Label for the local tile
    #[must_use]
    pub fn local_label(&self) -> String {
        self.local.clone().unwrap_or_else(|| "You".to_string())
    }

    /// Label for a remote participant's tile
    #[must_use]
    pub fn label(&self, uid: ParticipantUid) -> String {
        self.by_uid
            .get(&uid)
            .cloned()
            .unwrap_or_else(|| "User".to_string())
    }

    /// Forget a remote participant's override
    pub fn remove(&mut self, uid: ParticipantUid) {
        self.by_uid.remove(&uid);
    }
}

/// Roster and connection changes emitted for UI consumption
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// The channel was joined
    Connected,
    /// The channel was left
    Disconnected,
    /// A remote participant started publishing video
    VideoPublished {
        /// Participant uid
        uid: ParticipantUid,
    },
    /// A remote participant started publishing audio
    AudioPublished {
        /// Participant uid
        uid: ParticipantUid,
    },
    /// A remote participant stopped publishing video
    VideoUnpublished {
        /// Participant uid
        uid: ParticipantUid,
    },
    /// A remote participant stopped publishing audio
    AudioUnpublished {
        /// Participant uid
        uid: ParticipantUid,
    },
    /// A remote participant left the channel
    ParticipantLeft {
        /// Participant uid
        uid: ParticipantUid,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_unique() {
        let id1 = SessionId::new();
        let id2 = SessionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_sink_id_formats() {
        assert_eq!(SinkId::local().as_str(), "local-video");
        assert_eq!(
            SinkId::remote(ParticipantUid(42)).as_str(),
            "remote-video-42"
        );
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut names = DisplayNames::new();
        assert_eq!(names.local_label(), "You");
        assert_eq!(names.label(ParticipantUid(7)), "User");

        names.set_local("Alice");
        names.set(ParticipantUid(7), "Bob");
        assert_eq!(names.local_label(), "Alice");
        assert_eq!(names.label(ParticipantUid(7)), "Bob");

        names.remove(ParticipantUid(7));
        assert_eq!(names.label(ParticipantUid(7)), "User");
    }

    #[test]
    fn test_remote_participant_flags() {
        let p = RemoteParticipant::new(ParticipantUid(1));
        assert!(!p.has_video());
        assert!(!p.has_audio());
    }

    #[test]
    fn test_session_event_round_trip() {
        let event = SessionEvent::VideoPublished {
            uid: ParticipantUid(9),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: SessionEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
