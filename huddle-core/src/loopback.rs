//! In-process engine for demos and tests
//!
//! [`LoopbackEngine`] implements the full [`RtcEngine`] capability set
//! entirely in memory: it counts connect calls, tracks the published set,
//! hands out recording track handles, and lets a driver announce remote
//! publish/unpublish/leave events. The CLI demo runs on it, and the test
//! suite uses its failure injection to exercise every failure path without
//! a real vendor SDK.

use crate::config::CallConfig;
use crate::engine::{
    EngineError, EngineEvent, LocalTrack, RemoteTrack, RtcEngine, TrackEndedCallback,
};
use crate::types::{MediaKind, ParticipantUid, SinkId, TrackSource};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

#[derive(Debug, Default)]
struct LocalTrackState {
    play_count: u32,
    stop_count: u32,
    close_count: u32,
    enabled: bool,
    volume: u32,
    last_sink: Option<SinkId>,
}

/// Recording local track handed out by the loopback engine
///
/// Every operation succeeds and is counted, so tests can assert exact call
/// counts.
pub struct LoopbackLocalTrack {
    kind: MediaKind,
    source: TrackSource,
    state: Mutex<LocalTrackState>,
    ended: Mutex<Option<TrackEndedCallback>>,
}

impl LoopbackLocalTrack {
    fn new(kind: MediaKind, source: TrackSource) -> Arc<Self> {
        Arc::new(Self {
            kind,
            source,
            state: Mutex::new(LocalTrackState {
                enabled: true,
                volume: 100,
                ..LocalTrackState::default()
            }),
            ended: Mutex::new(None),
        })
    }

    /// Number of `play` calls observed
    #[must_use]
    pub fn play_count(&self) -> u32 {
        self.state.lock().play_count
    }

    /// Number of `stop` calls observed
    #[must_use]
    pub fn stop_count(&self) -> u32 {
        self.state.lock().stop_count
    }

    /// Number of `close` calls observed
    #[must_use]
    pub fn close_count(&self) -> u32 {
        self.state.lock().close_count
    }

    /// Current enabled flag
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    /// Last applied gain
    #[must_use]
    pub fn volume(&self) -> u32 {
        self.state.lock().volume
    }

    /// Sink of the last `play` call
    #[must_use]
    pub fn last_sink(&self) -> Option<SinkId> {
        self.state.lock().last_sink.clone()
    }

    /// Fire the externally-terminated callback, if one is registered
    ///
    /// Models the browser-native "Stop sharing" control.
    pub fn fire_ended(&self) {
        if let Some(callback) = &*self.ended.lock() {
            callback();
        }
    }
}

#[async_trait]
impl LocalTrack for LoopbackLocalTrack {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn source(&self) -> TrackSource {
        self.source
    }

    async fn play(&self, sink: &SinkId) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        state.play_count += 1;
        state.last_sink = Some(sink.clone());
        Ok(())
    }

    async fn stop(&self) -> Result<(), EngineError> {
        self.state.lock().stop_count += 1;
        Ok(())
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.state.lock().close_count += 1;
        Ok(())
    }

    async fn set_enabled(&self, enabled: bool) -> Result<(), EngineError> {
        self.state.lock().enabled = enabled;
        Ok(())
    }

    async fn set_volume(&self, volume: u32) -> Result<(), EngineError> {
        self.state.lock().volume = volume;
        Ok(())
    }

    fn on_ended(&self, callback: TrackEndedCallback) {
        *self.ended.lock() = Some(callback);
    }
}

impl std::fmt::Debug for LoopbackLocalTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackLocalTrack")
            .field("kind", &self.kind)
            .field("source", &self.source)
            .finish()
    }
}

#[derive(Debug, Default)]
struct RemoteTrackState {
    play_count: u32,
    stop_count: u32,
    volume: u32,
    last_sink: Option<SinkId>,
}

/// Recording remote track handed out by the loopback engine
pub struct LoopbackRemoteTrack {
    uid: ParticipantUid,
    kind: MediaKind,
    state: Mutex<RemoteTrackState>,
}

impl LoopbackRemoteTrack {
    fn new(uid: ParticipantUid, kind: MediaKind) -> Arc<Self> {
        Arc::new(Self {
            uid,
            kind,
            state: Mutex::new(RemoteTrackState {
                volume: 100,
                ..RemoteTrackState::default()
            }),
        })
    }

    /// Owning participant uid
    #[must_use]
    pub fn uid(&self) -> ParticipantUid {
        self.uid
    }

    /// Number of `play` calls observed
    #[must_use]
    pub fn play_count(&self) -> u32 {
        self.state.lock().play_count
    }

    /// Number of `stop` calls observed
    #[must_use]
    pub fn stop_count(&self) -> u32 {
        self.state.lock().stop_count
    }

    /// Last applied gain
    #[must_use]
    pub fn volume(&self) -> u32 {
        self.state.lock().volume
    }

    /// Sink of the last `play` call, if it named one
    #[must_use]
    pub fn last_sink(&self) -> Option<SinkId> {
        self.state.lock().last_sink.clone()
    }
}

#[async_trait]
impl RemoteTrack for LoopbackRemoteTrack {
    fn kind(&self) -> MediaKind {
        self.kind
    }

    async fn play(&self, sink: Option<&SinkId>) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        state.play_count += 1;
        state.last_sink = sink.cloned();
        Ok(())
    }

    async fn stop(&self) -> Result<(), EngineError> {
        self.state.lock().stop_count += 1;
        Ok(())
    }

    async fn set_volume(&self, volume: u32) -> Result<(), EngineError> {
        self.state.lock().volume = volume;
        Ok(())
    }
}

impl std::fmt::Debug for LoopbackRemoteTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackRemoteTrack")
            .field("uid", &self.uid)
            .field("kind", &self.kind)
            .finish()
    }
}

/// In-memory engine implementation
pub struct LoopbackEngine {
    joined: AtomicBool,
    join_calls: AtomicU32,
    fail_next_join: AtomicBool,
    fail_microphone: AtomicBool,
    fail_camera: AtomicBool,
    deny_screen: AtomicBool,
    published: Mutex<Vec<Arc<dyn LocalTrack>>>,
    created: Mutex<Vec<Arc<LoopbackLocalTrack>>>,
    remotes: Mutex<HashMap<(ParticipantUid, MediaKind), Arc<LoopbackRemoteTrack>>>,
    events: broadcast::Sender<EngineEvent>,
}

impl LoopbackEngine {
    /// Create a disconnected engine
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            joined: AtomicBool::new(false),
            join_calls: AtomicU32::new(0),
            fail_next_join: AtomicBool::new(false),
            fail_microphone: AtomicBool::new(false),
            fail_camera: AtomicBool::new(false),
            deny_screen: AtomicBool::new(false),
            published: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            remotes: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Whether a channel is currently joined
    #[must_use]
    pub fn is_joined(&self) -> bool {
        self.joined.load(Ordering::SeqCst)
    }

    /// Number of connect attempts made against this engine
    #[must_use]
    pub fn join_count(&self) -> u32 {
        self.join_calls.load(Ordering::SeqCst)
    }

    /// Reject the next join attempt
    pub fn fail_next_join(&self) {
        self.fail_next_join.store(true, Ordering::SeqCst);
    }

    /// Make the next microphone acquisition fail as device-unavailable
    pub fn fail_microphone_acquisition(&self) {
        self.fail_microphone.store(true, Ordering::SeqCst);
    }

    /// Make the next camera acquisition fail as permission-denied
    pub fn fail_camera_acquisition(&self) {
        self.fail_camera.store(true, Ordering::SeqCst);
    }

    /// Make the next screen capture fail as permission-denied
    pub fn deny_screen_capture(&self) {
        self.deny_screen.store(true, Ordering::SeqCst);
    }

    /// Snapshot of the currently published tracks
    #[must_use]
    pub fn published_tracks(&self) -> Vec<Arc<dyn LocalTrack>> {
        self.published.lock().clone()
    }

    /// Capture sources of the currently published tracks
    #[must_use]
    pub fn published_sources(&self) -> Vec<TrackSource> {
        self.published.lock().iter().map(|t| t.source()).collect()
    }

    /// Whether a specific track handle is in the published set
    #[must_use]
    pub fn is_published(&self, track: &Arc<dyn LocalTrack>) -> bool {
        self.published.lock().iter().any(|p| Arc::ptr_eq(p, track))
    }

    /// The most recently created local track of a capture source
    #[must_use]
    pub fn local_track(&self, source: TrackSource) -> Option<Arc<LoopbackLocalTrack>> {
        self.created
            .lock()
            .iter()
            .rev()
            .find(|t| t.source() == source)
            .cloned()
    }

    /// A remote track previously announced for a participant
    #[must_use]
    pub fn remote_track(
        &self,
        uid: ParticipantUid,
        kind: MediaKind,
    ) -> Option<Arc<LoopbackRemoteTrack>> {
        self.remotes.lock().get(&(uid, kind)).cloned()
    }

    /// Register a remote track without emitting an event
    ///
    /// Used by tests that drive the session's event handler directly.
    pub fn add_remote_track(
        &self,
        uid: ParticipantUid,
        kind: MediaKind,
    ) -> Arc<LoopbackRemoteTrack> {
        let track = LoopbackRemoteTrack::new(uid, kind);
        self.remotes.lock().insert((uid, kind), Arc::clone(&track));
        track
    }

    /// Announce a remote publish: register the track and emit the event
    pub fn announce_publish(
        &self,
        uid: ParticipantUid,
        kind: MediaKind,
    ) -> Arc<LoopbackRemoteTrack> {
        let track = self.add_remote_track(uid, kind);
        let _ = self.events.send(EngineEvent::UserPublished { uid, kind });
        track
    }

    /// Announce a remote unpublish
    ///
    /// The track stays registered so its stop bookkeeping remains
    /// observable.
    pub fn announce_unpublish(&self, uid: ParticipantUid, kind: MediaKind) {
        let _ = self.events.send(EngineEvent::UserUnpublished { uid, kind });
    }

    /// Announce that a remote participant left
    pub fn announce_leave(&self, uid: ParticipantUid) {
        let _ = self.events.send(EngineEvent::UserLeft { uid });
    }
}

impl Default for LoopbackEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RtcEngine for LoopbackEngine {
    async fn join(&self, config: &CallConfig) -> Result<(), EngineError> {
        self.join_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_join.swap(false, Ordering::SeqCst) {
            return Err(EngineError::JoinRejected("injected join failure".into()));
        }
        config
            .validate()
            .map_err(|e| EngineError::JoinRejected(e.to_string()))?;
        self.joined.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn leave(&self) -> Result<(), EngineError> {
        self.joined.store(false, Ordering::SeqCst);
        self.published.lock().clear();
        Ok(())
    }

    async fn publish(&self, tracks: &[Arc<dyn LocalTrack>]) -> Result<(), EngineError> {
        if !self.is_joined() {
            return Err(EngineError::NotConnected);
        }
        let mut published = self.published.lock();
        for track in tracks {
            if !published.iter().any(|p| Arc::ptr_eq(p, track)) {
                published.push(Arc::clone(track));
            }
        }
        Ok(())
    }

    async fn unpublish(&self, track: &Arc<dyn LocalTrack>) -> Result<(), EngineError> {
        self.published.lock().retain(|p| !Arc::ptr_eq(p, track));
        Ok(())
    }

    async fn subscribe(
        &self,
        uid: ParticipantUid,
        kind: MediaKind,
    ) -> Result<Arc<dyn RemoteTrack>, EngineError> {
        self.remotes
            .lock()
            .get(&(uid, kind))
            .cloned()
            .map(|track| track as Arc<dyn RemoteTrack>)
            .ok_or_else(|| {
                EngineError::TrackOperation(format!("no published {kind:?} track for uid {uid}"))
            })
    }

    async fn unsubscribe(&self, _uid: ParticipantUid, _kind: MediaKind) -> Result<(), EngineError> {
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    async fn create_microphone_track(&self) -> Result<Arc<dyn LocalTrack>, EngineError> {
        if self.fail_microphone.swap(false, Ordering::SeqCst) {
            return Err(EngineError::DeviceUnavailable("microphone".into()));
        }
        let track = LoopbackLocalTrack::new(MediaKind::Audio, TrackSource::Microphone);
        self.created.lock().push(Arc::clone(&track));
        Ok(track)
    }

    async fn create_camera_track(&self) -> Result<Arc<dyn LocalTrack>, EngineError> {
        if self.fail_camera.swap(false, Ordering::SeqCst) {
            return Err(EngineError::PermissionDenied("camera".into()));
        }
        let track = LoopbackLocalTrack::new(MediaKind::Video, TrackSource::Camera);
        self.created.lock().push(Arc::clone(&track));
        Ok(track)
    }

    async fn create_screen_track(&self) -> Result<Arc<dyn LocalTrack>, EngineError> {
        if self.deny_screen.swap(false, Ordering::SeqCst) {
            return Err(EngineError::PermissionDenied(
                "screen capture rejected by user".into(),
            ));
        }
        let track = LoopbackLocalTrack::new(MediaKind::Video, TrackSource::Screen);
        self.created.lock().push(Arc::clone(&track));
        Ok(track)
    }
}

impl std::fmt::Debug for LoopbackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackEngine")
            .field("joined", &self.is_joined())
            .field("published", &self.published.lock().len())
            .finish()
    }
}
