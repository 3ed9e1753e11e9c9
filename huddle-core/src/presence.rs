//! Channel presence and the remote roster
//!
//! [`ChannelSession`] owns the engine handle's channel lifecycle: the
//! idempotent join, the roster of remote participants derived from engine
//! presence events, and teardown. Event handling is exposed as an explicit
//! observer method ([`ChannelSession::handle_engine_event`]) so each event
//! type can be fired synthetically in tests; at runtime a pump task forwards
//! the engine's event stream into it.

use crate::config::CallConfig;
use crate::engine::{EngineEvent, RtcEngine};
use crate::types::{MediaKind, ParticipantUid, RemoteParticipant, SessionEvent, SessionId, SinkId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

/// Channel session and presence controller
///
/// Exactly one per call page. Join failures are reported as `false`, never
/// raised; no event handler lets an engine fault escape.
pub struct ChannelSession {
    id: SessionId,
    engine: Arc<dyn RtcEngine>,
    config: CallConfig,
    connected: AtomicBool,
    remotes: RwLock<HashMap<ParticipantUid, RemoteParticipant>>,
    events: broadcast::Sender<SessionEvent>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelSession {
    /// Create a disconnected session over an engine handle
    #[must_use]
    pub fn new(engine: Arc<dyn RtcEngine>, config: CallConfig) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            id: SessionId::new(),
            engine,
            config,
            connected: AtomicBool::new(false),
            remotes: RwLock::new(HashMap::new()),
            events,
            pump: Mutex::new(None),
        }
    }

    /// Session identifier for log correlation
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Whether the channel is currently joined
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// The static configuration this session joins with
    #[must_use]
    pub fn config(&self) -> &CallConfig {
        &self.config
    }

    /// Join the configured channel
    ///
    /// Idempotent: a second call while connected performs no engine call and
    /// returns `true`. A rejected join is logged and reported as `false`.
    pub async fn join(&self) -> bool {
        if self.is_connected() {
            tracing::debug!(session = %self.id, "already connected to channel");
            return true;
        }

        match self.engine.join(&self.config).await {
            Ok(()) => {
                self.connected.store(true, Ordering::SeqCst);
                let _ = self.events.send(SessionEvent::Connected);
                tracing::info!(session = %self.id, channel = %self.config.channel, "joined channel");
                true
            }
            Err(e) => {
                tracing::error!(session = %self.id, channel = %self.config.channel, error = %e, "failed to join channel");
                false
            }
        }
    }

    /// Forward the engine event stream into the event handlers
    ///
    /// The explicit registration step of the observer model: attach once
    /// when the session starts; [`ChannelSession::shutdown`] detaches.
    /// Idempotent while a pump is attached. Must run inside a tokio
    /// runtime.
    pub fn attach_event_pump(self: Arc<Self>) {
        let mut pump = self.pump.lock();
        if pump.is_some() {
            return;
        }
        let mut rx = self.engine.events();
        let this = Arc::clone(&self);
        *pump = Some(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => this.handle_engine_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "engine event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
    }

    /// Apply one engine presence event to the roster
    ///
    /// Public so tests can drive each event type directly, without the pump.
    pub async fn handle_engine_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::UserPublished { uid, kind } => self.on_user_published(uid, kind).await,
            EngineEvent::UserUnpublished { uid, kind } => self.on_user_unpublished(uid, kind).await,
            EngineEvent::UserLeft { uid } => self.on_user_left(uid).await,
        }
    }

    async fn on_user_published(&self, uid: ParticipantUid, kind: MediaKind) {
        let track = match self.engine.subscribe(uid, kind).await {
            Ok(track) => track,
            Err(e) => {
                tracing::error!(%uid, ?kind, error = %e, "failed to subscribe to remote track");
                return;
            }
        };

        match kind {
            MediaKind::Video => {
                {
                    let mut remotes = self.remotes.write().await;
                    let entry = remotes
                        .entry(uid)
                        .or_insert_with(|| RemoteParticipant::new(uid));
                    if entry.video_track.is_some() {
                        tracing::debug!(%uid, "video already tracked for participant");
                        return;
                    }
                    entry.video_track = Some(Arc::clone(&track));
                }
                let sink = SinkId::remote(uid);
                if let Err(e) = track.play(Some(&sink)).await {
                    tracing::error!(%uid, %sink, error = %e, "failed to render remote video");
                }
                let _ = self.events.send(SessionEvent::VideoPublished { uid });
                tracing::info!(%uid, "remote video added to roster");
            }
            MediaKind::Audio => {
                if let Err(e) = track.play(None).await {
                    tracing::error!(%uid, error = %e, "failed to play remote audio");
                }
                {
                    let mut remotes = self.remotes.write().await;
                    let entry = remotes
                        .entry(uid)
                        .or_insert_with(|| RemoteParticipant::new(uid));
                    entry.audio_track = Some(track);
                }
                let _ = self.events.send(SessionEvent::AudioPublished { uid });
                tracing::debug!(%uid, "remote audio playing");
            }
        }
    }

    async fn on_user_unpublished(&self, uid: ParticipantUid, kind: MediaKind) {
        let mut remotes = self.remotes.write().await;
        let Some(entry) = remotes.get_mut(&uid) else {
            tracing::debug!(%uid, ?kind, "unpublish for unknown participant");
            return;
        };

        let track = match kind {
            MediaKind::Video => entry.video_track.take(),
            MediaKind::Audio => entry.audio_track.take(),
        };
        if let Some(track) = track {
            if let Err(e) = track.stop().await {
                tracing::error!(%uid, ?kind, error = %e, "failed to stop remote track");
            }
        }
        if let Err(e) = self.engine.unsubscribe(uid, kind).await {
            tracing::error!(%uid, ?kind, error = %e, "failed to unsubscribe remote track");
        }
        if entry.video_track.is_none() && entry.audio_track.is_none() {
            remotes.remove(&uid);
        }
        drop(remotes);

        let event = match kind {
            MediaKind::Video => SessionEvent::VideoUnpublished { uid },
            MediaKind::Audio => SessionEvent::AudioUnpublished { uid },
        };
        let _ = self.events.send(event);
        tracing::debug!(%uid, ?kind, "remote track unpublished");
    }

    async fn on_user_left(&self, uid: ParticipantUid) {
        let entry = self.remotes.write().await.remove(&uid);
        let Some(entry) = entry else {
            tracing::debug!(%uid, "leave for unknown participant");
            return;
        };

        if let Some(track) = entry.video_track {
            if let Err(e) = track.stop().await {
                tracing::error!(%uid, error = %e, "failed to stop leaving participant's video");
            }
        }
        if let Some(track) = entry.audio_track {
            if let Err(e) = track.stop().await {
                tracing::error!(%uid, error = %e, "failed to stop leaving participant's audio");
            }
        }
        let _ = self.events.send(SessionEvent::ParticipantLeft { uid });
        tracing::info!(%uid, "participant left channel");
    }

    /// Participants currently publishing video, in join order
    ///
    /// Uids are unique; order only affects tile layout.
    pub async fn roster(&self) -> Vec<RemoteParticipant> {
        let remotes = self.remotes.read().await;
        let mut roster: Vec<RemoteParticipant> = remotes
            .values()
            .filter(|p| p.has_video())
            .cloned()
            .collect();
        roster.sort_by_key(|p| (p.joined_at, p.uid));
        roster
    }

    /// Look up a tracked participant, whether or not it publishes video
    pub async fn participant(&self, uid: ParticipantUid) -> Option<RemoteParticipant> {
        self.remotes.read().await.get(&uid).cloned()
    }

    /// Subscribe to roster and connection changes
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Stop all remote tracks, detach the event pump, and leave the channel
    ///
    /// In-flight engine calls are not awaited; references are simply
    /// released.
    #[tracing::instrument(skip(self), fields(session = %self.id))]
    pub async fn shutdown(&self) {
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }

        let drained: Vec<RemoteParticipant> =
            self.remotes.write().await.drain().map(|(_, p)| p).collect();
        for participant in drained {
            if let Some(track) = participant.video_track {
                let _ = track.stop().await;
            }
            if let Some(track) = participant.audio_track {
                let _ = track.stop().await;
            }
        }

        if self.connected.swap(false, Ordering::SeqCst) {
            if let Err(e) = self.engine.leave().await {
                tracing::error!(error = %e, "failed to leave channel");
            }
            let _ = self.events.send(SessionEvent::Disconnected);
        }
        tracing::info!("session torn down");
    }
}

impl Drop for ChannelSession {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
    }
}

impl std::fmt::Debug for ChannelSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSession")
            .field("id", &self.id)
            .field("channel", &self.config.channel)
            .field("connected", &self.is_connected())
            .finish()
    }
}
