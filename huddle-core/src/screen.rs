//! Screen-capture share control
//!
//! Owns the screen track lifecycle: capture, publish, local preview, and the
//! re-entry path for captures ended from the browser-native control. Screen
//! capture never includes audio; camera exclusivity is enforced by the media
//! session, which swaps the camera out between capture acquisition and
//! publication.

use crate::engine::{LocalTrack, RtcEngine};
use crate::types::SinkId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Screen-share controller
///
/// All failures resolve to `None`/no-op results; nothing is surfaced to the
/// caller as a fault.
pub struct ScreenShare {
    engine: Arc<dyn RtcEngine>,
    track: RwLock<Option<Arc<dyn LocalTrack>>>,
    active: AtomicBool,
}

impl ScreenShare {
    /// Create an inactive controller over an engine handle
    #[must_use]
    pub fn new(engine: Arc<dyn RtcEngine>) -> Self {
        Self {
            engine,
            track: RwLock::new(None),
            active: AtomicBool::new(false),
        }
    }

    /// Whether a screen track is currently live
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// The current screen track, if sharing
    pub async fn current_track(&self) -> Option<Arc<dyn LocalTrack>> {
        self.track.read().await.clone()
    }

    /// Acquire a screen-capture track without publishing it
    ///
    /// This is where the user permission prompt happens, so callers can
    /// check capture availability before giving up the camera slot. A
    /// permission denial is logged at warning level, any other failure as
    /// an error; both yield `None`.
    pub(crate) async fn acquire(&self) -> Option<Arc<dyn LocalTrack>> {
        match self.engine.create_screen_track().await {
            Ok(track) => Some(track),
            Err(e) if e.is_permission_denied() => {
                tracing::warn!("screen sharing permission denied by user");
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to start screen capture");
                None
            }
        }
    }

    /// Publish an acquired capture, preview it, and arm the stop callback
    ///
    /// Registers the termination callback so the browser "Stop sharing"
    /// control drives [`ScreenShare::stop`]. Returns whether the track went
    /// live; on a publish failure the track is released again.
    pub(crate) async fn go_live(self: Arc<Self>, track: Arc<dyn LocalTrack>) -> bool {
        if let Err(e) = self.engine.publish(&[Arc::clone(&track)]).await {
            tracing::error!(error = %e, "failed to publish screen track");
            release_track(&track).await;
            return false;
        }

        if let Err(e) = track.play(&SinkId::local()).await {
            tracing::error!(error = %e, "failed to preview screen track locally");
        }

        // Browser-native "Stop sharing" lands on the same stop path as an
        // explicit toggle.
        let this = Arc::clone(&self);
        track.on_ended(Box::new(move || {
            let this = Arc::clone(&this);
            tokio::spawn(async move {
                tracing::info!("screen capture ended outside the app");
                this.stop().await;
            });
        }));

        *self.track.write().await = Some(track);
        self.active.store(true, Ordering::SeqCst);
        tracing::info!("screen sharing started");
        true
    }

    /// Start screen capture and publish it
    ///
    /// Capture acquisition followed by publish/preview/callback arming;
    /// every failure resolves to `None`.
    pub async fn start(self: Arc<Self>) -> Option<Arc<dyn LocalTrack>> {
        let track = self.acquire().await?;
        if self.go_live(Arc::clone(&track)).await {
            Some(track)
        } else {
            None
        }
    }

    /// Unpublish and release the screen track
    ///
    /// No-op when not sharing. State is cleared before the engine calls run,
    /// so a failure still leaves the controller inactive.
    #[tracing::instrument(skip(self))]
    pub async fn stop(&self) {
        let track = self.track.write().await.take();
        let Some(track) = track else { return };
        self.active.store(false, Ordering::SeqCst);

        if let Err(e) = self.engine.unpublish(&track).await {
            tracing::error!(error = %e, "failed to unpublish screen track");
        }
        release_track(&track).await;
        tracing::info!("screen sharing stopped");
    }
}

async fn release_track(track: &Arc<dyn LocalTrack>) {
    if let Err(e) = track.close().await {
        tracing::error!(error = %e, "failed to release screen track");
    }
}

impl std::fmt::Debug for ScreenShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenShare")
            .field("active", &self.is_active())
            .finish()
    }
}
