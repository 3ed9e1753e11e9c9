//! Gain clamping for local and remote tracks
//!
//! Local capture gain and remote playback gain use different engine ranges;
//! every requested value is clamped into the valid range before the single
//! engine call is made.

use crate::engine::{LocalTrack, RemoteTrack};
use std::sync::Arc;

/// Upper bound of the local capture gain range
pub const LOCAL_VOLUME_MAX: u32 = 1000;

/// Upper bound of the remote playback gain range
pub const REMOTE_VOLUME_MAX: u32 = 100;

/// Clamp a requested local gain into `[0, 1000]`
#[must_use]
pub fn clamp_local(volume: i32) -> u32 {
    volume.clamp(0, LOCAL_VOLUME_MAX as i32) as u32
}

/// Clamp a requested remote gain into `[0, 100]`
#[must_use]
pub fn clamp_remote(volume: i32) -> u32 {
    volume.clamp(0, REMOTE_VOLUME_MAX as i32) as u32
}

/// Apply a clamped gain to a local track
///
/// No-op when the track reference is absent; an engine failure is logged
/// and never propagated.
pub async fn adjust_local_volume(track: Option<&Arc<dyn LocalTrack>>, volume: i32) {
    let Some(track) = track else { return };
    let clamped = clamp_local(volume);
    if let Err(e) = track.set_volume(clamped).await {
        tracing::error!(volume = clamped, error = %e, "failed to set local track volume");
    }
}

/// Apply a clamped gain to a remote track
///
/// No-op when the track reference is absent; an engine failure is logged
/// and never propagated.
pub async fn adjust_remote_volume(track: Option<&Arc<dyn RemoteTrack>>, volume: i32) {
    let Some(track) = track else { return };
    let clamped = clamp_remote(volume);
    if let Err(e) = track.set_volume(clamped).await {
        tracing::error!(volume = clamped, error = %e, "failed to set remote track volume");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_clamp_range() {
        assert_eq!(clamp_local(-50), 0);
        assert_eq!(clamp_local(0), 0);
        assert_eq!(clamp_local(100), 100);
        assert_eq!(clamp_local(1000), 1000);
        assert_eq!(clamp_local(5000), 1000);
        assert_eq!(clamp_local(i32::MIN), 0);
        assert_eq!(clamp_local(i32::MAX), 1000);
    }

    #[test]
    fn test_remote_clamp_range() {
        assert_eq!(clamp_remote(-1), 0);
        assert_eq!(clamp_remote(42), 42);
        assert_eq!(clamp_remote(100), 100);
        assert_eq!(clamp_remote(101), 100);
    }

    #[tokio::test]
    async fn test_adjust_without_track_is_noop() {
        adjust_local_volume(None, 300).await;
        adjust_remote_volume(None, 30).await;
    }
}
