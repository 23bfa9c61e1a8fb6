//! Seams for local audio capture and remote playback.
//!
//! The transport owns the WebRTC tracks; the application supplies the
//! device-facing halves through these traits so the session stays testable
//! off-device.

use crate::error::TransportError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::oneshot;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Local microphone capture attached to the outbound audio track.
#[async_trait]
pub trait AudioInput: Send + Sync {
    /// Starts capturing and writing Opus samples to `track` until the returned
    /// handle is stopped or dropped.
    async fn start(
        &self,
        track: Arc<TrackLocalStaticSample>,
    ) -> Result<CaptureHandle, TransportError>;
}

/// Remote audio playback fed with decoded PCM. Must not block.
pub trait AudioOutput: Send + Sync {
    fn play(&self, pcm: &[i16], sample_rate: u32);
}

/// Stops a running capture when stopped or dropped.
pub struct CaptureHandle {
    stop: Option<oneshot::Sender<()>>,
}

impl CaptureHandle {
    pub fn new(stop: oneshot::Sender<()>) -> Self {
        Self { stop: Some(stop) }
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
