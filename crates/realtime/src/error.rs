//! Transport-level error taxonomy.

/// Errors raised while opening or operating a realtime session.
///
/// Each variant is fatal only to the operation that raised it; callers surface
/// the message and stay in (or return to) a disconnected state.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The short-lived credential could not be obtained.
    #[error("credential fetch failed: {0}")]
    Credential(String),
    /// Local audio capture could not be started.
    #[error("audio capture failed: {0}")]
    AudioCapture(String),
    /// The SDP offer/answer exchange was rejected or malformed.
    #[error("session negotiation failed: {0}")]
    Negotiation(String),
    /// The event channel did not reach the open state in time.
    #[error("timed out waiting for the event channel to open")]
    ConnectTimeout,
    /// The underlying peer connection failed.
    #[error("peer connection error: {0}")]
    PeerConnection(String),
    /// The event channel failed while sending.
    #[error("event channel error: {0}")]
    Channel(String),
}

impl From<webrtc::Error> for TransportError {
    fn from(e: webrtc::Error) -> Self {
        Self::PeerConnection(e.to_string())
    }
}
