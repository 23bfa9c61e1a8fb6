//! Parley Realtime Transport
//!
//! Establishes and operates a realtime session with the speech model: WebRTC
//! peer connection with an outbound Opus audio track, remote audio playback,
//! and the `oai-events` data channel carrying the JSON event protocol.
//!
//! The transport owns the protocol and the connection lifecycle; audio devices
//! and UI rendering are supplied by the application through the seams in
//! [`audio`] and `parley_core::ui`.

pub mod audio;
pub mod codec;
pub mod error;
pub mod events;
pub mod session;
pub mod signaling;
