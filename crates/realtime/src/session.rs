//! Realtime session transport.
//!
//! Owns the peer connection, the outbound audio track, and the `oai-events`
//! data channel. Outgoing control messages are serialized from
//! [`ClientEvent`]; inbound traffic is routed to the function dispatcher and
//! the UI. One session, one connection; the application holds at most one
//! live [`RealtimeSession`] at a time.

use crate::audio::{AudioInput, AudioOutput, CaptureHandle};
use crate::codec::{OpusDecoder, SAMPLE_RATE};
use crate::error::TransportError;
use crate::events::{ClientEvent, CompletedResponse, ServerEvent};
use crate::signaling;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use parley_core::tools::{FunctionDispatcher, ToolDefinition};
use parley_core::ui::{TranscriptRole, UiSink};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{APIBuilder, API};
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

const EVENTS_CHANNEL_LABEL: &str = "oai-events";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Closed,
}

/// Everything needed to open a session. Immutable once the session is up.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub session_url: String,
    pub realtime_url: String,
    pub model: String,
    pub voice: String,
    pub tools: Vec<ToolDefinition>,
    pub greeting: String,
}

/// Collaborators supplied by the application.
#[derive(Clone)]
pub struct SessionDeps {
    pub http: reqwest::Client,
    pub dispatcher: Arc<dyn FunctionDispatcher>,
    pub ui: Arc<dyn UiSink>,
    pub audio_in: Arc<dyn AudioInput>,
    pub audio_out: Arc<dyn AudioOutput>,
}

/// Outbound half of the event channel.
///
/// Sends while the channel is not open are silently dropped; there is no
/// queueing and no retry.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, event: &ClientEvent) -> Result<(), TransportError>;
}

struct DataChannelSink {
    channel: Arc<RTCDataChannel>,
    state: Arc<RwLock<SessionState>>,
}

#[async_trait]
impl EventSink for DataChannelSink {
    async fn send(&self, event: &ClientEvent) -> Result<(), TransportError> {
        if *self.state.read() != SessionState::Open
            || self.channel.ready_state() != RTCDataChannelState::Open
        {
            debug!(?event, "Dropping event, channel not open");
            return Ok(());
        }
        let payload =
            serde_json::to_string(event).map_err(|e| TransportError::Channel(e.to_string()))?;
        self.channel
            .send_text(payload)
            .await
            .map_err(|e| TransportError::Channel(e.to_string()))?;
        Ok(())
    }
}

/// An active realtime session.
pub struct RealtimeSession {
    pc: Arc<RTCPeerConnection>,
    channel: Arc<RTCDataChannel>,
    state: Arc<RwLock<SessionState>>,
    capture: Mutex<Option<CaptureHandle>>,
    sink: Arc<DataChannelSink>,
}

impl RealtimeSession {
    /// Opens a session: credential fetch, media and channel setup, SDP
    /// exchange, then the two on-open sends (session configuration followed by
    /// the greeting). Returns only once the event channel is open or the
    /// connect timeout fires.
    pub async fn open(
        config: SessionConfig,
        deps: SessionDeps,
    ) -> Result<Self, TransportError> {
        let state = Arc::new(RwLock::new(SessionState::Connecting));

        let secret =
            signaling::fetch_client_secret(&deps.http, &config.session_url, &config.voice).await?;

        let api = build_api()?;
        let pc = Arc::new(api.new_peer_connection(RTCConfiguration::default()).await?);

        // Local microphone feeds the outbound Opus track.
        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: "audio/opus".to_string(),
                clock_rate: SAMPLE_RATE,
                channels: 1,
                ..Default::default()
            },
            "audio".to_string(),
            "parley".to_string(),
        ));
        pc.add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await?;
        let capture = deps.audio_in.start(track).await?;

        // Remote audio is decoded and handed to the playback seam.
        {
            let audio_out = Arc::clone(&deps.audio_out);
            pc.on_track(Box::new(move |track: Arc<TrackRemote>, _, _| {
                let audio_out = Arc::clone(&audio_out);
                Box::pin(async move {
                    pump_remote_audio(track, audio_out).await;
                })
            }));
        }

        // A remote disconnect closes the session.
        {
            let state = Arc::clone(&state);
            let ui = Arc::clone(&deps.ui);
            pc.on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
                if matches!(
                    s,
                    RTCPeerConnectionState::Disconnected
                        | RTCPeerConnectionState::Failed
                        | RTCPeerConnectionState::Closed
                ) {
                    let was = {
                        let mut guard = state.write();
                        let was = *guard;
                        *guard = SessionState::Closed;
                        was
                    };
                    if was == SessionState::Open {
                        warn!(state = ?s, "Peer connection lost");
                        ui.update_status("Disconnected");
                    }
                }
                Box::pin(async {})
            }));
        }

        let channel = pc.create_data_channel(EVENTS_CHANNEL_LABEL, None).await?;
        let sink = Arc::new(DataChannelSink {
            channel: Arc::clone(&channel),
            state: Arc::clone(&state),
        });

        // First sends happen on channel open: session configuration, then the
        // greeting. In-order channel delivery keeps them sequenced.
        let (open_tx, open_rx) = oneshot::channel();
        {
            let state = Arc::clone(&state);
            let sink = Arc::clone(&sink);
            let tools = config.tools.clone();
            let voice = config.voice.clone();
            let greeting = config.greeting.clone();
            channel.on_open(Box::new(move || {
                Box::pin(async move {
                    *state.write() = SessionState::Open;
                    info!("Event channel open");
                    let update = ClientEvent::session_update(tools, &voice);
                    if let Err(e) = sink.send(&update).await {
                        warn!(error = %e, "Failed to send session update");
                    }
                    if let Err(e) = sink.send(&ClientEvent::user_text(&greeting)).await {
                        warn!(error = %e, "Failed to send greeting");
                    }
                    let _ = open_tx.send(());
                })
            }));
        }

        {
            let sink = Arc::clone(&sink);
            let dispatcher = Arc::clone(&deps.dispatcher);
            let ui = Arc::clone(&deps.ui);
            channel.on_message(Box::new(move |msg: DataChannelMessage| {
                let sink = Arc::clone(&sink);
                let dispatcher = Arc::clone(&dispatcher);
                let ui = Arc::clone(&ui);
                Box::pin(async move {
                    handle_channel_message(
                        &msg.data[..],
                        sink.as_ref(),
                        dispatcher.as_ref(),
                        ui.as_ref(),
                    )
                    .await;
                })
            }));
        }

        let session = Self {
            pc,
            channel,
            state,
            capture: Mutex::new(Some(capture)),
            sink,
        };

        if let Err(e) = session.negotiate(&config, &deps, &secret).await {
            session.close().await;
            return Err(e);
        }

        match tokio::time::timeout(CONNECT_TIMEOUT, open_rx).await {
            Ok(Ok(())) => {
                info!(model = %config.model, voice = %config.voice, "Session established");
                Ok(session)
            }
            Ok(Err(_)) | Err(_) => {
                session.close().await;
                Err(TransportError::ConnectTimeout)
            }
        }
    }

    async fn negotiate(
        &self,
        config: &SessionConfig,
        deps: &SessionDeps,
        secret: &str,
    ) -> Result<(), TransportError> {
        let offer = self.pc.create_offer(None).await?;
        let offer_sdp = offer.sdp.clone();
        self.pc.set_local_description(offer).await?;
        let answer_sdp = signaling::exchange_sdp(
            &deps.http,
            &config.realtime_url,
            &config.model,
            secret,
            &offer_sdp,
        )
        .await?;
        let answer = RTCSessionDescription::answer(answer_sdp)
            .map_err(|e| TransportError::Negotiation(e.to_string()))?;
        self.pc
            .set_remote_description(answer)
            .await
            .map_err(|e| TransportError::Negotiation(e.to_string()))?;
        Ok(())
    }

    /// Sends a client event. A silent no-op while the channel is not open.
    pub async fn send(&self, event: &ClientEvent) -> Result<(), TransportError> {
        self.sink.send(event).await
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Tears the session down: stops capture, closes the channel and the peer
    /// connection. Idempotent; safe on an already-closed session.
    pub async fn close(&self) {
        {
            let mut state = self.state.write();
            if *state == SessionState::Closed {
                debug!("Session already closed");
            }
            *state = SessionState::Closed;
        }
        if let Some(mut capture) = self.capture.lock().take() {
            capture.stop();
        }
        if let Err(e) = self.channel.close().await {
            debug!(error = %e, "Data channel close");
        }
        if let Err(e) = self.pc.close().await {
            debug!(error = %e, "Peer connection close");
        }
    }
}

fn build_api() -> Result<API, TransportError> {
    let mut media_engine = MediaEngine::default();
    media_engine.register_default_codecs()?;
    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media_engine)
        .map_err(|e| TransportError::PeerConnection(e.to_string()))?;
    Ok(APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build())
}

/// Reads RTP from the remote track, decodes Opus, and feeds the playback seam.
async fn pump_remote_audio(track: Arc<TrackRemote>, out: Arc<dyn AudioOutput>) {
    let decoder = match OpusDecoder::new() {
        Ok(d) => d,
        Err(e) => {
            warn!(error = %e, "Opus decoder unavailable, remote audio muted");
            return;
        }
    };
    loop {
        match track.read_rtp().await {
            Ok((packet, _)) => {
                if packet.payload.is_empty() {
                    continue;
                }
                match decoder.decode(&packet.payload[..]) {
                    Ok(pcm) => out.play(&pcm, SAMPLE_RATE),
                    Err(e) => debug!(error = %e, "Opus decode error"),
                }
            }
            Err(e) => {
                debug!(error = %e, "Remote track ended");
                break;
            }
        }
    }
}

/// Parses one raw channel payload and acts on `response.done` events only.
/// Malformed payloads are surfaced and swallowed; the session stays up.
async fn handle_channel_message(
    raw: &[u8],
    sink: &dyn EventSink,
    dispatcher: &dyn FunctionDispatcher,
    ui: &dyn UiSink,
) {
    let event = match serde_json::from_slice::<ServerEvent>(raw) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Malformed event payload");
            ui.show_error(&format!("Error processing message: {e}"));
            return;
        }
    };
    match event {
        ServerEvent::ResponseDone { response } => {
            handle_completed_response(response, sink, dispatcher, ui).await;
        }
        ServerEvent::Other => {}
    }
}

/// Routes one completed response: transcript to the UI, function call through
/// the dispatcher, and the paired output plus continuation back over the
/// channel. A failed dispatch sends nothing; the turn stalls and the failure
/// is surfaced.
async fn handle_completed_response(
    response: CompletedResponse,
    sink: &dyn EventSink,
    dispatcher: &dyn FunctionDispatcher,
    ui: &dyn UiSink,
) {
    if let Some(text) = response.transcript() {
        ui.push_transcript(TranscriptRole::Assistant, text);
    }
    let Some(call) = response.function_call() else {
        return;
    };
    info!(name = %call.name, call_id = %call.call_id, "Function call requested");
    match dispatcher.dispatch(&call.name, &call.arguments).await {
        Ok(output) => {
            if let Err(e) = sink
                .send(&ClientEvent::function_output(&call.call_id, &output))
                .await
            {
                warn!(error = %e, "Failed to send function output");
                return;
            }
            if let Err(e) = sink.send(&ClientEvent::ResponseCreate).await {
                warn!(error = %e, "Failed to request continuation");
            }
        }
        Err(e) => {
            warn!(name = %call.name, error = %e, "Function dispatch failed");
            ui.show_error(&format!("Error in function {}: {e}", call.name));
        }
    }
}
