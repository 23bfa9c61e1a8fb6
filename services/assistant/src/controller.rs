//! Wires user actions to the session lifecycle.

use crate::config::{Config, VOICES};
use parley_core::tools::ToolDefinition;
use parley_realtime::session::{RealtimeSession, SessionConfig, SessionDeps};
use tracing::{error, info};

/// Lifecycle of the controller's single session slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ControllerState {
    Disconnected,
    Connecting,
    Connected,
}

/// Owns the single active session and the cross-session settings.
///
/// At most one session exists at a time; `start` is rejected while a
/// connection attempt is in flight or a session is open.
pub struct AppController {
    config: Config,
    deps: SessionDeps,
    tools: Vec<ToolDefinition>,
    session: Option<RealtimeSession>,
    state: ControllerState,
}

impl AppController {
    pub fn new(config: Config, deps: SessionDeps, tools: Vec<ToolDefinition>) -> Self {
        Self {
            config,
            deps,
            tools,
            session: None,
            state: ControllerState::Disconnected,
        }
    }

    /// Opens a session with the current settings. Failures are surfaced and
    /// leave the controller disconnected.
    pub async fn start(&mut self) {
        if self.state != ControllerState::Disconnected {
            self.deps
                .ui
                .show_error("A session is already active or connecting");
            return;
        }
        self.state = ControllerState::Connecting;
        self.deps.ui.hide_error();
        self.deps.ui.update_status("Initializing...");

        let session_config = SessionConfig {
            session_url: self.config.session_url.clone(),
            realtime_url: self.config.realtime_url.clone(),
            model: self.config.model.clone(),
            voice: self.config.voice.clone(),
            tools: self.tools.clone(),
            greeting: self.config.greeting.clone(),
        };
        match RealtimeSession::open(session_config, self.deps.clone()).await {
            Ok(session) => {
                self.session = Some(session);
                self.state = ControllerState::Connected;
                info!(voice = %self.config.voice, "Session established");
                self.deps.ui.update_status("Connected");
            }
            Err(e) => {
                self.state = ControllerState::Disconnected;
                error!(error = %e, "Session initialization failed");
                self.deps
                    .ui
                    .show_error(&format!("Error initializing session: {e}"));
                self.deps.ui.update_status("Failed to connect");
            }
        }
    }

    /// Tears down the active session, if any. Safe to call repeatedly.
    pub async fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
            info!("Session closed");
        }
        self.state = ControllerState::Disconnected;
        self.deps.ui.update_status("Ready to start");
    }

    /// Resets the display surfaces; the session, if any, is untouched.
    pub fn clear(&self) {
        self.deps.ui.clear();
    }

    /// Selects the voice for the next session. Rejected while a session is
    /// active or connecting, and for names the endpoint does not know.
    pub fn set_voice(&mut self, voice: &str) {
        if self.state != ControllerState::Disconnected {
            self.deps
                .ui
                .show_error("Voice can only be changed while disconnected");
            return;
        }
        if !VOICES.contains(&voice) {
            self.deps.ui.show_error(&format!(
                "Unknown voice '{voice}'; known voices: {}",
                VOICES.join(", ")
            ));
            return;
        }
        self.config.voice = voice.to_string();
        self.deps.ui.update_status(&format!("Voice set to {voice}"));
    }

    pub fn is_connected(&self) -> bool {
        self.state == ControllerState::Connected
    }
}
