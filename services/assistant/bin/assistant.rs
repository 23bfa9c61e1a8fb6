//! Main entrypoint for the Parley voice assistant.
//!
//! Wires configuration, the tool registry, the terminal UI, and the session
//! controller together, then drives everything from a line-oriented command
//! loop.

use anyhow::Context;
use parley_assistant::audio::{CpalAudioInput, CpalAudioOutput};
use parley_assistant::config::Config;
use parley_assistant::controller::AppController;
use parley_assistant::terminal::TerminalUi;
use parley_core::search::SearchTool;
use parley_core::tools::{FunctionDispatcher, ToolRegistry};
use parley_core::ui::UiSink;
use parley_core::weather::WeatherTool;
use parley_realtime::session::SessionDeps;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();

    let ui: Arc<dyn UiSink> = Arc::new(TerminalUi::new());
    let http = reqwest::Client::new();

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(WeatherTool::new(
        http.clone(),
        config.weather_url.clone(),
        Arc::clone(&ui),
    )));
    registry.register(Arc::new(SearchTool::new(
        http.clone(),
        config.search_url.clone(),
        Arc::clone(&ui),
    )));
    let tool_definitions = registry.definitions();
    let dispatcher: Arc<dyn FunctionDispatcher> = Arc::new(registry);

    let deps = SessionDeps {
        http,
        dispatcher,
        ui: Arc::clone(&ui),
        audio_in: Arc::new(CpalAudioInput),
        audio_out: Arc::new(CpalAudioOutput::new()),
    };
    let mut controller = AppController::new(config, deps, tool_definitions);

    ui.update_status("Ready to start");
    println!("Commands: start | stop | clear | voice <name> | quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => {}
            "start" => controller.start().await,
            "stop" => controller.stop().await,
            "clear" => controller.clear(),
            "quit" | "exit" => break,
            other => {
                if let Some(voice) = other.strip_prefix("voice ") {
                    controller.set_voice(voice.trim());
                } else {
                    println!("Unknown command: {other}");
                }
            }
        }
    }

    controller.stop().await;
    info!("Assistant shut down.");
    Ok(())
}
