//! Web search against the search backend.

use crate::tools::{DispatchError, ToolDefinition, ToolHandler};
use crate::ui::{ImagePanel, TranscriptRole, UiSink};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub const SEARCH_TOOL_NAME: &str = "search_web";

#[derive(Deserialize, Debug)]
struct SearchArgs {
    query: String,
}

#[derive(Deserialize, Debug)]
struct SearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    image_source: Option<String>,
}

/// Runs a web search, renders the top result (and its image, when present),
/// and returns a trimmed payload for the model.
pub struct SearchTool {
    http: reqwest::Client,
    endpoint: String,
    ui: Arc<dyn UiSink>,
}

impl SearchTool {
    /// `endpoint` is the search base URL; the query is appended as an escaped
    /// path segment.
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>, ui: Arc<dyn UiSink>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            ui,
        }
    }

    fn backend_error(&self, message: String) -> DispatchError {
        DispatchError::Backend {
            name: SEARCH_TOOL_NAME.to_string(),
            message,
        }
    }
}

#[async_trait]
impl ToolHandler for SearchTool {
    fn name(&self) -> &str {
        SEARCH_TOOL_NAME
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            SEARCH_TOOL_NAME,
            "Search the web for current information on any topic.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query"
                    }
                },
                "required": ["query"]
            }),
        )
    }

    async fn call(&self, arguments: Value) -> Result<Value, DispatchError> {
        let args: SearchArgs =
            serde_json::from_value(arguments).map_err(|source| DispatchError::BadArguments {
                name: SEARCH_TOOL_NAME.to_string(),
                source,
            })?;
        info!(query = %args.query, "Running web search");

        let url = format!(
            "{}/{}",
            self.endpoint.trim_end_matches('/'),
            urlencoding::encode(&args.query)
        );
        let result: SearchResult = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| self.backend_error(e.to_string()))?
            .error_for_status()
            .map_err(|e| self.backend_error(e.to_string()))?
            .json()
            .await
            .map_err(|e| self.backend_error(format!("invalid search payload: {e}")))?;

        let mut text = format!("Search results:\n{}\n{}", result.title, result.snippet);
        if let Some(source) = &result.source {
            text.push_str(&format!("\nSource: {source}"));
        }
        self.ui.push_transcript(TranscriptRole::ToolResult, &text);

        if let Some(image_url) = &result.image_url {
            self.ui.show_image(ImagePanel {
                url: image_url.clone(),
                source: result.image_source.clone(),
                caption: args.query.clone(),
            });
        }

        Ok(json!({
            "title": result.title,
            "snippet": result.snippet,
            "source": result.source,
            "image_url": result.image_url,
            "image_source": result.image_source,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::MockUiSink;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn renders_result_and_image_panel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search/rust%20language"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "title": "Rust",
                "snippet": "A systems programming language.",
                "source": "https://example.org/rust",
                "image_url": "https://example.org/rust.png",
                "image_source": "example.org"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut ui = MockUiSink::new();
        ui.expect_push_transcript()
            .times(1)
            .withf(|role, text| {
                *role == TranscriptRole::ToolResult && text.contains("Rust")
            })
            .return_const(());
        ui.expect_show_image()
            .times(1)
            .withf(|image| image.url == "https://example.org/rust.png" && image.caption == "rust language")
            .return_const(());

        let tool = SearchTool::new(
            reqwest::Client::new(),
            format!("{}/search", server.uri()),
            Arc::new(ui),
        );
        let result = tool.call(json!({ "query": "rust language" })).await.unwrap();
        assert_eq!(result["title"], "Rust");
        assert_eq!(result["image_source"], "example.org");
    }

    #[tokio::test]
    async fn missing_image_skips_the_panel() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "title": "Plain",
                "snippet": "No image here."
            })))
            .mount(&server)
            .await;

        let mut ui = MockUiSink::new();
        ui.expect_push_transcript().times(1).return_const(());
        ui.expect_show_image().times(0);

        let tool = SearchTool::new(
            reqwest::Client::new(),
            format!("{}/search", server.uri()),
            Arc::new(ui),
        );
        let result = tool.call(json!({ "query": "plain" })).await.unwrap();
        assert_eq!(result["image_url"], Value::Null);
    }

    #[tokio::test]
    async fn backend_failure_becomes_a_dispatch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let tool = SearchTool::new(
            reqwest::Client::new(),
            format!("{}/search", server.uri()),
            Arc::new(MockUiSink::new()),
        );
        let err = tool.call(json!({ "query": "anything" })).await.unwrap_err();
        assert!(matches!(err, DispatchError::Backend { name, .. } if name == SEARCH_TOOL_NAME));
    }
}
