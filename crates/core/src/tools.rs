//! Function-call dispatch.
//!
//! The speech model requests work by name; [`ToolRegistry`] maps those names
//! onto [`ToolHandler`] implementations and is the only place a call can be
//! resolved. Unknown names are rejected here, before any network traffic.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// A function the model may invoke, declared to it at session-open time.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    /// A `type: "function"` definition with the given JSON-schema parameters.
    pub fn function(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            kind: "function",
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }
}

/// Errors raised while resolving or executing a function call.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The arguments string was not valid JSON for the tool.
    #[error("invalid arguments for {name}: {source}")]
    BadArguments {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    /// No handler is registered under the requested name.
    #[error("unsupported function: {0}")]
    UnsupportedFunction(String),
    /// The backend request failed or returned an undecodable payload.
    #[error("backend call for {name} failed: {message}")]
    Backend { name: String, message: String },
}

/// A named capability the model can call.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// The wire name the model uses to request this tool.
    fn name(&self) -> &str;
    /// The schema declared to the model in `session.update`.
    fn definition(&self) -> ToolDefinition;
    /// Runs the tool against already-parsed arguments and returns the trimmed
    /// payload to hand back to the model.
    async fn call(&self, arguments: Value) -> Result<Value, DispatchError>;
}

/// Resolves function calls by name. The session transport's dispatch seam.
#[async_trait]
pub trait FunctionDispatcher: Send + Sync {
    /// Parses `arguments_json` and runs the named tool.
    async fn dispatch(&self, name: &str, arguments_json: &str) -> Result<Value, DispatchError>;
}

/// An explicit mapping from function name to handler.
#[derive(Default)]
pub struct ToolRegistry {
    handlers: HashMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under its own name, replacing any previous one.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        self.handlers.insert(handler.name().to_string(), handler);
    }

    /// Definitions for every registered tool, in a stable order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut definitions: Vec<_> = self.handlers.values().map(|h| h.definition()).collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }
}

#[async_trait]
impl FunctionDispatcher for ToolRegistry {
    async fn dispatch(&self, name: &str, arguments_json: &str) -> Result<Value, DispatchError> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| DispatchError::UnsupportedFunction(name.to_string()))?;
        let arguments: Value =
            serde_json::from_str(arguments_json).map_err(|source| DispatchError::BadArguments {
                name: name.to_string(),
                source,
            })?;
        debug!(tool = name, "Dispatching function call");
        handler.call(arguments).await
    }
}
