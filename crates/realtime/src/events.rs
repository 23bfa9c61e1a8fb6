//! JSON event protocol carried over the `oai-events` data channel.
//!
//! Outbound events are built through the constructors on [`ClientEvent`] so
//! the wire shapes live in one place. Inbound traffic is wide: every kind we
//! do not act on deserializes to [`ServerEvent::Other`] and is dropped.

use parley_core::tools::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Messages sent from the client to the realtime endpoint.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Declares the tool set, tool-choice policy, and voice for the session.
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionUpdate },
    /// Appends an item (user text or function output) to the conversation.
    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate {
        #[serde(skip_serializing_if = "Option::is_none")]
        previous_item_id: Option<String>,
        item: ConversationItem,
    },
    /// Asks the model to produce the next response.
    #[serde(rename = "response.create")]
    ResponseCreate,
}

impl ClientEvent {
    pub fn session_update(tools: Vec<ToolDefinition>, voice: &str) -> Self {
        Self::SessionUpdate {
            session: SessionUpdate {
                tools,
                tool_choice: "auto".to_string(),
                voice: voice.to_string(),
            },
        }
    }

    /// A user-role text message with a timestamp-derived item id.
    pub fn user_text(text: &str) -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        Self::ConversationItemCreate {
            previous_item_id: None,
            item: ConversationItem::Message {
                id: format!("msg_{millis}"),
                role: "user".to_string(),
                content: vec![ContentPart::InputText {
                    text: text.to_string(),
                }],
            },
        }
    }

    /// The output of a completed function call, paired to its `call_id`.
    /// The payload is JSON-serialized into the `output` string field.
    pub fn function_output(call_id: &str, output: &Value) -> Self {
        Self::ConversationItemCreate {
            previous_item_id: None,
            item: ConversationItem::FunctionCallOutput {
                call_id: call_id.to_string(),
                output: output.to_string(),
            },
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct SessionUpdate {
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: String,
    pub voice: String,
}

/// Conversation items the client can create.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ConversationItem {
    #[serde(rename = "message")]
    Message {
        id: String,
        role: String,
        content: Vec<ContentPart>,
    },
    #[serde(rename = "function_call_output")]
    FunctionCallOutput { call_id: String, output: String },
}

#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "input_text")]
    InputText { text: String },
}

/// Messages received from the realtime endpoint. Only `response.done` is acted
/// upon.
#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "response.done")]
    ResponseDone { response: CompletedResponse },
    #[serde(other)]
    Other,
}

/// The payload of a `response.done` event.
#[derive(Deserialize, Debug, Default)]
pub struct CompletedResponse {
    #[serde(default)]
    pub output: Vec<OutputItem>,
}

/// A single output item of a completed response.
#[derive(Deserialize, Debug, Default)]
pub struct OutputItem {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
    #[serde(default)]
    pub content: Vec<ContentItem>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ContentItem {
    #[serde(default)]
    pub transcript: Option<String>,
}

/// A function call extracted from a completed response.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub call_id: String,
    pub name: String,
    pub arguments: String,
}

impl CompletedResponse {
    /// The first transcript fragment, if the leading output item carries one.
    pub fn transcript(&self) -> Option<&str> {
        self.output.first()?.content.first()?.transcript.as_deref()
    }

    /// The function call requested by the leading output item, if complete.
    /// Missing arguments default to an empty object.
    pub fn function_call(&self) -> Option<FunctionCall> {
        let item = self.output.first()?;
        if item.kind != "function_call" {
            return None;
        }
        Some(FunctionCall {
            call_id: item.call_id.clone()?,
            name: item.name.clone()?,
            arguments: item.arguments.clone().unwrap_or_else(|| "{}".to_string()),
        })
    }
}
