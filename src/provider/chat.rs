//! OpenAI-compatible chat-completions client with tool-calling support.
//!
//! The wire types here cover exactly what the conversation loop needs:
//! role-tagged messages, a function-tool declaration, tool calls coming
//! back from the model, and the usage block. Assistant content arrives
//! either as a plain string or as an array of typed content blocks;
//! `MessageContent::to_text` normalizes both into a flat string.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use super::{
    ChatProvider, OPENAI_API_BASE, ProviderError, TokenUsage, api_key_from_env,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// Message types
// ============================================================================

/// One history entry sent to the provider.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Tool result addressed to one specific tool call.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool",
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Echo an assistant turn back into the history, flattening its
    /// content to plain text. Blank content is dropped, same rule as
    /// [`AssistantMessage::text`].
    pub fn from_assistant(message: &AssistantMessage) -> Self {
        let text = message.content.as_ref().map(MessageContent::to_text);
        Self {
            role: "assistant",
            content: text.filter(|t| !t.trim().is_empty()),
            tool_calls: if message.tool_calls.is_empty() {
                None
            } else {
                Some(message.tool_calls.clone())
            },
            tool_call_id: None,
        }
    }
}

/// Assistant content: a plain string or an array of typed blocks.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Plain(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

impl MessageContent {
    /// Flatten to a single string, concatenating text blocks.
    pub fn to_text(&self) -> String {
        match self {
            MessageContent::Plain(text) => text.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter(|b| b.kind == "text")
                .map(|b| b.text.as_str())
                .collect(),
        }
    }
}

/// Assistant message as returned by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Option<MessageContent>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantMessage {
    /// Normalized text content, None when empty or absent.
    pub fn text(&self) -> Option<String> {
        self.content
            .as_ref()
            .map(MessageContent::to_text)
            .filter(|t| !t.trim().is_empty())
    }
}

// ============================================================================
// Tool types
// ============================================================================

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object.
    pub arguments: String,
}

/// A function tool offered to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    pub function: FunctionSpec,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: serde_json::Value,
}

impl ToolSpec {
    pub fn function(name: &'static str, description: &'static str, parameters: serde_json::Value) -> Self {
        Self {
            tool_type: "function",
            function: FunctionSpec {
                name,
                description,
                parameters,
            },
        }
    }
}

/// Whether the model may call tools on this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    Auto,
    None,
}

// ============================================================================
// Request / response
// ============================================================================

/// Everything one model turn needs.
pub struct ChatTurn<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub tools: &'a [ToolSpec],
    pub tool_choice: ToolChoice,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Assistant message plus the usage the provider reported for the turn.
#[derive(Debug)]
pub struct ChatOutcome {
    pub message: AssistantMessage,
    pub usage: TokenUsage,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolSpec]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: TokenUsage,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

// ============================================================================
// Client
// ============================================================================

/// Async chat-completions client. The model is chosen per turn, so one
/// client serves requests that override the default model.
#[derive(Debug)]
pub struct ChatClient {
    client: Client,
    endpoint: String,
}

impl ChatClient {
    /// Create a client from the `OPENAI_API_KEY` env var.
    pub fn from_env() -> Result<Self, ProviderError> {
        let api_key = api_key_from_env()?;
        Self::new(&api_key, OPENAI_API_BASE)
    }

    pub fn new(api_key: &str, base_url: &str) -> Result<Self, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::MissingCredential);
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).map_err(|_| ProviderError::BadCredential)?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
        })
    }

    /// Run one model turn.
    pub async fn complete(&self, turn: ChatTurn<'_>) -> Result<ChatOutcome, ProviderError> {
        let request = ChatRequest {
            model: turn.model,
            messages: turn.messages,
            tools: if turn.tools.is_empty() {
                None
            } else {
                Some(turn.tools)
            },
            tool_choice: if turn.tools.is_empty() {
                None
            } else {
                Some(turn.tool_choice)
            },
            max_tokens: turn.max_tokens,
            temperature: turn.temperature,
        };

        let resp = self.client.post(&self.endpoint).json(&request).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_else(|_| "<body unavailable>".into());
            return Err(ProviderError::Api {
                operation: "chat completion",
                status,
                body,
            });
        }

        let parsed: ChatResponse = resp.json().await?;
        let usage = parsed.usage;
        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or(ProviderError::EmptyResponse("chat completion"))?;

        Ok(ChatOutcome { message, usage })
    }
}

impl ChatProvider for ChatClient {
    async fn chat(&self, turn: ChatTurn<'_>) -> Result<ChatOutcome, ProviderError> {
        self.complete(turn).await
    }
}
