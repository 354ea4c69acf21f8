//! OpenAI-compatible chat-completions client.
//!
//! Works against any endpoint that speaks the `/chat/completions` wire
//! format (Groq by default). Both operations ask for JSON-only replies.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use debai_core::config::LlmConfig;
use debai_core::types::Role;

use crate::completion::{CompletionService, Routing, RoutingRequest, ToolChoice};
use crate::error::CompletionError;
use crate::types::ToolDeclaration;

const ROUTING_PROMPT: &str = "You route chat messages for an office assistant. \
The assistant can call exactly one of the tools listed below, or answer directly.\n\
Reply with JSON only, no prose and no code fences:\n\
- to call a tool: {\"tool\": \"<tool name>\", \"confidence\": <0.0-1.0>}\n\
- to answer: {\"reply\": \"<your answer>\"}\n\
Never invent tools. Email bodies must not include a signature.\n\nTools:\n";

const EXTRACTION_PROMPT: &str = "Extract parameter values for the tool described below from the \
user's message. Reply with a single JSON object whose keys are parameter names. Use null for \
any value the message does not state; never invent values. Keep email bodies and document \
content exactly as written, without adding a signature.\n\nTool:\n";

/// Completion service backed by a chat-completions HTTP endpoint.
pub struct OpenAiCompatible {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl OpenAiCompatible {
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self, CompletionError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CompletionError::Unreachable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout,
        })
    }

    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, CompletionError> {
        let start = Instant::now();
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::Malformed(e.to_string()))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| CompletionError::Malformed("response has no choices".to_string()))?;

        debug!(
            model = %self.model,
            latency_ms = start.elapsed().as_millis() as u64,
            "Completion received"
        );
        Ok(content)
    }

    fn transport_error(&self, err: reqwest::Error) -> CompletionError {
        if err.is_timeout() {
            CompletionError::Timeout(self.timeout)
        } else {
            CompletionError::Unreachable(err.to_string())
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

impl ChatMessage {
    fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.into()),
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Shape of a routing reply.
#[derive(Debug, Deserialize)]
struct RoutingReply {
    tool: Option<String>,
    confidence: Option<f32>,
    reply: Option<String>,
}

/// Strip a surrounding markdown code fence, if any.
fn strip_fences(content: &str) -> &str {
    let trimmed = content.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    }
}

/// Interpret routing output. Plain prose (no JSON at all) is taken as a
/// conversational answer; broken or mis-shaped JSON is malformed.
fn parse_routing(content: &str) -> Result<Routing, CompletionError> {
    let body = strip_fences(content);
    if !body.starts_with('{') {
        if body.is_empty() {
            return Err(CompletionError::Malformed("empty routing reply".to_string()));
        }
        return Ok(Routing::Reply(body.to_string()));
    }

    let reply: RoutingReply =
        serde_json::from_str(body).map_err(|e| CompletionError::Malformed(e.to_string()))?;
    match reply {
        RoutingReply {
            tool: Some(name), confidence, ..
        } if !name.trim().is_empty() => Ok(Routing::Tool(ToolChoice {
            name: name.trim().to_string(),
            confidence: confidence.unwrap_or(1.0).clamp(0.0, 1.0),
        })),
        RoutingReply {
            reply: Some(text), ..
        } => Ok(Routing::Reply(text)),
        _ => Err(CompletionError::Malformed(format!(
            "routing reply has neither tool nor reply: {}",
            body
        ))),
    }
}

fn parse_extraction(content: &str) -> Result<Map<String, Value>, CompletionError> {
    match serde_json::from_str::<Value>(strip_fences(content)) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(CompletionError::Malformed(format!(
            "expected a JSON object, got {}",
            other
        ))),
        Err(e) => Err(CompletionError::Malformed(e.to_string())),
    }
}

#[async_trait]
impl CompletionService for OpenAiCompatible {
    fn name(&self) -> &str {
        "openai"
    }

    async fn select_tool(&self, request: &RoutingRequest<'_>) -> Result<Routing, CompletionError> {
        let menu = serde_json::to_string_pretty(request.menu)
            .map_err(|e| CompletionError::Malformed(e.to_string()))?;

        let mut messages = vec![ChatMessage::new("system", format!("{}{}", ROUTING_PROMPT, menu))];
        if let Some(summary) = request.summary {
            messages.push(ChatMessage::new(
                "system",
                format!("Summary of the earlier conversation: {}", summary),
            ));
        }
        for turn in request.context {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(ChatMessage::new(role, turn.text.clone()));
        }
        messages.push(ChatMessage::new("user", request.message));

        let content = self.complete(messages).await?;
        parse_routing(&content)
    }

    async fn extract(
        &self,
        text: &str,
        decl: &ToolDeclaration,
    ) -> Result<Map<String, Value>, CompletionError> {
        let schema = json!({
            "name": decl.name,
            "description": decl.description,
            "parameters": decl.params,
        });
        let messages = vec![
            ChatMessage::new("system", format!("{}{}", EXTRACTION_PROMPT, schema)),
            ChatMessage::new("user", text),
        ];
        let content = self.complete(messages).await?;
        parse_extraction(&content)
    }
}
