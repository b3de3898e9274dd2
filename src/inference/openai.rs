use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::util::truncate_chars;

use super::{
    InferenceError, LabelInference, SECTION_CLASSIFICATION_PROMPT, TABLE_OF_CONTENTS_PROMPT,
    TocInference,
};

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
    pub max_input_chars: usize,
}

/// Blocking client for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, InferenceError> {
        if config.api_key.trim().is_empty() {
            return Err(InferenceError::Misconfigured(
                "API key is empty; set OPENAI_API_KEY or pass --api-key".to_string(),
            ));
        }
        if config.model.trim().is_empty() {
            return Err(InferenceError::Misconfigured(
                "model name is empty".to_string(),
            ));
        }
        Ok(Self { config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn user_prompt(&self, prompt: &str, text: &str) -> String {
        format!(
            "{}{}",
            prompt,
            truncate_chars(text, self.config.max_input_chars)
        )
    }

    fn complete(&self, request: &ChatRequest<'_>) -> Result<String, InferenceError> {
        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );

        let response = ureq::post(&url)
            .set("Authorization", &format!("Bearer {}", self.config.api_key))
            .set("content-type", "application/json")
            .timeout(self.config.timeout)
            .send_json(request)
            .map_err(map_transport_error)?;

        let body: ChatResponse = response
            .into_json()
            .map_err(|error| InferenceError::InvalidResponse(error.to_string()))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                InferenceError::InvalidResponse("response contained no message content".to_string())
            })?;

        debug!(model = %self.config.model, chars = content.len(), "received completion");
        Ok(content)
    }
}

impl TocInference for OpenAiClient {
    fn infer_toc(&self, document_text: &str) -> Result<String, InferenceError> {
        let request = ChatRequest {
            model: &self.config.model,
            temperature: 0.0,
            messages: vec![ChatMessage {
                role: "user",
                content: self.user_prompt(TABLE_OF_CONTENTS_PROMPT, document_text),
            }],
            max_tokens: None,
            response_format: Some(ResponseFormat {
                kind: "json_object",
            }),
        };
        self.complete(&request)
    }
}

impl LabelInference for OpenAiClient {
    fn infer_label(&self, section_text: &str) -> Result<String, InferenceError> {
        let request = ChatRequest {
            model: &self.config.model,
            temperature: 0.0,
            messages: vec![ChatMessage {
                role: "user",
                content: self.user_prompt(SECTION_CLASSIFICATION_PROMPT, section_text),
            }],
            max_tokens: Some(2),
            response_format: None,
        };
        self.complete(&request)
    }
}

fn map_transport_error(error: ureq::Error) -> InferenceError {
    match error {
        ureq::Error::Status(code, response) => {
            let body = response.into_string().unwrap_or_default();
            classify_status(code, &body)
        }
        ureq::Error::Transport(transport) => InferenceError::Unavailable(transport.to_string()),
    }
}

pub(super) fn classify_status(code: u16, body: &str) -> InferenceError {
    let detail = format!("HTTP {}: {}", code, body.trim());
    match code {
        429 => InferenceError::RateLimited(detail),
        401 | 403 => InferenceError::Unauthorized(detail),
        408 | 500..=599 => InferenceError::Unavailable(detail),
        _ => InferenceError::Misconfigured(detail),
    }
}
