//! External generative-model client.
//!
//! The HTTP variant talks to a Gemini-style `generateContent` endpoint.
//! Failures are classified so the web layer can map each kind to a distinct
//! user-facing message.

use async_trait::async_trait;
use samtale_common::models::chat::{ChatRole, HistoryEntry};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Fixed system instruction prepended to every request. Keeps follow-up
/// questions ("why?", "and that one?") anchored to the model's own
/// immediately preceding answer.
const SYSTEM_INSTRUCTION: &str = "You are a helpful assistant. When the user asks a follow-up \
question or uses pronouns like 'it', 'that' or 'this', resolve them against your own immediately \
preceding answer in this conversation. Answer concisely in plain language.";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model did not answer within the deadline")]
    Timeout,
    #[error("answer was blocked by the model's content filter: {0}")]
    Blocked(String),
    #[error("model returned no usable text")]
    Empty,
    #[error("model call failed: {0}")]
    Upstream(#[from] anyhow::Error),
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Produce an answer to `prompt` given prior conversation turns.
    async fn generate(&self, history: &[HistoryEntry], prompt: &str) -> Result<String, LlmError>;
}

// ─── Wire format ────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: SystemInstruction,
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<CandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

/// Shape history for the wire: blank entries are dropped and consecutive
/// same-role entries collapse to the latest, because the API expects
/// strictly alternating roles. The new prompt goes last as a user turn and
/// participates in the same collapsing.
pub fn build_contents(history: &[HistoryEntry], prompt: &str) -> Vec<Content> {
    let mut contents: Vec<Content> = Vec::new();

    let mut push = |role: &str, text: &str| {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        match contents.last_mut() {
            Some(last) if last.role == role => {
                // Collapse to the latest entry of this role
                last.parts = vec![Part {
                    text: text.to_string(),
                }];
            }
            _ => contents.push(Content {
                role: role.to_string(),
                parts: vec![Part {
                    text: text.to_string(),
                }],
            }),
        }
    };

    for entry in history {
        let role = match entry.role {
            ChatRole::User => "user",
            ChatRole::Bot => "model",
        };
        push(role, &entry.content);
    }
    push("user", prompt);

    contents
}

/// Classify a decoded response into an answer or a typed failure.
pub fn extract_text(response: GenerateResponse) -> Result<String, LlmError> {
    if let Some(feedback) = &response.prompt_feedback {
        if let Some(reason) = &feedback.block_reason {
            return Err(LlmError::Blocked(reason.clone()));
        }
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(LlmError::Empty);
    };

    if candidate.finish_reason.as_deref() == Some("SAFETY") {
        return Err(LlmError::Blocked("SAFETY".to_string()));
    }

    let text = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(LlmError::Empty);
    }
    Ok(text)
}

// ─── HTTP client ────────────────────────────────────────────────────────

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// HTTP client for the generateContent API.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &crate::config::LlmConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let base = config
            .endpoint
            .as_deref()
            .unwrap_or(DEFAULT_ENDPOINT)
            .trim_end_matches('/');
        let url = format!("{}/models/{}:generateContent", base, config.model);
        Ok(Self {
            client,
            url,
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    #[tracing::instrument(skip(self, history, prompt))]
    async fn generate(&self, history: &[HistoryEntry], prompt: &str) -> Result<String, LlmError> {
        let request = GenerateRequest {
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: SYSTEM_INSTRUCTION.to_string(),
                }],
            },
            contents: build_contents(history, prompt),
        };

        let response = self
            .client
            .post(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Upstream(anyhow::anyhow!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Model call returned {}: {}", status, body);
            return Err(LlmError::Upstream(anyhow::anyhow!(
                "model endpoint returned {}",
                status
            )));
        }

        let decoded: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Upstream(anyhow::anyhow!("undecodable response: {}", e)))?;

        extract_text(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(role: ChatRole, content: &str) -> HistoryEntry {
        HistoryEntry {
            role,
            content: content.to_string(),
        }
    }

    fn roles_and_texts(contents: &[Content]) -> Vec<(String, String)> {
        contents
            .iter()
            .map(|c| (c.role.clone(), c.parts[0].text.clone()))
            .collect()
    }

    #[test]
    fn test_build_contents_simple_alternation() {
        let history = vec![
            entry(ChatRole::User, "hi"),
            entry(ChatRole::Bot, "hello"),
        ];
        let contents = build_contents(&history, "how are you?");
        assert_eq!(
            roles_and_texts(&contents),
            vec![
                ("user".into(), "hi".into()),
                ("model".into(), "hello".into()),
                ("user".into(), "how are you?".into()),
            ]
        );
    }

    #[test]
    fn test_build_contents_drops_blank_entries() {
        let history = vec![
            entry(ChatRole::User, "hi"),
            entry(ChatRole::Bot, "   "),
            entry(ChatRole::Bot, "hello"),
        ];
        let contents = build_contents(&history, "next");
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1].parts[0].text, "hello");
    }

    #[test]
    fn test_build_contents_collapses_consecutive_same_role() {
        let history = vec![
            entry(ChatRole::User, "first"),
            entry(ChatRole::User, "second"),
            entry(ChatRole::Bot, "answer"),
        ];
        let contents = build_contents(&history, "prompt");
        assert_eq!(
            roles_and_texts(&contents),
            vec![
                ("user".into(), "second".into()),
                ("model".into(), "answer".into()),
                ("user".into(), "prompt".into()),
            ]
        );
    }

    #[test]
    fn test_build_contents_prompt_collapses_trailing_user_turn() {
        let history = vec![entry(ChatRole::User, "dangling")];
        let contents = build_contents(&history, "the real prompt");
        assert_eq!(
            roles_and_texts(&contents),
            vec![("user".into(), "the real prompt".into())]
        );
    }

    #[test]
    fn test_build_contents_empty_history() {
        let contents = build_contents(&[], "hello");
        assert_eq!(
            roles_and_texts(&contents),
            vec![("user".into(), "hello".into())]
        );
    }

    fn response_from(json: serde_json::Value) -> GenerateResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_extract_text_success() {
        let resp = response_from(serde_json::json!({
            "candidates": [{
                "content": {"parts": [{"text": "Hello "}, {"text": "world"}], "role": "model"},
                "finishReason": "STOP"
            }]
        }));
        assert_eq!(extract_text(resp).unwrap(), "Hello world");
    }

    #[test]
    fn test_extract_text_prompt_blocked() {
        let resp = response_from(serde_json::json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }));
        assert!(matches!(extract_text(resp), Err(LlmError::Blocked(r)) if r == "SAFETY"));
    }

    #[test]
    fn test_extract_text_safety_finish_reason() {
        let resp = response_from(serde_json::json!({
            "candidates": [{"content": {"parts": []}, "finishReason": "SAFETY"}]
        }));
        assert!(matches!(extract_text(resp), Err(LlmError::Blocked(_))));
    }

    #[test]
    fn test_extract_text_no_candidates() {
        let resp = response_from(serde_json::json!({}));
        assert!(matches!(extract_text(resp), Err(LlmError::Empty)));
    }

    #[test]
    fn test_extract_text_blank_answer() {
        let resp = response_from(serde_json::json!({
            "candidates": [{"content": {"parts": [{"text": "  \n "}]}, "finishReason": "STOP"}]
        }));
        assert!(matches!(extract_text(resp), Err(LlmError::Empty)));
    }
}
