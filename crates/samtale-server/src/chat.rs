//! Chat-turn orchestration: model call plus answer normalization.
//!
//! Persistence happens strictly after a successful model call (see the
//! conversation handlers), so a failed turn never leaves a dangling user
//! message.

use samtale_common::models::chat::{ChatRole, HistoryEntry};
use samtale_db::MessageRow;

use crate::llm::{LlmClient, LlmError};
use crate::textfmt;

/// Run one turn: ask the model, normalize the raw answer to plain text.
pub async fn run_turn(
    llm: &dyn LlmClient,
    history: &[HistoryEntry],
    prompt: &str,
) -> Result<String, LlmError> {
    let raw = llm.generate(history, prompt).await?;
    let answer = textfmt::normalize(&raw);
    if answer.is_empty() {
        // Markup-only output normalizes to nothing
        return Err(LlmError::Empty);
    }
    Ok(answer)
}

/// Convert stored conversation messages into model history.
pub fn history_from_rows(rows: &[MessageRow]) -> Vec<HistoryEntry> {
    rows.iter()
        .map(|row| HistoryEntry {
            role: ChatRole::from_str(&row.role),
            content: row.content.clone(),
        })
        .collect()
}

#[cfg(test)]
pub mod test_llm {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted model for tests: returns a fixed answer or a fixed error,
    /// recording every call.
    pub struct MockLlm {
        pub answer: Mutex<Result<String, String>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl MockLlm {
        pub fn answering(text: &str) -> Self {
            Self {
                answer: Mutex::new(Ok(text.to_string())),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(kind: &str) -> Self {
            Self {
                answer: Mutex::new(Err(kind.to_string())),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for MockLlm {
        async fn generate(
            &self,
            _history: &[HistoryEntry],
            prompt: &str,
        ) -> Result<String, LlmError> {
            self.calls.lock().unwrap().push(prompt.to_string());
            match &*self.answer.lock().unwrap() {
                Ok(text) => Ok(text.clone()),
                Err(kind) => Err(match kind.as_str() {
                    "timeout" => LlmError::Timeout,
                    "blocked" => LlmError::Blocked("SAFETY".to_string()),
                    "empty" => LlmError::Empty,
                    _ => LlmError::Upstream(anyhow::anyhow!("boom")),
                }),
            }
        }
    }
}
