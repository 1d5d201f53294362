use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Bot,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "bot" => Self::Bot,
            _ => Self::User,
        }
    }
}

/// One prior turn entry as supplied by the client (or loaded from a
/// conversation) when building model context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: ChatRole,
    pub content: String,
}

/// Persisted message within a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: Uuid,
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Conversation summary for list views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: Uuid,
    pub title: String,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Derive a conversation title from the first prompt.
/// Falls back to a truncated prompt when no better title is available.
pub fn derive_title(prompt: &str) -> String {
    const MAX_TITLE_CHARS: usize = 40;
    let trimmed = prompt.trim();
    let mut title: String = trimmed.chars().take(MAX_TITLE_CHARS).collect();
    if trimmed.chars().count() > MAX_TITLE_CHARS {
        title.push('…');
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        assert_eq!(ChatRole::from_str("user"), ChatRole::User);
        assert_eq!(ChatRole::from_str("bot"), ChatRole::Bot);
        assert_eq!(ChatRole::User.as_str(), "user");
        assert_eq!(ChatRole::Bot.as_str(), "bot");
    }

    #[test]
    fn test_unknown_role_defaults_to_user() {
        assert_eq!(ChatRole::from_str("assistant"), ChatRole::User);
    }

    #[test]
    fn test_derive_title_short_prompt() {
        assert_eq!(derive_title("What is Rust?"), "What is Rust?");
    }

    #[test]
    fn test_derive_title_trims_whitespace() {
        assert_eq!(derive_title("  hello  "), "hello");
    }

    #[test]
    fn test_derive_title_truncates_long_prompt() {
        let prompt = "a".repeat(100);
        let title = derive_title(&prompt);
        assert_eq!(title.chars().count(), 41); // 40 chars + ellipsis
        assert!(title.ends_with('…'));
    }

    #[test]
    fn test_derive_title_multibyte_safe() {
        let prompt = "æøå".repeat(20); // 60 chars, multibyte
        let title = derive_title(&prompt);
        assert_eq!(title.chars().count(), 41);
    }
}
