use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use samtale_common::models::chat::ChatRole;
use sqlx::PgPool;
use uuid::Uuid;

/// Conversation row from database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConversationRow {
    pub conversation_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Message row from database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageRow {
    pub message_id: Uuid,
    pub conversation_id: Uuid,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Repository for conversations and their messages.
///
/// A turn (user prompt + bot answer) is always written in a single
/// transaction together with the `last_activity` bump, so a conversation
/// never holds a user message without its answer.
pub struct ConversationRepo;

impl ConversationRepo {
    /// Create a conversation with its first turn.
    pub async fn create_with_turn(
        pool: &PgPool,
        user_id: Uuid,
        title: &str,
        prompt: &str,
        answer: &str,
    ) -> Result<Uuid> {
        let conversation_id = Uuid::new_v4();
        let mut tx = pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query(
            "INSERT INTO conversation (conversation_id, user_id, title) VALUES ($1, $2, $3)",
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(title)
        .execute(&mut *tx)
        .await
        .context("Failed to create conversation")?;

        Self::insert_pair(&mut tx, conversation_id, prompt, answer).await?;

        tx.commit().await.context("Failed to commit first turn")?;
        Ok(conversation_id)
    }

    /// Append a turn to an existing conversation and refresh `last_activity`.
    pub async fn append_turn(
        pool: &PgPool,
        conversation_id: Uuid,
        prompt: &str,
        answer: &str,
    ) -> Result<()> {
        let mut tx = pool.begin().await.context("Failed to begin transaction")?;

        Self::insert_pair(&mut tx, conversation_id, prompt, answer).await?;

        sqlx::query("UPDATE conversation SET last_activity = NOW() WHERE conversation_id = $1")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await
            .context("Failed to bump last_activity")?;

        tx.commit().await.context("Failed to commit turn")?;
        Ok(())
    }

    async fn insert_pair(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        conversation_id: Uuid,
        prompt: &str,
        answer: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO message (message_id, conversation_id, role, content) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(conversation_id)
        .bind(ChatRole::User.as_str())
        .bind(prompt)
        .execute(&mut **tx)
        .await
        .context("Failed to insert user message")?;

        sqlx::query(
            "INSERT INTO message (message_id, conversation_id, role, content) VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(conversation_id)
        .bind(ChatRole::Bot.as_str())
        .bind(answer)
        .execute(&mut **tx)
        .await
        .context("Failed to insert bot message")?;

        Ok(())
    }

    pub async fn get(pool: &PgPool, conversation_id: Uuid) -> Result<Option<ConversationRow>> {
        let row = sqlx::query_as::<_, ConversationRow>(
            "SELECT conversation_id, user_id, title, last_activity, created_at FROM conversation WHERE conversation_id = $1",
        )
        .bind(conversation_id)
        .fetch_optional(pool)
        .await
        .context("Failed to get conversation")?;
        Ok(row)
    }

    /// List a user's conversations, most recently active first.
    pub async fn list_for_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<ConversationRow>> {
        let rows = sqlx::query_as::<_, ConversationRow>(
            "SELECT conversation_id, user_id, title, last_activity, created_at FROM conversation WHERE user_id = $1 ORDER BY last_activity DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
        .context("Failed to list conversations")?;
        Ok(rows)
    }

    /// Messages in insertion order.
    pub async fn messages(pool: &PgPool, conversation_id: Uuid) -> Result<Vec<MessageRow>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT message_id, conversation_id, role, content, created_at FROM message WHERE conversation_id = $1 ORDER BY seq",
        )
        .bind(conversation_id)
        .fetch_all(pool)
        .await
        .context("Failed to list messages")?;
        Ok(rows)
    }

    /// Delete a conversation; messages cascade.
    pub async fn delete(pool: &PgPool, conversation_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM conversation WHERE conversation_id = $1")
            .bind(conversation_id)
            .execute(pool)
            .await
            .context("Failed to delete conversation")?;
        Ok(())
    }
}
