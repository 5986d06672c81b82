//! Activity notifications
//!
//! This module records who was mentioned where. The post service hands each
//! committed write to an [`ActivityNotifier`]; delivery is fire-and-forget from
//! the writer's point of view.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::sync::Arc;
use storage::{DatabaseError, SqliteDatabase};

/// Errors that can occur during notification operations
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// Storage failure
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Stored kind not recognized
    #[error("Unknown activity kind: {0}")]
    UnknownKind(String),
}

impl From<sqlx::Error> for NotificationError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.into())
    }
}

/// Result type for notification operations
pub type Result<T> = std::result::Result<T, NotificationError>;

/// Types of activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    /// Someone mentioned you in a post
    PostMention,
}

impl ActivityKind {
    /// Stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PostMention => "POST_MENTION",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "POST_MENTION" => Ok(Self::PostMention),
            other => Err(NotificationError::UnknownKind(other.to_string())),
        }
    }
}

/// Mentions made by one post write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionActivity {
    /// Post the mentions live in
    pub source_id: i64,
    /// Author of the post
    pub source_user_id: i64,
    /// Mentioned users, deduplicated
    pub mentioned_ids: Vec<i64>,
    /// Whether this write edited an existing post
    pub is_update: bool,
}

/// A recorded activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    /// Activity ID
    pub id: i64,
    /// What happened
    pub kind: ActivityKind,
    /// Who did it
    pub source_user_id: i64,
    /// Where it happened
    pub source_id: i64,
    /// Who is notified
    pub target_user_id: i64,
    /// When it was recorded
    pub created_at: DateTime<Utc>,
}

/// Receives mention activity after a post write commits
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActivityNotifier: Send + Sync {
    /// Record the mentions of one post write
    async fn notify(&self, activity: MentionActivity) -> Result<()>;
}

/// Activity log stored in the `activities` table
#[derive(Clone)]
pub struct SqliteActivityLog {
    db: Arc<SqliteDatabase>,
}

impl SqliteActivityLog {
    /// Create a log over a migrated database
    pub fn new(db: Arc<SqliteDatabase>) -> Self {
        Self { db }
    }

    /// Activities addressed to a user, newest first
    pub async fn list_for_user(&self, user_id: i64, limit: u32) -> Result<Vec<Activity>> {
        let rows = sqlx::query(
            "SELECT id, kind, source_user_id, source_id, target_user_id, created_at
             FROM activities WHERE target_user_id = ?
             ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(self.db.pool())
        .await?;

        rows.iter()
            .map(|row| -> Result<Activity> {
                let kind: String = row.try_get("kind")?;
                Ok(Activity {
                    id: row.try_get("id")?,
                    kind: ActivityKind::parse(&kind)?,
                    source_user_id: row.try_get("source_user_id")?,
                    source_id: row.try_get("source_id")?,
                    target_user_id: row.try_get("target_user_id")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ActivityNotifier for SqliteActivityLog {
    async fn notify(&self, activity: MentionActivity) -> Result<()> {
        let kind = ActivityKind::PostMention.as_str();
        let mut tx = self.db.begin().await?;

        // An edit replaces the mention set of the post
        if activity.is_update {
            sqlx::query("DELETE FROM activities WHERE kind = ? AND source_id = ?")
                .bind(kind)
                .bind(activity.source_id)
                .execute(&mut *tx)
                .await?;
        }

        let now = Utc::now();
        let mut recorded = 0usize;
        for &target in &activity.mentioned_ids {
            if target == activity.source_user_id {
                continue;
            }
            recorded += sqlx::query(
                "INSERT OR IGNORE INTO activities
                 (kind, source_user_id, source_id, target_user_id, created_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(kind)
            .bind(activity.source_user_id)
            .bind(activity.source_id)
            .bind(target)
            .bind(now)
            .execute(&mut *tx)
            .await?
            .rows_affected() as usize;
        }

        tx.commit().await?;
        tracing::debug!(source_id = activity.source_id, recorded, "mention activity recorded");
        Ok(())
    }
}
