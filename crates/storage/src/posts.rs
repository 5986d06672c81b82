//! Post and visual media rows
//!
//! Post content is persisted in storage form only; encoding and decoding of
//! mentions happens above this layer.

use crate::database::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::str::FromStr;

/// Kind of attached media
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaType {
    /// Still image
    Photo,
    /// Video clip
    Video,
}

impl MediaType {
    /// Stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photo => "PHOTO",
            Self::Video => "VIDEO",
        }
    }
}

impl FromStr for MediaType {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PHOTO" => Ok(Self::Photo),
            "VIDEO" => Ok(Self::Video),
            other => Err(DatabaseError::CorruptRow(format!("unknown media type: {}", other))),
        }
    }
}

/// Media attached to a post, opaque beyond its type and location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    /// Media type
    pub media_type: MediaType,
    /// Where the blob lives
    pub file_name: String,
}

impl MediaAttachment {
    /// Create a photo attachment
    pub fn photo(file_name: impl Into<String>) -> Self {
        Self { media_type: MediaType::Photo, file_name: file_name.into() }
    }

    /// Create a video attachment
    pub fn video(file_name: impl Into<String>) -> Self {
        Self { media_type: MediaType::Video, file_name: file_name.into() }
    }
}

/// A post row with its media
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    /// Post ID
    pub id: i64,
    /// Author user ID
    pub user_id: i64,
    /// Content in storage form
    pub content: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Attached media
    pub media: Vec<MediaAttachment>,
}

fn media_from_row(row: &SqliteRow) -> Result<MediaAttachment> {
    let media_type: String = row.try_get("media_type")?;
    Ok(MediaAttachment {
        media_type: media_type.parse()?,
        file_name: row.try_get("file_name")?,
    })
}

/// Insert a post and its media
///
/// Run inside a transaction when the media must land atomically with the post.
pub async fn insert_post(
    conn: &mut SqliteConnection,
    user_id: i64,
    content: &str,
    media: &[MediaAttachment],
) -> Result<PostRecord> {
    let created_at = Utc::now();
    let id = sqlx::query("INSERT INTO posts (user_id, content, created_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(content)
        .bind(created_at)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    insert_media(conn, id, user_id, media).await?;

    Ok(PostRecord {
        id,
        user_id,
        content: content.to_string(),
        created_at,
        media: media.to_vec(),
    })
}

async fn insert_media(
    conn: &mut SqliteConnection,
    post_id: i64,
    user_id: i64,
    media: &[MediaAttachment],
) -> Result<()> {
    for item in media {
        sqlx::query(
            "INSERT INTO visual_media (post_id, user_id, media_type, file_name) VALUES (?, ?, ?, ?)",
        )
        .bind(post_id)
        .bind(user_id)
        .bind(item.media_type.as_str())
        .bind(&item.file_name)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Look up a post with its media
pub async fn find_post(conn: &mut SqliteConnection, id: i64) -> Result<Option<PostRecord>> {
    let Some(row) = sqlx::query("SELECT id, user_id, content, created_at FROM posts WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let media_rows =
        sqlx::query("SELECT media_type, file_name FROM visual_media WHERE post_id = ? ORDER BY id")
            .bind(id)
            .fetch_all(&mut *conn)
            .await?;
    let media = media_rows.iter().map(media_from_row).collect::<Result<Vec<_>>>()?;

    Ok(Some(PostRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
        media,
    }))
}

/// Whether a post exists
pub async fn post_exists(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM posts WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}

/// Replace a post's content and media
pub async fn update_post(
    conn: &mut SqliteConnection,
    id: i64,
    content: &str,
    media: &[MediaAttachment],
) -> Result<bool> {
    let affected = sqlx::query("UPDATE posts SET content = ? WHERE id = ?")
        .bind(content)
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if affected == 0 {
        return Ok(false);
    }

    let user_id: i64 = sqlx::query_scalar("SELECT user_id FROM posts WHERE id = ?")
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM visual_media WHERE post_id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    insert_media(conn, id, user_id, media).await?;

    Ok(true)
}

/// Delete a post; its media and mention activities go with it
///
/// Returns `false` if the post did not exist.
pub async fn delete_post(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
    let affected = sqlx::query("DELETE FROM posts WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    Ok(affected > 0)
}
