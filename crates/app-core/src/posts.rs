//! Post authoring and reading
//!
//! Authored text is encoded into storage form before it is persisted and
//! decoded back to display form on every read. Mention activity is handed to
//! the [`ActivityNotifier`] only after the post write has committed.

use crate::notifications::{ActivityNotifier, MentionActivity};
use chrono::{DateTime, Utc};
use mentions::{MentionCodec, MentionError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use storage::{posts, users, DatabaseError, MediaAttachment, PostRecord, SqliteDatabase};
use thiserror::Error;

/// Maximum post text length (characters, display form)
pub const MAX_POST_LENGTH: usize = 5000;

/// Post error types
#[derive(Debug, Error)]
pub enum PostError {
    /// Text too long
    #[error("Text exceeds maximum length of {max} characters (got {actual})")]
    TextTooLong {
        /// Actual text length
        actual: usize,
        /// Maximum allowed length
        max: usize,
    },

    /// Empty post
    #[error("Post cannot be empty (no text and no media)")]
    EmptyPost,

    /// Post not found
    #[error("Post not found: {0}")]
    NotFound(i64),

    /// Author does not exist
    #[error("Unknown user: {0}")]
    UnknownUser(i64),

    /// Not the owner of the post
    #[error("Not authorized to modify this post")]
    NotAuthorized,

    /// Mention encoding or decoding failed
    #[error(transparent)]
    Mention(#[from] MentionError),

    /// Storage failure
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for PostError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.into())
    }
}

/// Result type for post operations
pub type PostResult<T> = std::result::Result<T, PostError>;

/// Classify an uploaded file by its extension
///
/// Image extensions are photos; anything else is treated as video.
pub fn media_from_file_name(file_name: impl Into<String>) -> MediaAttachment {
    static PHOTO_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = PHOTO_REGEX.get_or_init(|| {
        Regex::new(r"(?i)\.(jpg|jpeg|png|webp|gif)$").expect("photo extension regex is valid")
    });

    let file_name = file_name.into();
    if re.is_match(&file_name) {
        MediaAttachment::photo(file_name)
    } else {
        MediaAttachment::video(file_name)
    }
}

/// Content of a post as authored
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostDraft {
    /// Display-form text
    pub content: String,
    /// Attached media
    pub media: Vec<MediaAttachment>,
}

impl PostDraft {
    /// Create a text-only draft
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), media: Vec::new() }
    }

    /// Attach media
    pub fn with_media(mut self, media: MediaAttachment) -> Self {
        self.media.push(media);
        self
    }

    fn validate(&self) -> PostResult<()> {
        if self.content.trim().is_empty() && self.media.is_empty() {
            return Err(PostError::EmptyPost);
        }
        let actual = self.content.chars().count();
        if actual > MAX_POST_LENGTH {
            return Err(PostError::TextTooLong { actual, max: MAX_POST_LENGTH });
        }
        Ok(())
    }
}

/// A post as shown to readers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    /// Post ID
    pub id: i64,
    /// Author user ID
    pub user_id: i64,
    /// Display-form text with current usernames
    pub content: String,
    /// Accounts mentioned that still exist
    pub mentioned_ids: Vec<i64>,
    /// Attached media
    pub media: Vec<MediaAttachment>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Creates, edits, reads and deletes posts
///
/// # Example
///
/// ```rust,no_run
/// use app_core::posts::{PostDraft, PostService};
///
/// # async fn example(service: PostService) -> Result<(), Box<dyn std::error::Error>> {
/// let post = service.create_post(1, &PostDraft::new("hello @alice")).await?;
/// println!("Created post {}: {}", post.id, post.content);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PostService {
    db: Arc<SqliteDatabase>,
    codec: MentionCodec,
    notifier: Arc<dyn ActivityNotifier>,
}

impl PostService {
    /// Create a new post service
    pub fn new(
        db: Arc<SqliteDatabase>,
        codec: MentionCodec,
        notifier: Arc<dyn ActivityNotifier>,
    ) -> Self {
        Self { db, codec, notifier }
    }

    /// Create a post
    ///
    /// # Errors
    ///
    /// - `PostError::EmptyPost` - no text and no media
    /// - `PostError::TextTooLong` - text exceeds [`MAX_POST_LENGTH`]
    /// - `PostError::UnknownUser` - author does not exist
    /// - `PostError::Mention` - user directory unavailable
    pub async fn create_post(&self, author_id: i64, draft: &PostDraft) -> PostResult<PostView> {
        draft.validate()?;
        let encoded = self.codec.encode(&draft.content).await?;

        let mut tx = self.db.begin().await?;
        if users::find_by_id(&mut *tx, author_id).await?.is_none() {
            return Err(PostError::UnknownUser(author_id));
        }
        let record = posts::insert_post(&mut *tx, author_id, &encoded.text, &draft.media).await?;
        tx.commit().await?;

        tracing::info!(
            post_id = record.id,
            author_id,
            mentions = encoded.mentioned_ids.len(),
            "post created"
        );
        self.notify(record.id, author_id, encoded.mentioned_ids, false).await;

        self.view(record).await
    }

    /// Replace the text and media of a post
    ///
    /// # Errors
    ///
    /// - `PostError::NotFound` - no such post
    /// - `PostError::NotAuthorized` - caller does not own the post
    /// - plus everything [`PostService::create_post`] can return
    pub async fn edit_post(
        &self,
        actor_id: i64,
        post_id: i64,
        draft: &PostDraft,
    ) -> PostResult<PostView> {
        draft.validate()?;
        let encoded = self.codec.encode(&draft.content).await?;

        let mut tx = self.db.begin().await?;
        let existing = posts::find_post(&mut *tx, post_id)
            .await?
            .ok_or(PostError::NotFound(post_id))?;
        if existing.user_id != actor_id {
            return Err(PostError::NotAuthorized);
        }
        posts::update_post(&mut *tx, post_id, &encoded.text, &draft.media).await?;
        tx.commit().await?;

        tracing::info!(post_id, actor_id, "post edited");
        self.notify(post_id, actor_id, encoded.mentioned_ids, true).await;

        self.view(PostRecord {
            content: encoded.text,
            media: draft.media.clone(),
            ..existing
        })
        .await
    }

    /// Read a post in display form
    pub async fn get_post(&self, post_id: i64) -> PostResult<PostView> {
        let mut conn = self.db.pool().acquire().await?;
        let record = posts::find_post(&mut conn, post_id)
            .await?
            .ok_or(PostError::NotFound(post_id))?;
        drop(conn);

        self.view(record).await
    }

    /// Delete a post and its media
    pub async fn delete_post(&self, actor_id: i64, post_id: i64) -> PostResult<()> {
        let mut tx = self.db.begin().await?;
        let existing = posts::find_post(&mut *tx, post_id)
            .await?
            .ok_or(PostError::NotFound(post_id))?;
        if existing.user_id != actor_id {
            return Err(PostError::NotAuthorized);
        }
        posts::delete_post(&mut *tx, post_id).await?;
        tx.commit().await?;

        tracing::info!(post_id, actor_id, "post deleted");
        Ok(())
    }

    async fn view(&self, record: PostRecord) -> PostResult<PostView> {
        let decoded = self.codec.decode(&record.content).await?;
        Ok(PostView {
            id: record.id,
            user_id: record.user_id,
            content: decoded.text,
            mentioned_ids: decoded.mentioned_ids,
            media: record.media,
            created_at: record.created_at,
        })
    }

    /// Fire-and-forget: the post is already committed
    async fn notify(
        &self,
        source_id: i64,
        source_user_id: i64,
        mentioned_ids: Vec<i64>,
        is_update: bool,
    ) {
        let activity = MentionActivity { source_id, source_user_id, mentioned_ids, is_update };
        if let Err(e) = self.notifier.notify(activity).await {
            tracing::warn!(post_id = source_id, error = %e, "failed to record mention activity");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::SqliteUserDirectory;
    use crate::notifications::{MockActivityNotifier, NotificationError, SqliteActivityLog};
    use mentions::MentionResolver;
    use storage::{MediaType, NewUser};

    struct Fixture {
        db: Arc<SqliteDatabase>,
        alice: i64,
        bob: i64,
    }

    async fn fixture() -> Fixture {
        let db = Arc::new(storage::open_in_memory().await.unwrap());
        let mut conn = db.pool().acquire().await.unwrap();
        let alice = users::insert_user(&mut conn, &NewUser::new("alice")).await.unwrap();
        let bob = users::insert_user(&mut conn, &NewUser::new("bob")).await.unwrap();
        drop(conn);
        Fixture { db, alice: alice.id, bob: bob.id }
    }

    fn service(f: &Fixture, notifier: Arc<dyn ActivityNotifier>) -> PostService {
        let directory = Arc::new(SqliteUserDirectory::new(f.db.clone()));
        PostService::new(f.db.clone(), MentionCodec::new(MentionResolver::new(directory)), notifier)
    }

    #[test]
    fn test_media_from_file_name() {
        assert_eq!(media_from_file_name("a.PNG").media_type, MediaType::Photo);
        assert_eq!(media_from_file_name("clip.mp4").media_type, MediaType::Video);
        assert_eq!(media_from_file_name("x.gif").file_name, "x.gif");
    }

    #[test]
    fn test_draft_validation() {
        assert!(matches!(PostDraft::new("   ").validate(), Err(PostError::EmptyPost)));
        assert!(PostDraft::new("").with_media(MediaAttachment::photo("a.png")).validate().is_ok());

        let long = PostDraft::new("x".repeat(MAX_POST_LENGTH + 1));
        assert!(matches!(long.validate(), Err(PostError::TextTooLong { .. })));
    }

    #[tokio::test]
    async fn test_create_stores_references_and_notifies() {
        let f = fixture().await;
        let log = Arc::new(SqliteActivityLog::new(f.db.clone()));
        let service = service(&f, log.clone());

        let post = service
            .create_post(f.alice, &PostDraft::new("hi @bob and @nobody"))
            .await
            .unwrap();
        assert_eq!(post.content, "hi @bob and @nobody");
        assert_eq!(post.mentioned_ids, vec![f.bob]);

        let mut conn = f.db.pool().acquire().await.unwrap();
        let stored = posts::find_post(&mut conn, post.id).await.unwrap().unwrap();
        drop(conn);
        assert_eq!(stored.content, format!("hi @{{{}}} and @nobody", f.bob));

        let activities = log.list_for_user(f.bob, 10).await.unwrap();
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].source_id, post.id);
    }

    #[tokio::test]
    async fn test_notifier_failure_keeps_post() {
        let f = fixture().await;
        let mut notifier = MockActivityNotifier::new();
        notifier
            .expect_notify()
            .times(1)
            .returning(|_| Err(NotificationError::UnknownKind("boom".to_string())));
        let service = service(&f, Arc::new(notifier));

        let post = service.create_post(f.alice, &PostDraft::new("@bob")).await.unwrap();
        assert_eq!(service.get_post(post.id).await.unwrap().content, "@bob");
    }

    #[tokio::test]
    async fn test_read_follows_rename() {
        let f = fixture().await;
        let service = service(&f, Arc::new(SqliteActivityLog::new(f.db.clone())));
        let post = service.create_post(f.alice, &PostDraft::new("ping @bob")).await.unwrap();

        let mut conn = f.db.pool().acquire().await.unwrap();
        users::rename(&mut conn, f.bob, "robert").await.unwrap();
        drop(conn);

        assert_eq!(service.get_post(post.id).await.unwrap().content, "ping @robert");
    }

    #[tokio::test]
    async fn test_edit_is_owner_only_and_replaces_mentions() {
        let f = fixture().await;
        let log = Arc::new(SqliteActivityLog::new(f.db.clone()));
        let service = service(&f, log.clone());
        let post = service.create_post(f.alice, &PostDraft::new("@bob")).await.unwrap();

        let err = service.edit_post(f.bob, post.id, &PostDraft::new("hijack")).await.unwrap_err();
        assert!(matches!(err, PostError::NotAuthorized));

        let edited = service
            .edit_post(
                f.alice,
                post.id,
                &PostDraft::new("no mentions").with_media(media_from_file_name("pic.jpg")),
            )
            .await
            .unwrap();
        assert_eq!(edited.content, "no mentions");
        assert_eq!(edited.media.len(), 1);
        assert!(log.list_for_user(f.bob, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_and_unknown_author() {
        let f = fixture().await;
        let service = service(&f, Arc::new(SqliteActivityLog::new(f.db.clone())));
        let post = service.create_post(f.alice, &PostDraft::new("bye")).await.unwrap();

        assert!(matches!(
            service.delete_post(f.bob, post.id).await,
            Err(PostError::NotAuthorized)
        ));
        service.delete_post(f.alice, post.id).await.unwrap();
        assert!(matches!(service.get_post(post.id).await, Err(PostError::NotFound(_))));

        assert!(matches!(
            service.create_post(999, &PostDraft::new("who")).await,
            Err(PostError::UnknownUser(999))
        ));
    }

    #[tokio::test]
    async fn test_delete_clears_mention_activities() {
        let f = fixture().await;
        let log = Arc::new(SqliteActivityLog::new(f.db.clone()));
        let service = service(&f, log.clone());

        let post = service.create_post(f.alice, &PostDraft::new("hey @bob")).await.unwrap();
        assert_eq!(log.list_for_user(f.bob, 10).await.unwrap().len(), 1);

        service.delete_post(f.alice, post.id).await.unwrap();
        assert!(log.list_for_user(f.bob, 10).await.unwrap().is_empty());
    }
}
