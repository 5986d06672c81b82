//! Threadline content core
//!
//! [`Platform`] ties the workspace crates together behind the operations the
//! request layer consumes: mention encoding and decoding, report filing, the
//! moderator's report queue, and moderation actions.
//!
//! # Example
//!
//! ```rust,no_run
//! use threadline::{Platform, PlatformConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let platform = Platform::open(PlatformConfig::from_env()?).await?;
//!
//! let stored = platform.encode_for_storage("hi @alice").await?;
//! let shown = platform.decode_for_display(&stored).await?;
//! println!("{}", shown.text);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;

pub use config::PlatformConfig;

use app_core::{PostService, SqliteActivityLog, SqliteUserDirectory};
use mentions::{DecodedText, MentionCodec, MentionError, MentionResolver};
use moderation::{
    ModerationAction, ModerationEngine, ModerationError, Report, ReportFilter, ReportPage,
    ReportService, ResolvedReport, SqliteReportStore,
};
use std::sync::Arc;
use storage::{users, DatabaseError, Role, SqliteDatabase, UserRecord};
use thiserror::Error;

/// Errors surfaced by the platform
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage failure outside a moderation transaction
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Mention encoding or decoding failed
    #[error(transparent)]
    Mention(#[from] MentionError),

    /// Report or moderation failure
    #[error(transparent)]
    Moderation(#[from] ModerationError),

    /// Post authoring failure
    #[error(transparent)]
    Post(#[from] app_core::PostError),
}

/// Result type for platform operations
pub type Result<T> = std::result::Result<T, PlatformError>;

/// The assembled content core
#[derive(Clone)]
pub struct Platform {
    db: Arc<SqliteDatabase>,
    codec: MentionCodec,
    reports: ReportService,
    engine: ModerationEngine,
    posts: PostService,
    activity: Arc<SqliteActivityLog>,
}

impl Platform {
    /// Open the configured database, migrate it, and assemble the services
    pub async fn open(config: PlatformConfig) -> Result<Self> {
        let db = storage::open(config.database).await?;
        Ok(Self::from_database(Arc::new(db), config.max_page_size))
    }

    /// Platform over a fresh in-memory database
    pub async fn in_memory() -> Result<Self> {
        let db = storage::open_in_memory().await?;
        Ok(Self::from_database(Arc::new(db), moderation::reporting::MAX_PAGE_SIZE))
    }

    /// Assemble the services over an already migrated database
    pub fn from_database(db: Arc<SqliteDatabase>, max_page_size: u32) -> Self {
        let directory = Arc::new(SqliteUserDirectory::new(db.clone()));
        let codec = MentionCodec::new(MentionResolver::new(directory));
        let store = Arc::new(SqliteReportStore::new(db.clone()));
        let activity = Arc::new(SqliteActivityLog::new(db.clone()));

        Self {
            reports: ReportService::new(store.clone()).with_max_page_size(max_page_size),
            engine: ModerationEngine::new(store),
            posts: PostService::new(db.clone(), codec.clone(), activity.clone()),
            codec,
            activity,
            db,
        }
    }

    /// Underlying database
    pub fn database(&self) -> &Arc<SqliteDatabase> {
        &self.db
    }

    /// Post authoring service
    pub fn posts(&self) -> &PostService {
        &self.posts
    }

    /// Mention activity log
    pub fn activity(&self) -> &SqliteActivityLog {
        &self.activity
    }

    // ========================================================================
    // Mentions
    // ========================================================================

    /// Rewrite display text into storage form
    pub async fn encode_for_storage(&self, display_text: &str) -> Result<String> {
        Ok(self.codec.encode(display_text).await?.text)
    }

    /// Rewrite storage text into display form with the mentioned accounts
    pub async fn decode_for_display(&self, storage_text: &str) -> Result<DecodedText> {
        Ok(self.codec.decode(storage_text).await?)
    }

    // ========================================================================
    // Reports and moderation
    // ========================================================================

    /// File a report against a post, returning the report ID
    pub async fn file_report(&self, actor_id: i64, content_id: i64, reason: &str) -> Result<i64> {
        Ok(self.reports.file_report(actor_id, content_id, reason).await?)
    }

    /// Apply a moderation action given by name
    ///
    /// Accepts `review`, `dismiss` and `remove` (`block_post` is an alias for
    /// `remove`). Any other name is a validation error.
    pub async fn apply_moderation_action(
        &self,
        moderator_id: i64,
        report_id: i64,
        action: &str,
        notes: Option<&str>,
    ) -> Result<ResolvedReport> {
        let action: ModerationAction = action.parse()?;
        Ok(self.engine.apply_action(moderator_id, report_id, action, notes).await?)
    }

    /// Page through the report queue
    pub async fn list_reports(&self, moderator_id: i64, filter: &ReportFilter) -> Result<ReportPage> {
        Ok(self.reports.list_reports(moderator_id, filter).await?)
    }

    /// Fetch one report
    pub async fn get_report(&self, moderator_id: i64, report_id: i64) -> Result<Report> {
        Ok(self.reports.get_report(moderator_id, report_id).await?)
    }

    /// Replace the notes on a resolved report
    pub async fn amend_report_notes(
        &self,
        moderator_id: i64,
        report_id: i64,
        notes: Option<&str>,
    ) -> Result<Report> {
        Ok(self.engine.amend_notes(moderator_id, report_id, notes).await?)
    }

    // ========================================================================
    // Roles
    // ========================================================================

    /// Grant or revoke moderator capability by email
    ///
    /// Returns the updated user, or `None` when nobody has that email.
    pub async fn set_moderator(&self, email: &str, granted: bool) -> Result<Option<UserRecord>> {
        let role = if granted { Role::Admin } else { Role::User };
        let mut conn = self.db.pool().acquire().await.map_err(DatabaseError::from)?;
        let user = users::set_role_by_email(&mut conn, email, role).await?;

        if let Some(user) = &user {
            tracing::info!(user_id = user.id, role = %role, "role changed");
        }
        Ok(user)
    }

    /// Close the connection pool
    pub async fn close(&self) {
        self.db.close().await;
    }
}
