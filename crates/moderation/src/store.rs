//! Persistence boundary for reports
//!
//! [`ReportStore`] is the only place report and content state is mutated. Its
//! [`ReportStore::resolve`] procedure is the single transaction that moves a
//! report out of `PENDING` and, for a removal, deletes the reported post in the
//! same commit.

use crate::error::{ModerationError, Result};
use crate::reporting::{ModerationAction, NewReport, Report, ReportStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::sync::Arc;
use storage::{posts, users, Role, SqliteDatabase};

/// A moderator's decision, ready to be committed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Report being resolved
    pub report_id: i64,
    /// Acting moderator
    pub moderator_id: i64,
    /// Requested transition
    pub action: ModerationAction,
    /// Normalized notes
    pub notes: Option<String>,
    /// Resolution timestamp
    pub resolved_at: DateTime<Utc>,
}

/// What a committed resolution did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// Only the report changed
    ReportOnly(Report),
    /// The report is REMOVED and the post is gone
    ReportAndContentRemoved {
        /// The report as committed, `None` if the store dropped it with the post
        report: Option<Report>,
        /// The removed post
        content_id: i64,
        /// `false` when the post was already gone before this transaction
        content_deleted: bool,
    },
}

/// Transactional access to reports and the content they point at
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Current role of a user, read from the source of truth on every call
    async fn user_role(&self, user_id: i64) -> Result<Option<Role>>;

    /// Insert a pending report
    ///
    /// The post existence check and the insert are one statement, so a report
    /// is never filed against a post deleted in between.
    ///
    /// Fails with `NotFound` when the post does not exist and with
    /// `InvalidTransition` when the reporter already has a pending report on
    /// the post.
    async fn insert_report(&self, report: NewReport) -> Result<Report>;

    /// Look up a report
    async fn find_report(&self, report_id: i64) -> Result<Option<Report>>;

    /// Page through reports, newest first, with the total matching count
    async fn list_reports(
        &self,
        status: Option<ReportStatus>,
        offset: u64,
        limit: u32,
    ) -> Result<(Vec<Report>, u64)>;

    /// Commit a resolution atomically
    ///
    /// The pending guard is re-checked inside the transaction. Any failure
    /// leaves both the report and the post exactly as they were.
    async fn resolve(&self, resolution: Resolution) -> Result<ResolveOutcome>;

    /// Replace the notes on a terminal report
    ///
    /// Returns `None` when the report does not exist or is still pending.
    async fn amend_notes(&self, report_id: i64, notes: Option<String>) -> Result<Option<Report>>;
}

// ============================================================================
// SQLite implementation
// ============================================================================

const REPORT_COLUMNS: &str = "id, post_id, reporter_id, reason, status, moderator_id, \
                              moderator_notes, resolved_at, created_at";

fn report_from_row(row: &SqliteRow) -> Result<Report> {
    let status: String = row.try_get("status")?;
    let status = ReportStatus::parse(&status).ok_or_else(|| {
        ModerationError::StoreUnavailable(format!("corrupt report status: {}", status))
    })?;

    Ok(Report {
        id: row.try_get("id")?,
        content_id: row.try_get("post_id")?,
        reporter_id: row.try_get("reporter_id")?,
        reason: row.try_get("reason")?,
        status,
        moderator_id: row.try_get("moderator_id")?,
        moderator_notes: row.try_get("moderator_notes")?,
        resolved_at: row.try_get("resolved_at")?,
        created_at: row.try_get("created_at")?,
    })
}

async fn fetch_report(conn: &mut SqliteConnection, report_id: i64) -> Result<Option<Report>> {
    let row = sqlx::query(&format!("SELECT {} FROM post_reports WHERE id = ?", REPORT_COLUMNS))
        .bind(report_id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(report_from_row).transpose()
}

/// SQLite-backed report store
pub struct SqliteReportStore {
    db: Arc<SqliteDatabase>,
}

impl SqliteReportStore {
    /// Create a store over a migrated database
    pub fn new(db: Arc<SqliteDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReportStore for SqliteReportStore {
    async fn user_role(&self, user_id: i64) -> Result<Option<Role>> {
        let mut conn = self.db.pool().acquire().await?;
        Ok(users::role_of(&mut conn, user_id).await?)
    }

    async fn insert_report(&self, report: NewReport) -> Result<Report> {
        let mut conn = self.db.pool().acquire().await?;

        let inserted = sqlx::query(
            "INSERT INTO post_reports (post_id, reporter_id, reason, status, created_at)
             SELECT ?1, ?2, ?3, 'PENDING', ?4
             WHERE EXISTS (SELECT 1 FROM posts WHERE id = ?1)",
        )
        .bind(report.content_id)
        .bind(report.reporter_id)
        .bind(&report.reason)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await;

        let id = match inserted {
            Ok(done) if done.rows_affected() == 0 => {
                return Err(ModerationError::NotFound(format!("post {}", report.content_id)));
            }
            Ok(done) => done.last_insert_rowid(),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(ModerationError::InvalidTransition(format!(
                    "user {} already has a pending report on post {}",
                    report.reporter_id, report.content_id
                )));
            }
            Err(e) => return Err(e.into()),
        };

        fetch_report(&mut conn, id).await?.ok_or_else(|| {
            ModerationError::StoreUnavailable(format!("report {} vanished after insert", id))
        })
    }

    async fn find_report(&self, report_id: i64) -> Result<Option<Report>> {
        let mut conn = self.db.pool().acquire().await?;
        fetch_report(&mut conn, report_id).await
    }

    async fn list_reports(
        &self,
        status: Option<ReportStatus>,
        offset: u64,
        limit: u32,
    ) -> Result<(Vec<Report>, u64)> {
        let mut conn = self.db.pool().acquire().await?;
        let status = status.map(|s| s.as_str());
        let offset = i64::try_from(offset)
            .map_err(|_| ModerationError::Validation("page out of range".to_string()))?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM post_reports
             WHERE (?1 IS NULL OR status = ?1)
             ORDER BY created_at DESC, id DESC
             LIMIT ?2 OFFSET ?3",
            REPORT_COLUMNS
        ))
        .bind(status)
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&mut *conn)
        .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM post_reports WHERE (?1 IS NULL OR status = ?1)")
                .bind(status)
                .fetch_one(&mut *conn)
                .await?;

        let items = rows.iter().map(report_from_row).collect::<Result<Vec<_>>>()?;
        Ok((items, total.max(0) as u64))
    }

    async fn resolve(&self, resolution: Resolution) -> Result<ResolveOutcome> {
        let mut tx = self.db.begin().await?;

        // Write first: the conditional update takes the write lock up front, so
        // a racing resolution waits here and then sees a terminal status.
        let updated = sqlx::query(
            "UPDATE post_reports
             SET status = ?, moderator_id = ?, moderator_notes = ?, resolved_at = ?
             WHERE id = ? AND status = 'PENDING'",
        )
        .bind(resolution.action.target_status().as_str())
        .bind(resolution.moderator_id)
        .bind(&resolution.notes)
        .bind(resolution.resolved_at)
        .bind(resolution.report_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            let current = fetch_report(&mut *tx, resolution.report_id).await?;
            return Err(match current {
                None => ModerationError::NotFound(format!("report {}", resolution.report_id)),
                Some(report) => ModerationError::InvalidTransition(format!(
                    "report {} is already {}",
                    report.id, report.status
                )),
            });
        }

        let report = fetch_report(&mut *tx, resolution.report_id).await?.ok_or_else(|| {
            ModerationError::StoreUnavailable(format!(
                "report {} vanished mid-transaction",
                resolution.report_id
            ))
        })?;

        let outcome = if resolution.action.removes_content() {
            let content_id = report.content_id;
            let content_deleted = posts::delete_post(&mut *tx, content_id).await?;
            ResolveOutcome::ReportAndContentRemoved {
                report: fetch_report(&mut *tx, resolution.report_id).await?,
                content_id,
                content_deleted,
            }
        } else {
            ResolveOutcome::ReportOnly(report)
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn amend_notes(&self, report_id: i64, notes: Option<String>) -> Result<Option<Report>> {
        let mut conn = self.db.pool().acquire().await?;

        let updated = sqlx::query(
            "UPDATE post_reports SET moderator_notes = ? WHERE id = ? AND status != 'PENDING'",
        )
        .bind(&notes)
        .bind(report_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        if updated == 0 {
            return Ok(None);
        }
        fetch_report(&mut conn, report_id).await
    }
}
