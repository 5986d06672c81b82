//! Moderation actions
//!
//! The engine enforces the report state machine:
//!
//! ```text
//! PENDING ──review──▶ REVIEWED
//!    │ ────dismiss──▶ DISMISSED
//!    └─────remove───▶ REMOVED   (reported post deleted in the same commit)
//! ```
//!
//! Terminal reports accept no further transitions. Every check that can reject
//! a request runs before the store is asked to write, and the write itself is a
//! single [`ReportStore::resolve`] call.
//!
//! # Example
//!
//! ```rust,no_run
//! use moderation::engine::ModerationEngine;
//! use moderation::reporting::ModerationAction;
//! use moderation::store::SqliteReportStore;
//! use std::sync::Arc;
//!
//! # async fn example(db: Arc<storage::SqliteDatabase>) -> Result<(), Box<dyn std::error::Error>> {
//! let engine = ModerationEngine::new(Arc::new(SqliteReportStore::new(db)));
//!
//! let resolved = engine
//!     .apply_action(1, 42, ModerationAction::Remove, Some("doxxing"))
//!     .await?;
//! assert!(resolved.content_removed);
//! # Ok(())
//! # }
//! ```

use crate::error::{ModerationError, Result};
use crate::reporting::{ModerationAction, Report, ReportStatus};
use crate::store::{ReportStore, Resolution, ResolveOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Maximum length of moderator notes in characters
pub const MAX_NOTES_LENGTH: usize = 2000;

/// Projection of a report after a moderation action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedReport {
    /// Report ID
    pub report_id: i64,
    /// Reported post
    pub content_id: i64,
    /// Terminal status
    pub status: ReportStatus,
    /// Acting moderator
    pub moderator_id: i64,
    /// Notes as stored
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderator_notes: Option<String>,
    /// When the action was applied
    pub resolved_at: DateTime<Utc>,
    /// Whether this action deleted the post
    pub content_removed: bool,
}

impl ResolvedReport {
    fn from_report(report: Report, fallback: &Resolution, content_removed: bool) -> Self {
        Self {
            report_id: report.id,
            content_id: report.content_id,
            status: report.status,
            moderator_id: report.moderator_id.unwrap_or(fallback.moderator_id),
            moderator_notes: report.moderator_notes,
            resolved_at: report.resolved_at.unwrap_or(fallback.resolved_at),
            content_removed,
        }
    }
}

/// Fail with `Forbidden` unless the user currently holds moderator capability
///
/// The role is read from the store on every call.
pub(crate) async fn require_moderator(store: &dyn ReportStore, user_id: i64) -> Result<()> {
    match store.user_role(user_id).await? {
        Some(role) if role.can_moderate() => Ok(()),
        _ => Err(ModerationError::Forbidden(format!(
            "user {} lacks moderator capability",
            user_id
        ))),
    }
}

/// Trim notes; blank notes are stored as absent
fn normalize_notes(notes: Option<&str>) -> Result<Option<String>> {
    let Some(notes) = notes.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };
    let len = notes.chars().count();
    if len > MAX_NOTES_LENGTH {
        return Err(ModerationError::Validation(format!(
            "notes too long: {} characters (max {})",
            len, MAX_NOTES_LENGTH
        )));
    }
    Ok(Some(notes.to_string()))
}

/// Applies moderation actions to reports
#[derive(Clone)]
pub struct ModerationEngine {
    store: Arc<dyn ReportStore>,
}

impl ModerationEngine {
    /// Create an engine over a report store
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self { store }
    }

    /// Apply a moderation action to a pending report
    ///
    /// # Errors
    ///
    /// - `ModerationError::Forbidden` - caller is not a moderator
    /// - `ModerationError::Validation` - notes too long
    /// - `ModerationError::NotFound` - no such report
    /// - `ModerationError::InvalidTransition` - report already resolved,
    ///   including when a concurrent action won the race
    /// - `ModerationError::StoreUnavailable` - the transaction was rolled back
    pub async fn apply_action(
        &self,
        moderator_id: i64,
        report_id: i64,
        action: ModerationAction,
        notes: Option<&str>,
    ) -> Result<ResolvedReport> {
        require_moderator(self.store.as_ref(), moderator_id).await?;
        let notes = normalize_notes(notes)?;

        let report = self
            .store
            .find_report(report_id)
            .await?
            .ok_or_else(|| ModerationError::NotFound(format!("report {}", report_id)))?;

        if report.status.is_terminal() {
            return Err(ModerationError::InvalidTransition(format!(
                "report {} is already {}",
                report_id, report.status
            )));
        }

        let resolution = Resolution {
            report_id,
            moderator_id,
            action,
            notes: notes.clone(),
            resolved_at: Utc::now(),
        };

        let resolved = match self.store.resolve(resolution.clone()).await? {
            ResolveOutcome::ReportOnly(report) => {
                ResolvedReport::from_report(report, &resolution, false)
            }
            ResolveOutcome::ReportAndContentRemoved { report: Some(report), content_deleted, .. } => {
                ResolvedReport::from_report(report, &resolution, content_deleted)
            }
            ResolveOutcome::ReportAndContentRemoved { report: None, content_id, content_deleted } => {
                // The report row went with the post; confirm from what was committed.
                ResolvedReport {
                    report_id,
                    content_id,
                    status: ReportStatus::Removed,
                    moderator_id,
                    moderator_notes: notes,
                    resolved_at: resolution.resolved_at,
                    content_removed: content_deleted,
                }
            }
        };

        tracing::info!(
            report_id,
            moderator_id,
            action = %action,
            status = %resolved.status,
            content_removed = resolved.content_removed,
            "moderation action applied"
        );
        Ok(resolved)
    }

    /// Replace the notes on a resolved report
    ///
    /// Status, moderator and resolution time are left untouched.
    pub async fn amend_notes(
        &self,
        moderator_id: i64,
        report_id: i64,
        notes: Option<&str>,
    ) -> Result<Report> {
        require_moderator(self.store.as_ref(), moderator_id).await?;
        let notes = normalize_notes(notes)?;

        let report = self
            .store
            .find_report(report_id)
            .await?
            .ok_or_else(|| ModerationError::NotFound(format!("report {}", report_id)))?;
        if !report.status.is_terminal() {
            return Err(ModerationError::InvalidTransition(format!(
                "report {} is still pending",
                report_id
            )));
        }

        let amended = self.store.amend_notes(report_id, notes).await?.ok_or_else(|| {
            ModerationError::NotFound(format!("report {}", report_id))
        })?;

        tracing::debug!(report_id, moderator_id, "moderator notes amended");
        Ok(amended)
    }
}
