//! Content reporting functionality
//!
//! This module covers the viewer side of moderation: flagging a post, and the
//! moderator's paged view over the resulting report queue.
//!
//! # Overview
//!
//! - A viewer files a report with a free-text reason. The report starts out
//!   [`ReportStatus::Pending`].
//! - A viewer may hold at most one pending report per post. A second flag by
//!   the same viewer on the same post is rejected, not merged.
//! - Moderators list reports newest first, optionally filtered by status.
//!
//! # Example
//!
//! ```rust,no_run
//! use moderation::reporting::{ReportFilter, ReportService, ReportStatus};
//! use moderation::store::SqliteReportStore;
//! use std::sync::Arc;
//!
//! # async fn example(db: Arc<storage::SqliteDatabase>) -> Result<(), Box<dyn std::error::Error>> {
//! let service = ReportService::new(Arc::new(SqliteReportStore::new(db)));
//!
//! let report_id = service.file_report(2, 10, "Spam link farm").await?;
//!
//! let page = service
//!     .list_reports(1, &ReportFilter::default().status(ReportStatus::Pending))
//!     .await?;
//! println!("{} pending, first is #{}", page.total_count, report_id);
//! # Ok(())
//! # }
//! ```

use crate::engine::require_moderator;
use crate::error::{ModerationError, Result};
use crate::store::ReportStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Maximum length for a report reason (in characters)
pub const MAX_REASON_LENGTH: usize = 2000;

/// Page size used when the caller does not pick one
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest page size a caller may request
pub const MAX_PAGE_SIZE: u32 = 100;

// ============================================================================
// Status and Action Types
// ============================================================================

/// Lifecycle state of a report
///
/// `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    /// Awaiting a moderator
    Pending,
    /// Looked at, content kept
    Reviewed,
    /// Report rejected
    Dismissed,
    /// Content removed
    Removed,
}

impl ReportStatus {
    /// Stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Reviewed => "REVIEWED",
            Self::Dismissed => "DISMISSED",
            Self::Removed => "REMOVED",
        }
    }

    /// Whether no further transitions are defined
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Parse the stored representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "REVIEWED" => Some(Self::Reviewed),
            "DISMISSED" => Some(Self::Dismissed),
            "REMOVED" => Some(Self::Removed),
            _ => None,
        }
    }
}

impl FromStr for ReportStatus {
    type Err = ModerationError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(&s.to_ascii_uppercase())
            .ok_or_else(|| ModerationError::Validation(format!("unknown report status: {}", s)))
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transition a moderator may request on a pending report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationAction {
    /// Mark reviewed, keep the content
    Review,
    /// Reject the report
    Dismiss,
    /// Remove the reported content
    Remove,
}

impl ModerationAction {
    /// Action name as submitted by clients
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Review => "review",
            Self::Dismiss => "dismiss",
            Self::Remove => "remove",
        }
    }

    /// Terminal status this action moves a report to
    pub fn target_status(&self) -> ReportStatus {
        match self {
            Self::Review => ReportStatus::Reviewed,
            Self::Dismiss => ReportStatus::Dismissed,
            Self::Remove => ReportStatus::Removed,
        }
    }

    /// Whether the action deletes the reported content
    pub fn removes_content(&self) -> bool {
        matches!(self, Self::Remove)
    }
}

impl FromStr for ModerationAction {
    type Err = ModerationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "review" => Ok(Self::Review),
            "dismiss" => Ok(Self::Dismiss),
            // Older clients still send the original name
            "remove" | "block_post" => Ok(Self::Remove),
            other => Err(ModerationError::Validation(format!("invalid action: {}", other))),
        }
    }
}

impl fmt::Display for ModerationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Report Types
// ============================================================================

/// A report row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Report ID
    pub id: i64,
    /// Reported post, by ID
    pub content_id: i64,
    /// Who filed the report
    pub reporter_id: i64,
    /// Free-text reason
    pub reason: String,
    /// Lifecycle state
    pub status: ReportStatus,
    /// Moderator who resolved it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderator_id: Option<i64>,
    /// Moderator notes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderator_notes: Option<String>,
    /// When it was resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    /// When it was filed
    pub created_at: DateTime<Utc>,
}

/// Fields for a new report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReport {
    /// Reported post
    pub content_id: i64,
    /// Reporter
    pub reporter_id: i64,
    /// Validated, trimmed reason
    pub reason: String,
}

/// Filter and paging for the report queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportFilter {
    /// Only reports in this status, or all
    pub status: Option<ReportStatus>,
    /// 1-based page number
    pub page: u32,
    /// Reports per page
    pub page_size: u32,
}

impl Default for ReportFilter {
    fn default() -> Self {
        Self { status: None, page: 1, page_size: DEFAULT_PAGE_SIZE }
    }
}

impl ReportFilter {
    /// Restrict to one status
    pub fn status(mut self, status: ReportStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Select a page
    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Set the page size
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Rows to skip
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// One page of the report queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPage {
    /// Reports on this page, newest first
    pub items: Vec<Report>,
    /// Reports matching the filter across all pages
    pub total_count: u64,
    /// Page number
    pub page: u32,
    /// Page size
    pub page_size: u32,
    /// Number of pages
    pub pages: u64,
}

// ============================================================================
// Report Service
// ============================================================================

/// Service for filing and listing reports
#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn ReportStore>,
    max_page_size: u32,
}

impl ReportService {
    /// Create a new report service
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self { store, max_page_size: MAX_PAGE_SIZE }
    }

    /// Override the largest page size callers may request
    pub fn with_max_page_size(mut self, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }

    /// File a report against a post
    ///
    /// # Returns
    ///
    /// The new report's ID
    ///
    /// # Errors
    ///
    /// - `ModerationError::Validation` - empty or overlong reason
    /// - `ModerationError::NotFound` - unknown reporter or post
    /// - `ModerationError::InvalidTransition` - the reporter already has a
    ///   pending report on this post
    pub async fn file_report(&self, actor_id: i64, content_id: i64, reason: &str) -> Result<i64> {
        let reason = validate_reason(reason)?;

        if self.store.user_role(actor_id).await?.is_none() {
            return Err(ModerationError::NotFound(format!("user {}", actor_id)));
        }
        let report = self
            .store
            .insert_report(NewReport { content_id, reporter_id: actor_id, reason })
            .await?;

        tracing::info!(report_id = report.id, content_id, reporter_id = actor_id, "report filed");
        Ok(report.id)
    }

    /// List reports for a moderator
    ///
    /// # Errors
    ///
    /// - `ModerationError::Forbidden` - caller is not a moderator
    /// - `ModerationError::Validation` - page is 0 or page size out of range
    pub async fn list_reports(&self, moderator_id: i64, filter: &ReportFilter) -> Result<ReportPage> {
        require_moderator(self.store.as_ref(), moderator_id).await?;

        if filter.page == 0 {
            return Err(ModerationError::Validation("page must be at least 1".to_string()));
        }
        if filter.page_size == 0 || filter.page_size > self.max_page_size {
            return Err(ModerationError::Validation(format!(
                "page size must be between 1 and {}",
                self.max_page_size
            )));
        }

        let (items, total_count) = self
            .store
            .list_reports(filter.status, filter.offset(), filter.page_size)
            .await?;

        Ok(ReportPage {
            items,
            total_count,
            page: filter.page,
            page_size: filter.page_size,
            pages: total_count.div_ceil(u64::from(filter.page_size)),
        })
    }

    /// Fetch a single report for a moderator
    pub async fn get_report(&self, moderator_id: i64, report_id: i64) -> Result<Report> {
        require_moderator(self.store.as_ref(), moderator_id).await?;
        self.store
            .find_report(report_id)
            .await?
            .ok_or_else(|| ModerationError::NotFound(format!("report {}", report_id)))
    }
}

/// Trim and bound a report reason
fn validate_reason(reason: &str) -> Result<String> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ModerationError::Validation("reason is required".to_string()));
    }
    let len = reason.chars().count();
    if len > MAX_REASON_LENGTH {
        return Err(ModerationError::Validation(format!(
            "reason too long: {} characters (max {})",
            len, MAX_REASON_LENGTH
        )));
    }
    Ok(reason.to_string())
}

// ============================================================================
// Tests
// ============================================================================
