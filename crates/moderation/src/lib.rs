//! Content moderation for Threadline
//!
//! This crate handles report filing, the moderator's report queue, and the
//! moderation actions that resolve reports.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod engine;
pub mod error;
pub mod reporting;
pub mod store;

pub use engine::{ModerationEngine, ResolvedReport};
pub use error::{ModerationError, Result};
pub use reporting::{
    ModerationAction, NewReport, Report, ReportFilter, ReportPage, ReportService, ReportStatus,
};
pub use store::{ReportStore, Resolution, ResolveOutcome, SqliteReportStore};
