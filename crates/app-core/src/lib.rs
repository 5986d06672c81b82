//! Core application logic for Threadline
//!
//! This crate wires the mention codec into post authoring: the user directory
//! backing mention resolution, the post service, and mention activity.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod directory;
pub mod notifications;
pub mod posts;

pub use directory::SqliteUserDirectory;
pub use notifications::{
    Activity, ActivityKind, ActivityNotifier, MentionActivity, NotificationError, SqliteActivityLog,
};
pub use posts::{media_from_file_name, PostDraft, PostError, PostResult, PostService, PostView};
