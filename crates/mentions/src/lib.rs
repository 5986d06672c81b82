//! Mention encoding for Threadline
//!
//! Converts `@username` tokens in authored text into stable identifier
//! references for storage, and renders them back with current usernames.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod resolver;

pub use codec::{
    degraded_render, DecodedText, EncodedText, MentionCodec, MentionError, DELETED_PLACEHOLDER,
};
pub use resolver::{DirectoryEntry, DirectoryError, MentionResolver, UserDirectory};
