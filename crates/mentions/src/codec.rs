//! Mention encoding between display form and storage form
//!
//! Display text carries human-readable `@username` tokens. Storage text carries
//! `@{<id>}` references instead, so a rename never rewrites stored content and
//! decoding always renders the account's current username.
//!
//! The storage reference opens with `@{`, which the username grammar can never
//! produce, so a display scan never mistakes a reference for a mention. A literal
//! `@{` typed by an author is stored as `@{{` and restored on decode.
//!
//! # Example
//!
//! ```rust,no_run
//! use mentions::{MentionCodec, MentionResolver, UserDirectory};
//! use std::sync::Arc;
//!
//! # async fn example(directory: Arc<dyn UserDirectory>) -> Result<(), Box<dyn std::error::Error>> {
//! let codec = MentionCodec::new(MentionResolver::new(directory));
//!
//! let encoded = codec.encode("thanks @alice!").await?;
//! // encoded.text == "thanks @{42}!"
//!
//! let decoded = codec.decode(&encoded.text).await?;
//! assert_eq!(decoded.text, "thanks @alice!");
//! # Ok(())
//! # }
//! ```

use crate::resolver::{DirectoryError, MentionResolver};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Range;
use std::sync::OnceLock;
use thiserror::Error;

/// Minimum username length recognised as a mention
pub const MIN_NAME_LENGTH: usize = 1;

/// Maximum username length recognised as a mention
pub const MAX_NAME_LENGTH: usize = 30;

/// Rendered in place of a reference whose account no longer exists
pub const DELETED_PLACEHOLDER: &str = "@[deleted]";

const REFERENCE_OPEN: &str = "@{";
const REFERENCE_CLOSE: char = '}';
const ESCAPED_OPEN: &str = "@{{";

/// Errors that can occur while encoding or decoding
#[derive(Debug, Error)]
pub enum MentionError {
    /// Stored text holds a reference that cannot be parsed
    #[error("Corrupt content at byte {offset}: {reason}")]
    CorruptContent {
        /// Byte offset of the offending reference
        offset: usize,
        /// What was wrong with it
        reason: String,
    },

    /// The user directory failed
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Result type for mention operations
pub type Result<T> = std::result::Result<T, MentionError>;

/// Storage-form text plus the accounts it references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedText {
    /// Text in storage form
    pub text: String,
    /// Resolved identifiers, first occurrence order, no duplicates
    pub mentioned_ids: Vec<i64>,
}

/// Display-form text plus the accounts that resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedText {
    /// Text in display form
    pub text: String,
    /// Identifiers that resolved to a live account, first occurrence order, no duplicates
    pub mentioned_ids: Vec<i64>,
}

/// A token found while scanning display text
#[derive(Debug, Clone, PartialEq, Eq)]
enum DisplayToken<'a> {
    /// `@name`, range covers the marker
    Mention { range: Range<usize>, name: &'a str },
    /// A literal `@{` that must be escaped
    LiteralOpen { range: Range<usize> },
}

/// A piece of parsed storage text
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Reference(i64),
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Scan display text for mention candidates and literal reference openers
///
/// Matches are taken left to right without overlap. A candidate preceded by a
/// name character (`bob@example`) or outside the length bounds stays plain text.
fn scan_display(text: &str) -> Vec<DisplayToken<'_>> {
    static TOKEN_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = TOKEN_REGEX.get_or_init(|| {
        Regex::new(r"@(?:([A-Za-z0-9_]+)|\{)").expect("mention token regex is valid")
    });

    let mut tokens = Vec::new();

    for cap in re.captures_iter(text) {
        let Some(whole) = cap.get(0) else { continue };

        let Some(name) = cap.get(1) else {
            tokens.push(DisplayToken::LiteralOpen { range: whole.range() });
            continue;
        };

        let preceded_by_name = text[..whole.start()].chars().next_back().is_some_and(is_name_char);
        let len = name.as_str().len();
        if preceded_by_name || !(MIN_NAME_LENGTH..=MAX_NAME_LENGTH).contains(&len) {
            continue;
        }

        tokens.push(DisplayToken::Mention { range: whole.range(), name: name.as_str() });
    }

    tokens
}

/// Parse the reference starting at `start`, returning its id and end offset
fn parse_reference(text: &str, start: usize) -> Result<(i64, usize)> {
    let body_start = start + REFERENCE_OPEN.len();
    let Some(close) = text[body_start..].find(REFERENCE_CLOSE) else {
        return Err(MentionError::CorruptContent {
            offset: start,
            reason: "unterminated mention reference".to_string(),
        });
    };
    let body = &text[body_start..body_start + close];

    if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MentionError::CorruptContent {
            offset: start,
            reason: format!("invalid mention identifier {:?}", body),
        });
    }
    let id = body.parse::<i64>().map_err(|e| MentionError::CorruptContent {
        offset: start,
        reason: e.to_string(),
    })?;

    Ok((id, body_start + close + REFERENCE_CLOSE.len_utf8()))
}

/// Parse storage text into literal spans and references
fn parse_storage(text: &str) -> Result<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    while let Some(found) = text[cursor..].find(REFERENCE_OPEN) {
        let start = cursor + found;
        if start > cursor {
            segments.push(Segment::Text(&text[cursor..start]));
        }

        if text[start..].starts_with(ESCAPED_OPEN) {
            segments.push(Segment::Text(&text[start..start + REFERENCE_OPEN.len()]));
            cursor = start + ESCAPED_OPEN.len();
            continue;
        }

        let (id, end) = parse_reference(text, start)?;
        segments.push(Segment::Reference(id));
        cursor = end;
    }

    if cursor < text.len() {
        segments.push(Segment::Text(&text[cursor..]));
    }

    Ok(segments)
}

/// Render stored text without consulting the directory
///
/// Fallback for content that [`MentionCodec::decode`] rejects as corrupt.
/// Well-formed references render as [`DELETED_PLACEHOLDER`]; from the first
/// malformed reference on, the text is shown as stored.
pub fn degraded_render(storage_text: &str) -> String {
    let mut text = String::with_capacity(storage_text.len());
    let mut cursor = 0;

    while let Some(found) = storage_text[cursor..].find(REFERENCE_OPEN) {
        let start = cursor + found;
        text.push_str(&storage_text[cursor..start]);

        if storage_text[start..].starts_with(ESCAPED_OPEN) {
            text.push_str(REFERENCE_OPEN);
            cursor = start + ESCAPED_OPEN.len();
            continue;
        }

        match parse_reference(storage_text, start) {
            Ok((_, end)) => {
                text.push_str(DELETED_PLACEHOLDER);
                cursor = end;
            }
            Err(_) => {
                cursor = start;
                break;
            }
        }
    }

    text.push_str(&storage_text[cursor..]);
    text
}

/// Push an id if it has not been seen
fn push_unique(ids: &mut Vec<i64>, seen: &mut HashSet<i64>, id: i64) {
    if seen.insert(id) {
        ids.push(id);
    }
}

/// Bidirectional mention codec
#[derive(Clone)]
pub struct MentionCodec {
    resolver: MentionResolver,
}

impl MentionCodec {
    /// Create a codec backed by a resolver
    pub fn new(resolver: MentionResolver) -> Self {
        Self { resolver }
    }

    /// Rewrite display text into storage form
    ///
    /// Known usernames become references. Unknown ones stay as literal text.
    /// Only pass display text here: stored text is never re-encoded.
    ///
    /// # Errors
    ///
    /// - `MentionError::Directory` - the directory could not be queried
    pub async fn encode(&self, display_text: &str) -> Result<EncodedText> {
        let tokens = scan_display(display_text);
        if tokens.is_empty() {
            return Ok(EncodedText { text: display_text.to_string(), mentioned_ids: Vec::new() });
        }

        let names = tokens.iter().filter_map(|token| match token {
            DisplayToken::Mention { name, .. } => Some(*name),
            DisplayToken::LiteralOpen { .. } => None,
        });
        let resolved = self.resolver.resolve_names(names).await?;

        let mut text = String::with_capacity(display_text.len());
        let mut mentioned_ids = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor = 0;

        for token in &tokens {
            match token {
                DisplayToken::LiteralOpen { range } => {
                    text.push_str(&display_text[cursor..range.start]);
                    text.push_str(ESCAPED_OPEN);
                    cursor = range.end;
                }
                DisplayToken::Mention { range, name } => {
                    if let Some(Some(id)) = resolved.get(name) {
                        text.push_str(&display_text[cursor..range.start]);
                        text.push_str(REFERENCE_OPEN);
                        text.push_str(&id.to_string());
                        text.push(REFERENCE_CLOSE);
                        cursor = range.end;
                        push_unique(&mut mentioned_ids, &mut seen, *id);
                    }
                }
            }
        }
        text.push_str(&display_text[cursor..]);

        Ok(EncodedText { text, mentioned_ids })
    }

    /// Rewrite storage text into display form
    ///
    /// Each reference renders the account's current username. References to
    /// accounts that no longer exist render as [`DELETED_PLACEHOLDER`].
    ///
    /// # Errors
    ///
    /// - `MentionError::CorruptContent` - a reference is malformed
    /// - `MentionError::Directory` - the directory could not be queried
    pub async fn decode(&self, storage_text: &str) -> Result<DecodedText> {
        let segments = parse_storage(storage_text)?;

        let ids = segments.iter().filter_map(|segment| match segment {
            Segment::Reference(id) => Some(*id),
            Segment::Text(_) => None,
        });
        let resolved = self.resolver.resolve_ids(ids).await?;

        let mut text = String::with_capacity(storage_text.len());
        let mut mentioned_ids = Vec::new();
        let mut seen = HashSet::new();

        for segment in &segments {
            match segment {
                Segment::Text(span) => text.push_str(span),
                Segment::Reference(id) => match resolved.get(id) {
                    Some(Some(username)) => {
                        text.push('@');
                        text.push_str(username);
                        push_unique(&mut mentioned_ids, &mut seen, *id);
                    }
                    _ => text.push_str(DELETED_PLACEHOLDER),
                },
            }
        }

        Ok(DecodedText { text, mentioned_ids })
    }
}
