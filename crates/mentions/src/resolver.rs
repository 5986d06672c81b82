//! Name and identifier resolution against the user directory

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// The user directory could not be reached
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Directory unavailable: {0}")]
pub struct DirectoryError(pub String);

/// A directory entry: stable identifier plus current username
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Stable user identifier
    pub id: i64,
    /// Username as it is right now
    pub username: String,
}

/// User directory collaborator
///
/// Lookups must be side-effect free. They return whatever is current at call
/// time; callers needing a consistent view within one operation memoize.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up a user by exact username
    async fn lookup_by_name(&self, name: &str) -> Result<Option<DirectoryEntry>, DirectoryError>;

    /// Look up a user by identifier
    async fn lookup_by_id(&self, id: i64) -> Result<Option<DirectoryEntry>, DirectoryError>;
}

/// Resolves mention names to identifiers and back
#[derive(Clone)]
pub struct MentionResolver {
    directory: Arc<dyn UserDirectory>,
}

impl MentionResolver {
    /// Create a resolver over a directory
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }

    /// Resolve a username to its identifier
    pub async fn resolve_by_name(&self, name: &str) -> Result<Option<i64>, DirectoryError> {
        Ok(self.directory.lookup_by_name(name).await?.map(|entry| entry.id))
    }

    /// Resolve an identifier to its current username
    pub async fn resolve_by_id(&self, id: i64) -> Result<Option<String>, DirectoryError> {
        Ok(self.directory.lookup_by_id(id).await?.map(|entry| entry.username))
    }

    /// Resolve every distinct name once
    pub async fn resolve_names<'a, I>(
        &self,
        names: I,
    ) -> Result<HashMap<&'a str, Option<i64>>, DirectoryError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut resolved = HashMap::new();
        for name in names {
            if resolved.contains_key(name) {
                continue;
            }
            let id = self.resolve_by_name(name).await?;
            tracing::debug!(name, ?id, "resolved mention name");
            resolved.insert(name, id);
        }
        Ok(resolved)
    }

    /// Resolve every distinct identifier once
    ///
    /// Repeated identifiers share one lookup, so a rename racing the call
    /// cannot render the same account two different ways.
    pub async fn resolve_ids<I>(&self, ids: I) -> Result<HashMap<i64, Option<String>>, DirectoryError>
    where
        I: IntoIterator<Item = i64>,
    {
        let mut resolved = HashMap::new();
        for id in ids {
            if resolved.contains_key(&id) {
                continue;
            }
            let username = self.resolve_by_id(id).await?;
            tracing::debug!(id, ?username, "resolved mention id");
            resolved.insert(id, username);
        }
        Ok(resolved)
    }
}
