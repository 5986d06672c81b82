//! User directory backed by the users table

use async_trait::async_trait;
use mentions::{DirectoryEntry, DirectoryError, UserDirectory};
use std::sync::Arc;
use storage::{users, SqliteDatabase, UserRecord};

fn entry(user: UserRecord) -> DirectoryEntry {
    DirectoryEntry { id: user.id, username: user.username }
}

/// Resolves usernames and IDs against the live users table
#[derive(Clone)]
pub struct SqliteUserDirectory {
    db: Arc<SqliteDatabase>,
}

impl SqliteUserDirectory {
    /// Create a directory over a migrated database
    pub fn new(db: Arc<SqliteDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserDirectory for SqliteUserDirectory {
    async fn lookup_by_name(&self, name: &str) -> Result<Option<DirectoryEntry>, DirectoryError> {
        let mut conn = self
            .db
            .pool()
            .acquire()
            .await
            .map_err(|e| DirectoryError(e.to_string()))?;
        let user = users::find_by_username(&mut conn, name)
            .await
            .map_err(|e| DirectoryError(e.to_string()))?;
        Ok(user.map(entry))
    }

    async fn lookup_by_id(&self, id: i64) -> Result<Option<DirectoryEntry>, DirectoryError> {
        let mut conn = self
            .db
            .pool()
            .acquire()
            .await
            .map_err(|e| DirectoryError(e.to_string()))?;
        let user = users::find_by_id(&mut conn, id)
            .await
            .map_err(|e| DirectoryError(e.to_string()))?;
        Ok(user.map(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::NewUser;

    #[tokio::test]
    async fn test_lookups_follow_renames() {
        let db = Arc::new(storage::open_in_memory().await.unwrap());
        let mut conn = db.pool().acquire().await.unwrap();
        let alice = users::insert_user(&mut conn, &NewUser::new("alice")).await.unwrap();
        drop(conn);

        let directory = SqliteUserDirectory::new(db.clone());
        assert_eq!(
            directory.lookup_by_name("alice").await.unwrap(),
            Some(DirectoryEntry { id: alice.id, username: "alice".to_string() })
        );
        assert_eq!(directory.lookup_by_name("Alice").await.unwrap(), None);

        let mut conn = db.pool().acquire().await.unwrap();
        users::rename(&mut conn, alice.id, "alicia").await.unwrap();
        drop(conn);

        let found = directory.lookup_by_id(alice.id).await.unwrap().unwrap();
        assert_eq!(found.username, "alicia");
        assert_eq!(directory.lookup_by_name("alice").await.unwrap(), None);
        assert_eq!(directory.lookup_by_id(alice.id + 100).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_closed_pool_is_directory_error() {
        let db = Arc::new(storage::open_in_memory().await.unwrap());
        db.close().await;

        let directory = SqliteUserDirectory::new(db);
        assert!(directory.lookup_by_id(1).await.is_err());
    }
}
