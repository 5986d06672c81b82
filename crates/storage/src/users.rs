//! User rows
//!
//! The user table doubles as the directory behind mention resolution and as
//! the source of truth for moderator capability.

use crate::database::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::fmt;
use std::str::FromStr;

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Regular account
    User,
    /// Administrator, holds moderator capability
    Admin,
}

impl Role {
    /// Stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
        }
    }

    /// Whether this role may act on reports
    pub fn can_moderate(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl FromStr for Role {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "USER" => Ok(Self::User),
            "ADMIN" => Ok(Self::Admin),
            other => Err(DatabaseError::CorruptRow(format!("unknown role: {}", other))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// User ID
    pub id: i64,
    /// Unique username, the name used in `@mentions`
    pub username: String,
    /// Display name
    pub name: Option<String>,
    /// Email address
    pub email: Option<String>,
    /// Current role
    pub role: Role,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        let role: String = row.try_get("role")?;
        Ok(Self {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            role: role.parse()?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Fields for a new user
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    /// Username
    pub username: String,
    /// Display name
    pub name: Option<String>,
    /// Email address
    pub email: Option<String>,
}

impl NewUser {
    /// Create a new user with only a username
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }

    /// Set the email address
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

const USER_COLUMNS: &str = "id, username, name, email, role, created_at";

/// Insert a user
pub async fn insert_user(conn: &mut SqliteConnection, user: &NewUser) -> Result<UserRecord> {
    let id = sqlx::query(
        "INSERT INTO users (username, name, email, role, created_at) VALUES (?, ?, ?, 'USER', ?)",
    )
    .bind(&user.username)
    .bind(&user.name)
    .bind(&user.email)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    find_by_id(conn, id)
        .await?
        .ok_or_else(|| DatabaseError::CorruptRow(format!("user {} vanished after insert", id)))
}

/// Look up a user by ID
pub async fn find_by_id(conn: &mut SqliteConnection, id: i64) -> Result<Option<UserRecord>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(UserRecord::from_row).transpose()
}

/// Look up a user by exact username
pub async fn find_by_username(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<Option<UserRecord>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS))
        .bind(username)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(UserRecord::from_row).transpose()
}

/// Current role of a user, `None` if the user does not exist
pub async fn role_of(conn: &mut SqliteConnection, id: i64) -> Result<Option<Role>> {
    let role: Option<String> = sqlx::query_scalar("SELECT role FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    role.map(|r| r.parse()).transpose()
}

/// Change the role of the user with the given email
///
/// Returns the updated user, or `None` when no user has that email.
pub async fn set_role_by_email(
    conn: &mut SqliteConnection,
    email: &str,
    role: Role,
) -> Result<Option<UserRecord>> {
    let affected = sqlx::query("UPDATE users SET role = ? WHERE email = ?")
        .bind(role.as_str())
        .bind(email)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    if affected == 0 {
        return Ok(None);
    }

    let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
        .bind(email)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(UserRecord::from_row).transpose()
}

/// Change a user's username
pub async fn rename(conn: &mut SqliteConnection, id: i64, username: &str) -> Result<bool> {
    let affected = sqlx::query("UPDATE users SET username = ? WHERE id = ?")
        .bind(username)
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    Ok(affected > 0)
}

/// Delete a user and everything cascading from it
pub async fn delete_user(conn: &mut SqliteConnection, id: i64) -> Result<bool> {
    let affected = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    Ok(affected > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{schema, SqliteDatabase};

    async fn setup() -> SqliteDatabase {
        let db = SqliteDatabase::in_memory().await.unwrap();
        db.migrate(&schema::migrations()).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let alice = insert_user(&mut conn, &NewUser::new("alice").email("alice@example.com"))
            .await
            .unwrap();
        assert_eq!(alice.role, Role::User);

        let by_name = find_by_username(&mut conn, "alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, alice.id);
        assert!(find_by_username(&mut conn, "Alice").await.unwrap().is_none());
        assert!(find_by_id(&mut conn, alice.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_role_changes() {
        let db = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let bob = insert_user(&mut conn, &NewUser::new("bob").email("bob@example.com"))
            .await
            .unwrap();
        assert_eq!(role_of(&mut conn, bob.id).await.unwrap(), Some(Role::User));

        let updated = set_role_by_email(&mut conn, "bob@example.com", Role::Admin)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.role, Role::Admin);
        assert!(updated.role.can_moderate());

        assert!(set_role_by_email(&mut conn, "nobody@example.com", Role::Admin)
            .await
            .unwrap()
            .is_none());
        assert_eq!(role_of(&mut conn, 999).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rename() {
        let db = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let carol = insert_user(&mut conn, &NewUser::new("carol")).await.unwrap();
        assert!(rename(&mut conn, carol.id, "caroline").await.unwrap());
        assert!(find_by_username(&mut conn, "carol").await.unwrap().is_none());
        assert_eq!(
            find_by_id(&mut conn, carol.id).await.unwrap().unwrap().username,
            "caroline"
        );
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("USER".parse::<Role>().unwrap(), Role::User);
        assert!("admin".parse::<Role>().is_err());
        assert!(!Role::User.can_moderate());
    }
}
