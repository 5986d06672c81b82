//! Storage layer for Threadline
//!
//! This crate provides the SQLite pool, schema migrations, and row-level
//! access to users, posts, and attached media.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod database;
pub mod posts;
pub mod schema;
pub mod users;

pub use database::{
    DatabaseConfig, DatabaseError, MigrationDefinition, Result, SqliteDatabase, SynchronousMode,
};
pub use posts::{MediaAttachment, MediaType, PostRecord};
pub use users::{NewUser, Role, UserRecord};

/// Open a database and bring its schema up to date
pub async fn open(config: DatabaseConfig) -> Result<SqliteDatabase> {
    let db = SqliteDatabase::new(config).await?;
    db.migrate(&schema::migrations()).await?;
    Ok(db)
}

/// Open a migrated in-memory database
pub async fn open_in_memory() -> Result<SqliteDatabase> {
    let db = SqliteDatabase::in_memory().await?;
    db.migrate(&schema::migrations()).await?;
    Ok(db)
}
