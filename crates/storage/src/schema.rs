//! Schema migrations for the threadline database

use crate::database::MigrationDefinition;

/// All schema migrations, in version order
pub fn migrations() -> Vec<MigrationDefinition> {
    vec![
        MigrationDefinition::new(
            1,
            "Create users",
            "CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                name TEXT,
                email TEXT UNIQUE,
                role TEXT NOT NULL DEFAULT 'USER',
                created_at TEXT NOT NULL
            )",
        ),
        MigrationDefinition::new(
            2,
            "Create posts",
            "CREATE TABLE posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        ),
        MigrationDefinition::new(
            3,
            "Create visual media",
            "CREATE TABLE visual_media (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                media_type TEXT NOT NULL,
                file_name TEXT NOT NULL
            )",
        ),
        // Reports reference posts by id only: a REMOVED report outlives its post.
        MigrationDefinition::new(
            4,
            "Create post reports",
            "CREATE TABLE post_reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id INTEGER NOT NULL,
                reporter_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                reason TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'PENDING',
                moderator_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
                moderator_notes TEXT,
                resolved_at TEXT,
                created_at TEXT NOT NULL
            )",
        ),
        MigrationDefinition::new(
            5,
            "One pending report per reporter and post",
            "CREATE UNIQUE INDEX idx_post_reports_pending
                ON post_reports (post_id, reporter_id)
                WHERE status = 'PENDING'",
        ),
        MigrationDefinition::new(
            6,
            "Index reports by status",
            "CREATE INDEX idx_post_reports_status ON post_reports (status, created_at)",
        ),
        MigrationDefinition::new(
            7,
            "Create activities",
            "CREATE TABLE activities (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                source_user_id INTEGER NOT NULL,
                source_id INTEGER NOT NULL,
                target_user_id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (kind, source_id, target_user_id)
            )",
        ),
        MigrationDefinition::new(
            8,
            "Drop mention activities with their post",
            "CREATE TRIGGER trg_posts_delete_activities AFTER DELETE ON posts
             BEGIN
                DELETE FROM activities
                WHERE kind = 'POST_MENTION' AND source_id = OLD.id;
             END",
        ),
    ]
}
