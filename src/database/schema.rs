//! Database schema and migrations
//!
//! Tables are created idempotently; later schema additions land as
//! `ALTER TABLE ADD COLUMN` statements that tolerate the column already
//! existing, so a long-lived local database upgrades forward across app
//! versions without version bookkeeping.

use crate::error::Result;
use sqlx::sqlite::SqlitePool;

const CREATE_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        name TEXT,
        email TEXT,
        phone TEXT,
        password_hash TEXT,
        created_at INTEGER NOT NULL DEFAULT 0,
        updated_at INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS groups (
        id TEXT PRIMARY KEY,
        name TEXT,
        description TEXT,
        joined_at INTEGER NOT NULL DEFAULT 0,
        updated_at INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS notes (
        id TEXT PRIMARY KEY,
        local_id TEXT,
        server_id TEXT,
        title TEXT NOT NULL DEFAULT '',
        content TEXT NOT NULL DEFAULT '',
        color TEXT NOT NULL DEFAULT '',
        theme TEXT NOT NULL DEFAULT '',
        x INTEGER NOT NULL DEFAULT 0,
        y INTEGER NOT NULL DEFAULT 0,
        width INTEGER NOT NULL DEFAULT 0,
        height INTEGER NOT NULL DEFAULT 0,
        locked INTEGER NOT NULL DEFAULT 0,
        lock_password TEXT,
        alarm_enabled INTEGER NOT NULL DEFAULT 0,
        alarm_time INTEGER NOT NULL DEFAULT 0,
        deleted INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL DEFAULT 0,
        updated_at INTEGER NOT NULL DEFAULT 0,
        group_id TEXT NOT NULL DEFAULT '',
        recipient_id TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS note_images (
        id TEXT PRIMARY KEY,
        note_id TEXT NOT NULL,
        path TEXT,
        order_index INTEGER NOT NULL DEFAULT 0,
        duration INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS alarms (
        id TEXT PRIMARY KEY,
        note_id TEXT NOT NULL,
        alarm_at INTEGER NOT NULL DEFAULT 0,
        snooze_until INTEGER,
        is_enabled INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL DEFAULT 0,
        updated_at INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL DEFAULT ''
    )
    "#,
];

/// Initialize the database schema.
pub async fn initialize_database(pool: &SqlitePool) -> Result<()> {
    tracing::info!("Initializing database schema");

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    for statement in CREATE_STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }

    // Columns added after the initial release.
    ensure_column(pool, "users", "is_admin INTEGER NOT NULL DEFAULT 0").await?;
    ensure_column(pool, "notes", "author_id TEXT NOT NULL DEFAULT ''").await?;

    tracing::info!("Database initialization complete");
    Ok(())
}

/// Add a column if it does not exist yet. SQLite reports an existing column
/// as a "duplicate column name" error, which counts as success here.
async fn ensure_column(pool: &SqlitePool, table: &str, definition: &str) -> Result<()> {
    let sql = format!("ALTER TABLE {} ADD COLUMN {}", table, definition);
    match sqlx::query(&sql).execute(pool).await {
        Ok(_) => {
            tracing::info!("Added column to {}: {}", table, definition);
            Ok(())
        }
        Err(e) if e.to_string().contains("duplicate column") => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::Row;

    async fn connect_memory() -> SqlitePool {
        SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_initialize_creates_tables() {
        let pool = connect_memory().await;
        initialize_database(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN \
             ('users','groups','notes','note_images','alarms','settings')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(count, 6);
    }

    #[tokio::test]
    async fn test_initialize_is_rerunnable() {
        let pool = connect_memory().await;
        initialize_database(&pool).await.unwrap();
        // Second run hits every ALTER TABLE as "duplicate column".
        initialize_database(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_migrated_columns_present() {
        let pool = connect_memory().await;
        initialize_database(&pool).await.unwrap();

        let rows = sqlx::query("PRAGMA table_info(notes)")
            .fetch_all(&pool)
            .await
            .unwrap();
        let columns: Vec<String> = rows.iter().map(|r| r.get::<String, _>("name")).collect();
        assert!(columns.contains(&"author_id".to_string()));

        let rows = sqlx::query("PRAGMA table_info(users)")
            .fetch_all(&pool)
            .await
            .unwrap();
        let columns: Vec<String> = rows.iter().map(|r| r.get::<String, _>("name")).collect();
        assert!(columns.contains(&"is_admin".to_string()));
    }

    #[tokio::test]
    async fn test_ensure_column_tolerates_existing() {
        let pool = connect_memory().await;
        initialize_database(&pool).await.unwrap();

        ensure_column(&pool, "users", "is_admin INTEGER NOT NULL DEFAULT 0")
            .await
            .unwrap();
    }
}
