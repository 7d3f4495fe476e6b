//! Table creation and the additive migration guard.
//!
//! `init_schema` is safe to run on every process start against either the
//! primary or the replica file: table creation is `IF NOT EXISTS` and the
//! embedding migration is detection-then-act. Columns are only ever
//! added, never dropped or renamed.

use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::error::StoreError;

/// Tables a usable database must carry. The replica verifier checks for
/// exactly these before trusting a snapshot file.
pub(crate) const REQUIRED_TABLES: [&str; 3] = ["users", "blobs", "blob_likes"];

pub(crate) async fn init_schema(pool: &SqlitePool) -> Result<(), StoreError> {
    create_tables(pool).await?;
    migrate(pool).await?;
    // Depends on the embedding column, so it must follow the migration
    // when opening a pre-embedding database. Partial index keeps the
    // backfill scan cheap; most rows have an embedding once the backfill
    // has run.
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_blobs_missing_embedding
         ON blobs(id) WHERE embedding IS NULL",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_tables(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            user_id INTEGER PRIMARY KEY,
            username TEXT,
            first_name TEXT,
            last_name TEXT,
            created_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS blobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            content_type TEXT NOT NULL,
            content TEXT NOT NULL,
            file_path TEXT NOT NULL DEFAULT '',
            is_public INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            summary TEXT,
            embedding BLOB,
            FOREIGN KEY (user_id) REFERENCES users(user_id)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS blob_likes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            blob_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (blob_id) REFERENCES blobs(id),
            FOREIGN KEY (user_id) REFERENCES users(user_id),
            UNIQUE(blob_id, user_id)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_blobs_owner_time
         ON blobs(user_id, created_at DESC)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_blobs_public_time
         ON blobs(created_at DESC) WHERE is_public = 1",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_likes_blob ON blob_likes(blob_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Add the embedding column to databases created before it existed.
///
/// Failure is fatal to startup: every downstream search depends on the
/// column being present.
pub(crate) async fn migrate(pool: &SqlitePool) -> Result<(), StoreError> {
    let columns = sqlx::query("PRAGMA table_info(blobs)")
        .fetch_all(pool)
        .await?;
    let has_embedding = columns
        .iter()
        .any(|row| row.get::<String, _>("name") == "embedding");

    if !has_embedding {
        info!("Migrating blobs table to add embedding column");
        sqlx::query("ALTER TABLE blobs ADD COLUMN embedding BLOB")
            .execute(pool)
            .await
            .map_err(|e| StoreError::Schema(e.to_string()))?;
        info!("Successfully added embedding column");
    }

    Ok(())
}

/// Whether the database carries every table in [`REQUIRED_TABLES`].
pub(crate) async fn has_expected_tables(pool: &SqlitePool) -> Result<bool, StoreError> {
    let rows = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table'")
        .fetch_all(pool)
        .await?;
    let names: Vec<String> = rows.iter().map(|row| row.get("name")).collect();
    Ok(REQUIRED_TABLES
        .iter()
        .all(|table| names.iter().any(|name| name == table)))
}
