//! SQLite-backed persistent store for users, blobs, and likes.
//!
//! One `BlobStore` serves both front ends. Writes and owner-consistent
//! reads go through the primary connection pool; staleness-tolerant reads
//! (public browsing, keyword search, similarity candidates) are routed at
//! the replica snapshot when one is attached, over a short-lived
//! read-only connection per call so a snapshot replace never leaves a
//! pooled handle on a stale file.

pub(crate) mod schema;


use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePoolOptions, SqliteRow};
use sqlx::{ConnectOptions, Row, SqlitePool};
use tracing::{debug, info, warn};

use crate::embedding::binary::encode_embedding;
use crate::error::StoreError;
use crate::types::{Blob, PublicBlob, SearchScope, User, VisibilityFilter};

/// An embedded row pulled for similarity scoring. The raw blob is decoded
/// by the ranker so an undecodable row can be skipped, not fatal.
#[derive(Debug)]
pub(crate) struct Candidate {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    pub content_type: String,
    pub summary: Option<String>,
    pub embedding: Vec<u8>,
}

pub struct BlobStore {
    pool: SqlitePool,
    db_path: PathBuf,
    replica_path: Option<PathBuf>,
}

impl BlobStore {
    /// Open (creating if missing) the primary store and run the schema
    /// guard. A schema failure here must abort startup.
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let opts = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;

        schema::init_schema(&pool).await?;
        info!("Store opened at {}", db_path.display());

        Ok(Self {
            pool,
            db_path,
            replica_path: None,
        })
    }

    /// Route staleness-tolerant reads at this replica file. Reads fall
    /// back to the primary until the file exists (first sync pending).
    pub fn with_replica(mut self, path: impl Into<PathBuf>) -> Self {
        self.replica_path = Some(path.into());
        self
    }

    pub(crate) fn primary_path(&self) -> &Path {
        &self.db_path
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Flush the WAL into the main database file so a file-level snapshot
    /// carries every committed write.
    pub(crate) async fn checkpoint(&self) -> Result<(), StoreError> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// A fresh read-only connection to the replica, or None when no
    /// replica is attached or usable yet.
    async fn replica_conn(&self) -> Option<SqliteConnection> {
        let path = self.replica_path.as_ref()?;
        if !path.exists() {
            return None;
        }
        let opts = SqliteConnectOptions::new().filename(path).read_only(true);
        match opts.connect().await {
            Ok(conn) => Some(conn),
            Err(e) => {
                warn!(error = %e, "Replica connection failed, falling back to primary");
                None
            }
        }
    }

    // ==================== Users ====================

    /// Insert the user if absent; a single atomic statement, no
    /// check-then-write race. Display names are deliberately not
    /// refreshed on repeat contact — the first-seen values stick.
    pub async fn ensure_user(
        &self,
        user_id: i64,
        username: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<i64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO users (user_id, username, first_name, last_name, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(username)
        .bind(first_name)
        .bind(last_name)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            info!(user_id, "Created new user record");
        }
        Ok(user_id)
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            "SELECT user_id, username, first_name, last_name, created_at
             FROM users WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| User {
            user_id: row.get("user_id"),
            username: row.get("username"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            created_at: parse_timestamp(&row.get::<String, _>("created_at")),
        }))
    }

    // ==================== Blobs ====================

    /// Store a new item, private by default. The owner must already
    /// exist; the store never auto-creates users.
    pub async fn create_blob(
        &self,
        user_id: i64,
        content_type: &str,
        content: &str,
        file_path: Option<&str>,
        embedding: Option<&[f32]>,
    ) -> Result<i64, StoreError> {
        let encoded = embedding.map(encode_embedding);
        if encoded.is_none() {
            debug!(user_id, content_type, "Storing blob without an embedding");
        }

        let result = sqlx::query(
            "INSERT INTO blobs (user_id, content_type, content, file_path, is_public, created_at, embedding)
             VALUES (?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(user_id)
        .bind(content_type)
        .bind(content)
        .bind(file_path.unwrap_or(""))
        .bind(Utc::now().to_rfc3339())
        .bind(encoded)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_fk_violation(&e) {
                StoreError::UnknownUser(user_id)
            } else {
                StoreError::Database(e)
            }
        })?;

        let blob_id = result.last_insert_rowid();
        info!(blob_id, user_id, content_type, "Stored blob");
        Ok(blob_id)
    }

    /// Attach the asynchronously produced summary. A missing id is a
    /// silent no-op; callers must not treat this as an existence check.
    pub async fn attach_summary(&self, blob_id: i64, summary: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE blobs SET summary = ? WHERE id = ?")
            .bind(summary)
            .bind(blob_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Attach an embedding vector. A missing id is a silent no-op.
    pub async fn attach_embedding(
        &self,
        blob_id: i64,
        embedding: &[f32],
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE blobs SET embedding = ? WHERE id = ?")
            .bind(encode_embedding(embedding))
            .bind(blob_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Flip an item's public flag. One conditional UPDATE keyed on both
    /// id and owner, so an unauthorized caller can never race the check;
    /// zero matched rows means not-found-or-not-yours, undistinguished.
    pub async fn set_visibility(
        &self,
        blob_id: i64,
        is_public: bool,
        actor_user_id: i64,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE blobs SET is_public = ? WHERE id = ? AND user_id = ?")
            .bind(is_public)
            .bind(blob_id)
            .bind(actor_user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            warn!(blob_id, actor_user_id, "Visibility change rejected");
            return Err(StoreError::PermissionDenied);
        }
        info!(blob_id, is_public, "Updated blob visibility");
        Ok(())
    }

    /// Items visible to `user_id`: their own plus all public ones,
    /// optionally restricted to one side of the partition. Newest first.
    /// Reads the primary — an owner listing right after a write must see
    /// that write.
    pub async fn list_blobs_for(
        &self,
        user_id: i64,
        filter: Option<VisibilityFilter>,
    ) -> Result<Vec<Blob>, StoreError> {
        let rows = match filter {
            None => {
                sqlx::query(&format!(
                    "{BLOB_SELECT}
                     WHERE b.user_id = ? OR b.is_public = 1
                     ORDER BY b.created_at DESC, b.id DESC"
                ))
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
            Some(f) => {
                sqlx::query(&format!(
                    "{BLOB_SELECT}
                     WHERE (b.user_id = ? OR b.is_public = 1) AND b.is_public = ?
                     ORDER BY b.created_at DESC, b.id DESC"
                ))
                .bind(user_id)
                .bind(f == VisibilityFilter::Public)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.iter().map(row_to_blob).collect())
    }

    /// Fetch one item. Visibility is enforced in the query predicate
    /// itself (owner or public), so a forgotten application-level check
    /// can never leak a private row; a filtered-out item reads as
    /// not-found.
    pub async fn get_blob(
        &self,
        blob_id: i64,
        requesting_user_id: i64,
    ) -> Result<Blob, StoreError> {
        let row = sqlx::query(&format!(
            "{BLOB_SELECT}
             WHERE b.id = ? AND (b.user_id = ? OR b.is_public = 1)"
        ))
        .bind(blob_id)
        .bind(requesting_user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_blob).ok_or(StoreError::NotFound)
    }

    /// Rows awaiting an embedding, as (id, content, content_type).
    pub async fn blobs_missing_embedding(
        &self,
    ) -> Result<Vec<(i64, String, String)>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, content, content_type FROM blobs
             WHERE embedding IS NULL ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get("id"), row.get("content"), row.get("content_type")))
            .collect())
    }

    // ==================== Similarity candidates ====================

    /// Embedded rows for one search scope. Tolerates replica staleness.
    pub(crate) async fn search_candidates(
        &self,
        user_id: i64,
        scope: SearchScope,
    ) -> Result<Vec<Candidate>, StoreError> {
        match self.replica_conn().await {
            Some(mut conn) => fetch_candidates(&mut conn, user_id, scope).await,
            None => fetch_candidates(&self.pool, user_id, scope).await,
        }
    }

    /// The stored embedding of one public item, when both exist.
    pub(crate) async fn public_blob_embedding(
        &self,
        blob_id: i64,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        match self.replica_conn().await {
            Some(mut conn) => fetch_public_embedding(&mut conn, blob_id).await,
            None => fetch_public_embedding(&self.pool, blob_id).await,
        }
    }

    /// Embedded public items other than `blob_id`, paired with their raw
    /// embeddings for similar-item scoring.
    pub(crate) async fn public_candidates_excluding(
        &self,
        blob_id: i64,
    ) -> Result<Vec<(PublicBlob, Vec<u8>)>, StoreError> {
        match self.replica_conn().await {
            Some(mut conn) => fetch_public_candidates(&mut conn, blob_id).await,
            None => fetch_public_candidates(&self.pool, blob_id).await,
        }
    }

    // ==================== Public browsing ====================

    /// Paginated public timeline, newest first. `page` is 1-based.
    pub async fn public_blobs(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<PublicBlob>, StoreError> {
        let limit = per_page as i64;
        let offset = (page.max(1) as i64 - 1) * limit;
        match self.replica_conn().await {
            Some(mut conn) => fetch_public_page(&mut conn, limit, offset).await,
            None => fetch_public_page(&self.pool, limit, offset).await,
        }
    }

    /// One public item; None when it does not exist or is private.
    pub async fn public_blob_by_id(
        &self,
        blob_id: i64,
    ) -> Result<Option<PublicBlob>, StoreError> {
        match self.replica_conn().await {
            Some(mut conn) => fetch_public_by_id(&mut conn, blob_id).await,
            None => fetch_public_by_id(&self.pool, blob_id).await,
        }
    }

    /// Substring search over public content and summaries. Newest first.
    pub async fn search_public(&self, query: &str) -> Result<Vec<PublicBlob>, StoreError> {
        let pattern = format!("%{}%", query);
        match self.replica_conn().await {
            Some(mut conn) => fetch_public_search(&mut conn, &pattern).await,
            None => fetch_public_search(&self.pool, &pattern).await,
        }
    }

    // ==================== Likes ====================

    /// Record a like. Returns false when the pair already exists.
    pub async fn add_like(&self, blob_id: i64, user_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO blob_likes (blob_id, user_id, created_at)
             VALUES (?, ?, ?)",
        )
        .bind(blob_id)
        .bind(user_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_fk_violation(&e) {
                StoreError::NotFound
            } else {
                StoreError::Database(e)
            }
        })?;
        Ok(result.rows_affected() > 0)
    }

    /// Withdraw a like. Returns false when no like existed.
    pub async fn remove_like(&self, blob_id: i64, user_id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM blob_likes WHERE blob_id = ? AND user_id = ?")
            .bind(blob_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn like_count(&self, blob_id: i64) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM blob_likes WHERE blob_id = ?")
            .bind(blob_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

const BLOB_SELECT: &str = "SELECT b.id, b.user_id, b.content_type, b.content, b.file_path,
            b.is_public, b.created_at, b.summary,
            b.embedding IS NOT NULL AS has_embedding, u.username
     FROM blobs b
     LEFT JOIN users u ON b.user_id = u.user_id";

const PUBLIC_SELECT: &str = "SELECT b.id, b.content_type, b.content, b.file_path, b.created_at, b.summary,
            u.username, u.first_name,
            (SELECT COUNT(*) FROM blob_likes WHERE blob_id = b.id) AS likes_count
     FROM blobs b
     LEFT JOIN users u ON b.user_id = u.user_id";

async fn fetch_candidates<'e, E>(
    exec: E,
    user_id: i64,
    scope: SearchScope,
) -> Result<Vec<Candidate>, StoreError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    const COLUMNS: &str =
        "SELECT id, user_id, content, content_type, summary, embedding FROM blobs";

    let rows = match scope {
        SearchScope::Mine => {
            sqlx::query(&format!(
                "{COLUMNS} WHERE user_id = ? AND embedding IS NOT NULL"
            ))
            .bind(user_id)
            .fetch_all(exec)
            .await?
        }
        SearchScope::Shared => {
            sqlx::query(&format!(
                "{COLUMNS} WHERE is_public = 1 AND embedding IS NOT NULL"
            ))
            .fetch_all(exec)
            .await?
        }
        SearchScope::Unified => {
            sqlx::query(&format!(
                "{COLUMNS} WHERE (user_id = ? OR is_public = 1) AND embedding IS NOT NULL"
            ))
            .bind(user_id)
            .fetch_all(exec)
            .await?
        }
    };

    Ok(rows
        .iter()
        .map(|row| Candidate {
            id: row.get("id"),
            user_id: row.get("user_id"),
            content: row.get("content"),
            content_type: row.get("content_type"),
            summary: row.get("summary"),
            embedding: row.get("embedding"),
        })
        .collect())
}

async fn fetch_public_embedding<'e, E>(
    exec: E,
    blob_id: i64,
) -> Result<Option<Vec<u8>>, StoreError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let row = sqlx::query("SELECT embedding FROM blobs WHERE id = ? AND is_public = 1")
        .bind(blob_id)
        .fetch_optional(exec)
        .await?;
    Ok(row.and_then(|row| row.get::<Option<Vec<u8>>, _>("embedding")))
}

async fn fetch_public_candidates<'e, E>(
    exec: E,
    blob_id: i64,
) -> Result<Vec<(PublicBlob, Vec<u8>)>, StoreError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let rows = sqlx::query(
        "SELECT b.id, b.content_type, b.content, b.file_path, b.created_at, b.summary,
                u.username, u.first_name, b.embedding,
                (SELECT COUNT(*) FROM blob_likes WHERE blob_id = b.id) AS likes_count
         FROM blobs b
         LEFT JOIN users u ON b.user_id = u.user_id
         WHERE b.is_public = 1 AND b.id != ? AND b.embedding IS NOT NULL",
    )
    .bind(blob_id)
    .fetch_all(exec)
    .await?;

    Ok(rows
        .iter()
        .map(|row| (row_to_public(row), row.get::<Vec<u8>, _>("embedding")))
        .collect())
}

async fn fetch_public_page<'e, E>(
    exec: E,
    limit: i64,
    offset: i64,
) -> Result<Vec<PublicBlob>, StoreError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let rows = sqlx::query(&format!(
        "{PUBLIC_SELECT}
         WHERE b.is_public = 1
         ORDER BY b.created_at DESC, b.id DESC
         LIMIT ? OFFSET ?"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(exec)
    .await?;

    Ok(rows.iter().map(row_to_public).collect())
}

async fn fetch_public_by_id<'e, E>(exec: E, blob_id: i64) -> Result<Option<PublicBlob>, StoreError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let row = sqlx::query(&format!(
        "{PUBLIC_SELECT}
         WHERE b.id = ? AND b.is_public = 1"
    ))
    .bind(blob_id)
    .fetch_optional(exec)
    .await?;

    Ok(row.as_ref().map(row_to_public))
}

async fn fetch_public_search<'e, E>(exec: E, pattern: &str) -> Result<Vec<PublicBlob>, StoreError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let rows = sqlx::query(&format!(
        "{PUBLIC_SELECT}
         WHERE b.is_public = 1 AND (b.content LIKE ? OR b.summary LIKE ?)
         ORDER BY b.created_at DESC, b.id DESC"
    ))
    .bind(pattern)
    .bind(pattern)
    .fetch_all(exec)
    .await?;

    Ok(rows.iter().map(row_to_public).collect())
}

fn row_to_blob(row: &SqliteRow) -> Blob {
    Blob {
        id: row.get("id"),
        user_id: row.get("user_id"),
        content_type: row.get("content_type"),
        content: row.get("content"),
        file_path: row.get("file_path"),
        is_public: row.get("is_public"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at")),
        summary: row.get("summary"),
        username: row.get("username"),
        has_embedding: row.get("has_embedding"),
    }
}

fn row_to_public(row: &SqliteRow) -> PublicBlob {
    PublicBlob {
        id: row.get("id"),
        content_type: row.get("content_type"),
        content: row.get("content"),
        file_path: row.get("file_path"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at")),
        summary: row.get("summary"),
        username: row.get("username"),
        first_name: row.get("first_name"),
        likes_count: row.get("likes_count"),
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn is_fk_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.message().contains("FOREIGN KEY constraint failed"))
}
