use thiserror::Error;

/// Errors surfaced to store and ranker callers.
///
/// Only caller-visible outcomes live here. Infrastructure failures — the
/// embedding provider, the replica copy loop — are logged and absorbed at
/// their own boundaries; a degraded feature never fails the request that
/// tripped over it.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The item does not exist or is not visible to the requester. The
    /// two cases are deliberately indistinguishable so a caller cannot
    /// probe for the existence of private items.
    #[error("item not found")]
    NotFound,

    /// A mutation matched no row owned by the acting user. Covers both
    /// "no such item" and "not yours"; the operation had no effect.
    #[error("item not found or not owned by the caller")]
    PermissionDenied,

    /// `create_blob` referenced an owner that was never ensured.
    #[error("unknown user {0}")]
    UnknownUser(i64),

    /// Schema migration failed. Fatal at startup: running against an
    /// inconsistent schema would break every downstream search.
    #[error("schema migration failed: {0}")]
    Schema(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
