use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered owner of stored content. Created on first contact, never
/// deleted. Display names keep their first-seen values; repeat contact
/// does not refresh them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A stored unit of user content.
///
/// Immutable after creation except for three fields: `summary` and the
/// embedding are attached asynchronously once, and `is_public` may be
/// flipped by the owner. There is no deletion path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blob {
    pub id: i64,
    pub user_id: i64,
    /// Open-ended tag: "text", "photo", "document", "analysis", ...
    pub content_type: String,
    /// Textual payload. For non-text types this is a textual derivative
    /// such as an image analysis transcript.
    pub content: String,
    /// Path to an associated downloaded artifact; empty when none.
    pub file_path: String,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Owner's username, joined for display.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Whether an embedding is attached. The raw vector never leaves the
    /// store; search decodes candidates per query.
    pub has_embedding: bool,
}

/// A public item as rendered by the shared browsing surface, with the
/// owner's display fields and its like count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicBlob {
    pub id: i64,
    pub content_type: String,
    pub content: String,
    pub file_path: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    pub likes_count: i64,
}

/// One similarity hit, ordered by descending score.
#[derive(Debug, Clone, Serialize)]
pub struct RankedMatch {
    pub blob_id: i64,
    pub content: String,
    pub content_type: String,
    pub summary: Option<String>,
    pub score: f32,
}

/// The visibility partition a similarity search operates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// The requester's own items only, public or private alike.
    Mine,
    /// All public items from any owner, the requester's own included.
    /// Private items are excluded even when the requester owns them.
    Shared,
    /// The requester's own items plus other owners' public items in one
    /// ranked list; own items receive a flat score boost.
    Unified,
}

/// Restricts listing operations to one side of the visibility partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityFilter {
    Public,
    Private,
}
