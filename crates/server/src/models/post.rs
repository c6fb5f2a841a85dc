//! Post domain type.

use chrono::{DateTime, Utc};

use plaza_core::{AccountId, PostId};

/// A time-stamped post published by an account.
#[derive(Debug, Clone)]
pub struct Post {
    pub id: PostId,
    /// Owning account.
    pub owner: AccountId,
    pub content: String,
    /// Path owned by the upload collaborator.
    pub media: Option<String>,
    /// Set exactly once at creation; the sole retention key.
    pub created_at: DateTime<Utc>,
}
