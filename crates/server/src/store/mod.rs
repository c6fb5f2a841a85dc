//! Store ports for accounts and posts.
//!
//! The domain services and jobs depend on these traits, never on a concrete
//! pool, so the state machine and the recurring jobs can be exercised against
//! the in-memory backing. [`postgres`] is the durable backing; [`memory`]
//! backs tests and ephemeral development runs.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use plaza_core::{AccountId, Email};

use crate::models::{Account, Post};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Durable keyed storage of account records.
///
/// Single-record updates are atomic; no cross-record transactions are
/// assumed.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Persist a fully-formed account.
    ///
    /// The service computes id, hash, code, and timestamps; the store
    /// persists. Fails with `Conflict` if the email is already registered.
    async fn insert(&self, account: &Account) -> Result<(), StoreError>;

    /// Load an account by id.
    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// Load an account by its unique email.
    async fn find_by_email(&self, email: &Email) -> Result<Option<Account>, StoreError>;

    /// Flip the account to verified and clear the pending code, atomically.
    async fn mark_verified(&self, id: AccountId) -> Result<(), StoreError>;

    /// Replace the stored credential hash.
    async fn rotate_credential(&self, id: AccountId, credential_hash: &str)
    -> Result<(), StoreError>;

    /// Record when the engagement notifier last mailed the account.
    async fn mark_notified(&self, id: AccountId, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// All verified accounts (the broadcast audience).
    async fn list_verified(&self) -> Result<Vec<Account>, StoreError>;
}

/// Durable storage of posts with owner reference and creation time.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Persist a fully-formed post.
    async fn insert(&self, post: &Post) -> Result<(), StoreError>;

    /// Bulk-delete every post created strictly earlier than `cutoff`.
    ///
    /// Returns the number of deleted posts.
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    /// All-time post counts grouped by owner.
    async fn count_by_owner(&self) -> Result<Vec<(AccountId, u64)>, StoreError>;
}
