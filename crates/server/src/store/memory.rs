//! In-memory store backings.
//!
//! Back the unit and HTTP-flow tests, and ephemeral development runs where
//! no database is available. Semantics mirror the `PostgreSQL` backing:
//! unique email on insert, atomic single-record updates, strictly-earlier
//! retention deletes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use plaza_core::{AccountId, Email, PostId};

use super::{AccountStore, PostStore, StoreError};
use crate::models::{Account, Post, VerificationState};

/// In-memory account store.
#[derive(Clone, Default)]
pub struct InMemoryAccountStore {
    inner: Arc<Mutex<HashMap<AccountId, Account>>>,
}

impl InMemoryAccountStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<AccountId, Account>> {
        self.inner.lock().expect("account store lock poisoned")
    }

    /// Snapshot of a stored account, for test assertions.
    #[must_use]
    pub fn get(&self, id: AccountId) -> Option<Account> {
        self.lock().get(&id).cloned()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn insert(&self, account: &Account) -> Result<(), StoreError> {
        let mut accounts = self.lock();
        if accounts.values().any(|a| a.email == account.email) {
            return Err(StoreError::Conflict("email already exists".to_owned()));
        }
        accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.lock().get(&id).cloned())
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<Account>, StoreError> {
        Ok(self.lock().values().find(|a| &a.email == email).cloned())
    }

    async fn mark_verified(&self, id: AccountId) -> Result<(), StoreError> {
        let mut accounts = self.lock();
        let account = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.verification = VerificationState::Verified;
        account.pending_otp = None;
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn rotate_credential(
        &self,
        id: AccountId,
        credential_hash: &str,
    ) -> Result<(), StoreError> {
        let mut accounts = self.lock();
        let account = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.credential_hash = credential_hash.to_owned();
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_notified(&self, id: AccountId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut accounts = self.lock();
        let account = accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.engagement_notified_at = Some(at);
        account.updated_at = Utc::now();
        Ok(())
    }

    async fn list_verified(&self) -> Result<Vec<Account>, StoreError> {
        let mut verified: Vec<Account> = self
            .lock()
            .values()
            .filter(|a| a.is_verified())
            .cloned()
            .collect();
        verified.sort_by_key(|a| a.created_at);
        Ok(verified)
    }
}

/// In-memory post store.
#[derive(Clone, Default)]
pub struct InMemoryPostStore {
    inner: Arc<Mutex<HashMap<PostId, Post>>>,
}

impl InMemoryPostStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PostId, Post>> {
        self.inner.lock().expect("post store lock poisoned")
    }

    /// Number of stored posts, for test assertions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store holds no posts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[async_trait]
impl PostStore for InMemoryPostStore {
    async fn insert(&self, post: &Post) -> Result<(), StoreError> {
        self.lock().insert(post.id, post.clone());
        Ok(())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut posts = self.lock();
        let before = posts.len();
        posts.retain(|_, post| post.created_at >= cutoff);
        Ok((before - posts.len()) as u64)
    }

    async fn count_by_owner(&self) -> Result<Vec<(AccountId, u64)>, StoreError> {
        let mut counts: HashMap<AccountId, u64> = HashMap::new();
        for post in self.lock().values() {
            *counts.entry(post.owner).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::{PendingOtp, Profile};

    fn account(email: &str) -> Account {
        let now = Utc::now();
        Account {
            id: AccountId::generate(),
            email: Email::parse(email).unwrap(),
            credential_hash: "hash".to_owned(),
            verification: VerificationState::Unverified,
            pending_otp: Some(PendingOtp {
                code: "123456".to_owned(),
                issued_at: now,
            }),
            profile: Profile::default(),
            engagement_notified_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_email() {
        let store = InMemoryAccountStore::new();
        store.insert(&account("a@example.com")).await.unwrap();

        let err = store.insert(&account("a@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn mark_verified_clears_the_code() {
        let store = InMemoryAccountStore::new();
        let account = account("a@example.com");
        store.insert(&account).await.unwrap();

        store.mark_verified(account.id).await.unwrap();

        let stored = store.get(account.id).unwrap();
        assert!(stored.is_verified());
        assert!(stored.pending_otp.is_none());
    }

    #[tokio::test]
    async fn delete_older_than_is_strict() {
        let store = InMemoryPostStore::new();
        let cutoff = Utc::now();
        let owner = AccountId::generate();

        for offset in [-1, 1] {
            let post = Post {
                id: PostId::generate(),
                owner,
                content: "hello".to_owned(),
                media: None,
                created_at: cutoff + chrono::Duration::seconds(offset),
            };
            store.insert(&post).await.unwrap();
        }

        let deleted = store.delete_older_than(cutoff).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.len(), 1);
    }
}
