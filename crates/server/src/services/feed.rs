//! Post feed service.
//!
//! Persists new posts and announces each creation on a broadcast channel.
//! Fan-out to live connections is the request layer's concern; the channel is
//! lossy and having no subscriber is not an error.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::instrument;

use plaza_core::{AccountId, PostId};

use crate::models::{Account, Post};
use crate::store::{AccountStore, PostStore, StoreError};

/// Buffered creation events before slow subscribers start losing them.
const EVENT_CAPACITY: usize = 64;

/// Emitted after a post is durably created.
#[derive(Debug, Clone)]
pub enum PostEvent {
    Created(Post),
}

/// Errors that can occur in the feed.
#[derive(Debug, Error)]
pub enum FeedError {
    /// No account for the given id.
    #[error("account not found")]
    UnknownAccount,

    /// Store/database error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// New post input.
#[derive(Debug)]
pub struct NewPost {
    pub owner: AccountId,
    pub content: String,
    pub media: Option<String>,
}

/// Post feed service.
pub struct FeedService {
    posts: Arc<dyn PostStore>,
    accounts: Arc<dyn AccountStore>,
    events: broadcast::Sender<PostEvent>,
}

impl FeedService {
    /// Create a new feed service.
    #[must_use]
    pub fn new(posts: Arc<dyn PostStore>, accounts: Arc<dyn AccountStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            posts,
            accounts,
            events,
        }
    }

    /// Subscribe to post creation events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PostEvent> {
        self.events.subscribe()
    }

    /// Create a post for an existing account.
    ///
    /// The creation timestamp is set here, exactly once; nothing mutates it
    /// afterwards.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::UnknownAccount` if the owner does not exist.
    /// Returns `FeedError::Store` if the post cannot be persisted.
    #[instrument(skip(self, new), fields(owner = %new.owner))]
    pub async fn create_post(&self, new: NewPost) -> Result<Post, FeedError> {
        if self.accounts.find_by_id(new.owner).await?.is_none() {
            return Err(FeedError::UnknownAccount);
        }

        let post = Post {
            id: PostId::generate(),
            owner: new.owner,
            content: new.content,
            media: new.media,
            created_at: Utc::now(),
        };
        self.posts.insert(&post).await?;

        // Lossy announce; subscribers catch up from the store.
        let _ = self.events.send(PostEvent::Created(post.clone()));

        tracing::info!(post = %post.id, "post created");
        Ok(post)
    }

    /// Load the profile behind an account id.
    ///
    /// # Errors
    ///
    /// Returns `FeedError::UnknownAccount` if the account does not exist.
    pub async fn profile(&self, id: AccountId) -> Result<Account, FeedError> {
        self.accounts
            .find_by_id(id)
            .await?
            .ok_or(FeedError::UnknownAccount)
    }
}
