//! Shared application state.

use std::sync::Arc;

use sqlx::PgPool;

use crate::services::{CredentialService, FeedService};

/// State shared across request handlers.
///
/// Cheap to clone; the services hold their store ports behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    credentials: Arc<CredentialService>,
    feed: Arc<FeedService>,
    /// Present when backed by `PostgreSQL`; readiness reports healthy
    /// without it (in-memory runs).
    pool: Option<PgPool>,
}

impl AppState {
    /// Assemble the state from constructed services.
    #[must_use]
    pub fn new(
        credentials: Arc<CredentialService>,
        feed: Arc<FeedService>,
        pool: Option<PgPool>,
    ) -> Self {
        Self {
            credentials,
            feed,
            pool,
        }
    }

    /// The credential service.
    #[must_use]
    pub fn credentials(&self) -> &CredentialService {
        &self.credentials
    }

    /// The post feed service.
    #[must_use]
    pub fn feed(&self) -> &FeedService {
        &self.feed
    }

    /// The database pool, when running against `PostgreSQL`.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }
}
