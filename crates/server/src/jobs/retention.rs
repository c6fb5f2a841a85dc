//! Content retention purge.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Months, Utc};

use super::Job;
use crate::store::PostStore;

/// Deletes posts older than the retention window.
///
/// The cutoff is a calendar-aware subtraction (one year by default), and the
/// delete is a single strictly-earlier bulk operation, so an immediate
/// re-run deletes nothing. Nobody waits on the result; success and failure
/// are only logged.
pub struct RetentionJob {
    posts: Arc<dyn PostStore>,
    months: u32,
}

impl RetentionJob {
    /// Create a retention job with a window of `months` calendar months.
    #[must_use]
    pub fn new(posts: Arc<dyn PostStore>, months: u32) -> Self {
        Self { posts, months }
    }
}

#[async_trait]
impl Job for RetentionJob {
    fn name(&self) -> &'static str {
        "retention-purge"
    }

    async fn run(&self) -> anyhow::Result<()> {
        let now = Utc::now();
        let cutoff = now
            .checked_sub_months(Months::new(self.months))
            .ok_or_else(|| anyhow::anyhow!("retention cutoff out of range"))?;

        let deleted = self.posts.delete_older_than(cutoff).await?;
        tracing::info!(deleted, %cutoff, "expired posts purged");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::Post;
    use crate::store::memory::InMemoryPostStore;
    use chrono::Duration;
    use plaza_core::{AccountId, PostId};

    async fn seed(store: &InMemoryPostStore, ages_in_days: &[i64]) {
        let owner = AccountId::generate();
        for &age in ages_in_days {
            let post = Post {
                id: PostId::generate(),
                owner,
                content: format!("{age} days old"),
                media: None,
                created_at: Utc::now() - Duration::days(age),
            };
            store.insert(&post).await.unwrap();
        }
    }

    #[tokio::test]
    async fn purges_only_posts_beyond_the_window() {
        let store = InMemoryPostStore::new();
        // Two posts clearly beyond a calendar year, two clearly within.
        seed(&store, &[400, 370, 300, 1]).await;

        let job = RetentionJob::new(Arc::new(store.clone()), 12);
        job.run().await.unwrap();

        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn rerun_is_idempotent() {
        let store = InMemoryPostStore::new();
        seed(&store, &[400, 370, 300, 1]).await;

        let job = RetentionJob::new(Arc::new(store.clone()), 12);
        job.run().await.unwrap();
        let after_first = store.len();

        job.run().await.unwrap();
        assert_eq!(store.len(), after_first);
    }

    #[tokio::test]
    async fn empty_store_is_fine() {
        let store = InMemoryPostStore::new();
        let job = RetentionJob::new(Arc::new(store.clone()), 12);

        job.run().await.unwrap();
        assert!(store.is_empty());
    }
}
