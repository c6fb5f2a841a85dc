//! Engagement notifications.
//!
//! Twice a day, owners whose all-time post count reaches the threshold get a
//! nudge email; on Fridays every verified account gets the broadcast. Both
//! paths hand mail to the outbox and never wait on delivery.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use super::Job;
use crate::services::outbox::{InlineIcon, Outbox};
use crate::store::{AccountStore, PostStore};

/// Selects and mails engaged accounts.
pub struct EngagementNotifier {
    accounts: Arc<dyn AccountStore>,
    posts: Arc<dyn PostStore>,
    outbox: Outbox,
    threshold: u64,
    renotify_after: Duration,
    icon: Option<InlineIcon>,
}

impl EngagementNotifier {
    /// Create a notifier.
    ///
    /// `threshold` is the post count at which an owner qualifies;
    /// `renotify_after` is the minimum gap between nudges for one account,
    /// making notification idempotent within a firing period.
    #[must_use]
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        posts: Arc<dyn PostStore>,
        outbox: Outbox,
        threshold: u64,
        renotify_after: Duration,
        icon: Option<InlineIcon>,
    ) -> Self {
        Self {
            accounts,
            posts,
            outbox,
            threshold,
            renotify_after,
            icon,
        }
    }

    /// Nudge owners whose post count reached the threshold.
    ///
    /// Owners already notified within the renotify window are skipped;
    /// owners without an account record are skipped with a log line.
    ///
    /// # Errors
    ///
    /// Returns an error on store failure; partially dispatched mail stays
    /// dispatched.
    pub async fn notify_frequent_posters(&self) -> anyhow::Result<()> {
        let now = Utc::now();
        let mut notified = 0_u32;

        for (owner, count) in self.posts.count_by_owner().await? {
            if count < self.threshold {
                continue;
            }

            let Some(account) = self.accounts.find_by_id(owner).await? else {
                tracing::debug!(%owner, "frequent poster has no account record");
                continue;
            };

            if let Some(last) = account.engagement_notified_at
                && now - last < self.renotify_after
            {
                continue;
            }

            self.outbox.send_engagement_nudge(
                &account.email,
                &account.profile.full_name,
                self.icon.as_ref(),
            );
            self.accounts.mark_notified(account.id, now).await?;
            notified += 1;
        }

        tracing::info!(notified, "engagement nudges dispatched");
        Ok(())
    }

    /// Mail the broadcast to every verified account.
    ///
    /// # Errors
    ///
    /// Returns an error on store failure.
    pub async fn broadcast(&self) -> anyhow::Result<()> {
        let audience = self.accounts.list_verified().await?;
        let recipients = audience.len();

        for account in audience {
            self.outbox.send_weekly_broadcast(
                &account.email,
                &account.profile.full_name,
                self.icon.as_ref(),
            );
        }

        tracing::info!(recipients, "weekly broadcast dispatched");
        Ok(())
    }
}

/// Scheduler entry for the twice-daily nudge.
pub struct EngagementNudgeJob(pub Arc<EngagementNotifier>);

#[async_trait]
impl Job for EngagementNudgeJob {
    fn name(&self) -> &'static str {
        "engagement-nudge"
    }

    async fn run(&self) -> anyhow::Result<()> {
        self.0.notify_frequent_posters().await
    }
}

/// Scheduler entry for the Friday broadcast.
pub struct WeeklyBroadcastJob(pub Arc<EngagementNotifier>);

#[async_trait]
impl Job for WeeklyBroadcastJob {
    fn name(&self) -> &'static str {
        "weekly-broadcast"
    }

    async fn run(&self) -> anyhow::Result<()> {
        self.0.broadcast().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::{Account, Post, Profile, VerificationState};
    use crate::services::outbox::OutboundEmail;
    use crate::store::memory::{InMemoryAccountStore, InMemoryPostStore};
    use plaza_core::{AccountId, Email, PostId};
    use tokio::sync::mpsc;

    fn account(email: &str, verified: bool) -> Account {
        let now = Utc::now();
        Account {
            id: AccountId::generate(),
            email: Email::parse(email).unwrap(),
            credential_hash: "hash".to_owned(),
            verification: if verified {
                VerificationState::Verified
            } else {
                VerificationState::Unverified
            },
            pending_otp: None,
            profile: Profile {
                full_name: "Owner".to_owned(),
                ..Profile::default()
            },
            engagement_notified_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    async fn seed_posts(store: &InMemoryPostStore, owner: AccountId, count: usize) {
        for _ in 0..count {
            let post = Post {
                id: PostId::generate(),
                owner,
                content: "stock".to_owned(),
                media: None,
                created_at: Utc::now(),
            };
            store.insert(&post).await.unwrap();
        }
    }

    fn drain(rx: &mut mpsc::Receiver<OutboundEmail>) -> Vec<OutboundEmail> {
        let mut mails = Vec::new();
        while let Ok(mail) = rx.try_recv() {
            mails.push(mail);
        }
        mails
    }

    fn notifier(
        accounts: &InMemoryAccountStore,
        posts: &InMemoryPostStore,
        outbox: Outbox,
    ) -> EngagementNotifier {
        EngagementNotifier::new(
            Arc::new(accounts.clone()),
            Arc::new(posts.clone()),
            outbox,
            2,
            Duration::hours(8),
            None,
        )
    }

    #[tokio::test]
    async fn owners_at_or_above_the_threshold_are_nudged() {
        let accounts = InMemoryAccountStore::new();
        let posts = InMemoryPostStore::new();
        let (outbox, mut rx) = Outbox::test();

        let a = account("a@example.com", true);
        let b = account("b@example.com", true);
        let c = account("c@example.com", true);
        for acc in [&a, &b, &c] {
            accounts.insert(acc).await.unwrap();
        }
        seed_posts(&posts, a.id, 1).await;
        seed_posts(&posts, b.id, 2).await;
        seed_posts(&posts, c.id, 5).await;

        notifier(&accounts, &posts, outbox)
            .notify_frequent_posters()
            .await
            .unwrap();

        let mut recipients: Vec<String> = drain(&mut rx)
            .into_iter()
            .map(|m| m.to.as_str().to_owned())
            .collect();
        recipients.sort();
        assert_eq!(recipients, vec!["b@example.com", "c@example.com"]);
    }

    #[tokio::test]
    async fn a_second_firing_within_the_window_sends_nothing() {
        let accounts = InMemoryAccountStore::new();
        let posts = InMemoryPostStore::new();
        let (outbox, mut rx) = Outbox::test();

        let b = account("b@example.com", true);
        accounts.insert(&b).await.unwrap();
        seed_posts(&posts, b.id, 3).await;

        let notifier = notifier(&accounts, &posts, outbox);
        notifier.notify_frequent_posters().await.unwrap();
        assert_eq!(drain(&mut rx).len(), 1);

        notifier.notify_frequent_posters().await.unwrap();
        assert!(drain(&mut rx).is_empty());

        let stored = accounts.get(b.id).unwrap();
        assert!(stored.engagement_notified_at.is_some());
    }

    #[tokio::test]
    async fn an_old_notification_stamp_allows_a_new_nudge() {
        let accounts = InMemoryAccountStore::new();
        let posts = InMemoryPostStore::new();
        let (outbox, mut rx) = Outbox::test();

        let mut b = account("b@example.com", true);
        b.engagement_notified_at = Some(Utc::now() - Duration::hours(9));
        accounts.insert(&b).await.unwrap();
        seed_posts(&posts, b.id, 2).await;

        notifier(&accounts, &posts, outbox)
            .notify_frequent_posters()
            .await
            .unwrap();

        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn posters_without_an_account_record_are_skipped() {
        let accounts = InMemoryAccountStore::new();
        let posts = InMemoryPostStore::new();
        let (outbox, mut rx) = Outbox::test();

        seed_posts(&posts, AccountId::generate(), 4).await;

        notifier(&accounts, &posts, outbox)
            .notify_frequent_posters()
            .await
            .unwrap();

        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn broadcast_reaches_verified_accounts_only() {
        let accounts = InMemoryAccountStore::new();
        let posts = InMemoryPostStore::new();
        let (outbox, mut rx) = Outbox::test();

        accounts.insert(&account("a@example.com", true)).await.unwrap();
        accounts.insert(&account("b@example.com", false)).await.unwrap();
        accounts.insert(&account("c@example.com", true)).await.unwrap();

        notifier(&accounts, &posts, outbox).broadcast().await.unwrap();

        let mut recipients: Vec<String> = drain(&mut rx)
            .into_iter()
            .map(|m| m.to.as_str().to_owned())
            .collect();
        recipients.sort();
        assert_eq!(recipients, vec!["a@example.com", "c@example.com"]);
    }

    #[tokio::test]
    async fn nudge_carries_the_inline_icon_when_configured() {
        let accounts = InMemoryAccountStore::new();
        let posts = InMemoryPostStore::new();
        let (outbox, mut rx) = Outbox::test();

        let b = account("b@example.com", true);
        accounts.insert(&b).await.unwrap();
        seed_posts(&posts, b.id, 2).await;

        let notifier = EngagementNotifier::new(
            Arc::new(accounts),
            Arc::new(posts),
            outbox,
            2,
            Duration::hours(8),
            Some(InlineIcon::new("icon", vec![9, 9, 9])),
        );
        notifier.notify_frequent_posters().await.unwrap();

        let mail = rx.try_recv().unwrap();
        assert!(mail.inline_icon.is_some());
        assert!(mail.html.contains("cid:icon"));
    }
}
