//! `PostgreSQL` store backings.
//!
//! Queries use the runtime sqlx API with `FromRow` row types so the
//! workspace builds without a live database; the schema lives in
//! `migrations/`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use plaza_core::{AccountId, Email};

use super::{AccountStore, PostStore, StoreError};
use crate::models::{Account, PendingOtp, Post, Profile, VerificationState};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` account queries.
#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    email: String,
    credential_hash: String,
    verified: bool,
    otp_code: Option<String>,
    otp_issued_at: Option<DateTime<Utc>>,
    full_name: String,
    shop_number: String,
    phone_number: String,
    business_name: String,
    face_image: Option<String>,
    shop_image: Option<String>,
    engagement_notified_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = StoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email)
            .map_err(|e| StoreError::DataCorruption(format!("invalid email in database: {e}")))?;

        let pending_otp = match (row.otp_code, row.otp_issued_at) {
            (Some(code), Some(issued_at)) => Some(PendingOtp { code, issued_at }),
            (None, None) => None,
            _ => {
                return Err(StoreError::DataCorruption(
                    "verification code and issuance timestamp must be set together".to_owned(),
                ));
            }
        };

        Ok(Self {
            id: AccountId::new(row.id),
            email,
            credential_hash: row.credential_hash,
            verification: if row.verified {
                VerificationState::Verified
            } else {
                VerificationState::Unverified
            },
            pending_otp,
            profile: Profile {
                full_name: row.full_name,
                shop_number: row.shop_number,
                phone_number: row.phone_number,
                business_name: row.business_name,
                face_image: row.face_image,
                shop_image: row.shop_image,
            },
            engagement_notified_at: row.engagement_notified_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_ACCOUNT: &str = "SELECT id, email, credential_hash, verified, otp_code, \
     otp_issued_at, full_name, shop_number, phone_number, business_name, face_image, \
     shop_image, engagement_notified_at, created_at, updated_at FROM account";

// =============================================================================
// Account store
// =============================================================================

/// `PostgreSQL`-backed account store.
#[derive(Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    /// Create a new account store over the shared pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn insert(&self, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO account (id, email, credential_hash, verified, otp_code, \
             otp_issued_at, full_name, shop_number, phone_number, business_name, \
             face_image, shop_image, engagement_notified_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(account.id.as_uuid())
        .bind(account.email.as_str())
        .bind(&account.credential_hash)
        .bind(account.is_verified())
        .bind(account.pending_otp.as_ref().map(|otp| otp.code.clone()))
        .bind(account.pending_otp.as_ref().map(|otp| otp.issued_at))
        .bind(&account.profile.full_name)
        .bind(&account.profile.shop_number)
        .bind(&account.profile.phone_number)
        .bind(&account.profile.business_name)
        .bind(account.profile.face_image.as_deref())
        .bind(account.profile.shop_image.as_deref())
        .bind(account.engagement_notified_at)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::Conflict("email already exists".to_owned());
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn find_by_id(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!("{SELECT_ACCOUNT} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_by_email(&self, email: &Email) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!("{SELECT_ACCOUNT} WHERE email = $1"))
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn mark_verified(&self, id: AccountId) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE account SET verified = TRUE, otp_code = NULL, otp_issued_at = NULL, \
             updated_at = now() WHERE id = $1",
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    async fn rotate_credential(
        &self,
        id: AccountId,
        credential_hash: &str,
    ) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE account SET credential_hash = $1, updated_at = now() WHERE id = $2")
                .bind(credential_hash)
                .bind(id.as_uuid())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    async fn mark_notified(&self, id: AccountId, at: DateTime<Utc>) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE account SET engagement_notified_at = $1, updated_at = now() WHERE id = $2",
        )
        .bind(at)
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        Ok(())
    }

    async fn list_verified(&self) -> Result<Vec<Account>, StoreError> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            "{SELECT_ACCOUNT} WHERE verified ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

// =============================================================================
// Post store
// =============================================================================

/// `PostgreSQL`-backed post store.
#[derive(Clone)]
pub struct PgPostStore {
    pool: PgPool,
}

impl PgPostStore {
    /// Create a new post store over the shared pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostStore for PgPostStore {
    async fn insert(&self, post: &Post) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO post (id, owner_id, content, media, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(post.id.as_uuid())
        .bind(post.owner.as_uuid())
        .bind(&post.content)
        .bind(post.media.as_deref())
        .bind(post.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM post WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn count_by_owner(&self) -> Result<Vec<(AccountId, u64)>, StoreError> {
        let rows = sqlx::query_as::<_, (Uuid, i64)>(
            "SELECT owner_id, COUNT(*) FROM post GROUP BY owner_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(owner, count)| {
                (
                    AccountId::new(owner),
                    u64::try_from(count).unwrap_or_default(),
                )
            })
            .collect())
    }
}
