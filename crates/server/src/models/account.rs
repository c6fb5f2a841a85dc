//! Account domain types.

use chrono::{DateTime, Utc};

use plaza_core::{AccountId, Email};

/// Whether an account has proven control of its email address.
///
/// Login is gated on `Verified`; everything else about the account exists
/// from registration onward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationState {
    /// Registered, verification code outstanding.
    Unverified,
    /// Email ownership proven.
    Verified,
}

/// A single-use verification code awaiting confirmation.
///
/// Present only while verification is outstanding; cleared together with the
/// transition to [`VerificationState::Verified`]. The issuance timestamp
/// bounds the code's validity window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOtp {
    /// Six ASCII digits.
    pub code: String,
    /// When the code was generated and mailed.
    pub issued_at: DateTime<Utc>,
}

/// Storefront profile payload supplied at registration.
///
/// Opaque to the credential state machine; displayed on the public profile.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub full_name: String,
    pub shop_number: String,
    pub phone_number: String,
    pub business_name: String,
    /// Path owned by the upload collaborator.
    pub face_image: Option<String>,
    /// Path owned by the upload collaborator.
    pub shop_image: Option<String>,
}

/// A storefront account (domain type).
#[derive(Debug, Clone)]
pub struct Account {
    /// Opaque identity, assigned at creation, immutable.
    pub id: AccountId,
    /// Unique lookup key.
    pub email: Email,
    /// Argon2id output; plaintext is never persisted.
    pub credential_hash: String,
    /// Gates login eligibility.
    pub verification: VerificationState,
    /// Outstanding verification code, if any.
    pub pending_otp: Option<PendingOtp>,
    /// Storefront profile payload.
    pub profile: Profile,
    /// Last time the engagement notifier mailed this account.
    pub engagement_notified_at: Option<DateTime<Utc>>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Whether login is permitted for this account.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.verification == VerificationState::Verified
    }
}
