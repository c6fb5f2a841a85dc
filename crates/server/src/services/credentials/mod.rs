//! Credential service.
//!
//! Owns the registration → verification → authentication → recovery state
//! machine. Reads and writes the account store; hands outbound mail to the
//! [`Outbox`] without waiting on delivery.

mod error;

pub use error::CredentialError;

use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{Duration, Utc};
use rand::Rng;
use tracing::instrument;

use plaza_core::{AccountId, Email};

use crate::models::{Account, PendingOtp, Profile, VerificationState};
use crate::services::outbox::Outbox;
use crate::store::{AccountStore, StoreError};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Registration input.
#[derive(Debug)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub profile: Profile,
}

/// Credential service.
///
/// Handles account registration, email verification, login, and password
/// recovery.
pub struct CredentialService {
    accounts: Arc<dyn AccountStore>,
    outbox: Outbox,
    otp_ttl: Duration,
}

impl CredentialService {
    /// Create a new credential service.
    #[must_use]
    pub fn new(accounts: Arc<dyn AccountStore>, outbox: Outbox, otp_ttl: Duration) -> Self {
        Self {
            accounts,
            outbox,
            otp_ttl,
        }
    }

    /// Register a new account.
    ///
    /// Creates the account unverified, with a fresh single-use verification
    /// code, and mails the code to the given address. Registration reports
    /// success even if the mail cannot be sent; the dispatch failure is
    /// logged by the outbox.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::InvalidEmail` if the email format is invalid.
    /// Returns `CredentialError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `CredentialError::AlreadyRegistered` if the email is already taken.
    /// Returns `CredentialError::Store` if the account cannot be persisted.
    #[instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: Registration) -> Result<Account, CredentialError> {
        let email = Email::parse(&registration.email)?;
        validate_password(&registration.password)?;

        let credential_hash = hash_password(&registration.password)?;
        let code = generate_verification_code();
        let now = Utc::now();

        let account = Account {
            id: AccountId::generate(),
            email,
            credential_hash,
            verification: VerificationState::Unverified,
            pending_otp: Some(PendingOtp {
                code: code.clone(),
                issued_at: now,
            }),
            profile: registration.profile,
            engagement_notified_at: None,
            created_at: now,
            updated_at: now,
        };

        self.accounts.insert(&account).await.map_err(|e| match e {
            StoreError::Conflict(_) => CredentialError::AlreadyRegistered,
            other => CredentialError::Store(other),
        })?;

        self.outbox
            .send_verification_code(&account.email, &account.profile.full_name, &code);

        tracing::info!(account = %account.id, "account registered");
        Ok(account)
    }

    /// Confirm control of the registered email with a verification code.
    ///
    /// On a match the account flips to verified and the code is cleared
    /// atomically with the transition; re-submitting the same code afterwards
    /// fails with `OtpMismatch`.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::NotFound` if no account exists for the email.
    /// Returns `CredentialError::OtpExpired` if the code's validity window passed.
    /// Returns `CredentialError::OtpMismatch` if the code differs or none is outstanding.
    #[instrument(skip(self, code))]
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<(), CredentialError> {
        let email = Email::parse(email)?;
        let account = self
            .accounts
            .find_by_email(&email)
            .await?
            .ok_or(CredentialError::NotFound)?;

        let Some(pending) = account.pending_otp else {
            return Err(CredentialError::OtpMismatch);
        };

        if pending.issued_at + self.otp_ttl < Utc::now() {
            return Err(CredentialError::OtpExpired);
        }

        if pending.code != code {
            return Err(CredentialError::OtpMismatch);
        }

        self.accounts.mark_verified(account.id).await?;

        tracing::info!(account = %account.id, "email verified");
        Ok(())
    }

    /// Authenticate with email and password.
    ///
    /// The verification check precedes password comparison and
    /// short-circuits it. Session issuance is the request layer's concern.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::NotFound` if no account exists for the email.
    /// Returns `CredentialError::NotVerified` if the email is unverified.
    /// Returns `CredentialError::CredentialMismatch` if the password is wrong.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Account, CredentialError> {
        let email = Email::parse(email)?;
        let account = self
            .accounts
            .find_by_email(&email)
            .await?
            .ok_or(CredentialError::NotFound)?;

        if !account.is_verified() {
            return Err(CredentialError::NotVerified);
        }

        verify_password(password, &account.credential_hash)?;

        Ok(account)
    }

    /// Replace a lost password with a generated one and mail it out.
    ///
    /// The replacement is persisted as a hash before the plaintext is handed
    /// to the outbox; the plaintext is never stored. Mailing the password in
    /// clear is the inherited recovery contract — a hardened deployment
    /// would switch to a time-boxed reset link.
    ///
    /// # Errors
    ///
    /// Returns `CredentialError::NotFound` if no account exists for the email.
    /// Returns `CredentialError::Store` if the rotated hash cannot be persisted.
    #[instrument(skip(self))]
    pub async fn forgot_password(&self, email: &str) -> Result<(), CredentialError> {
        let email = Email::parse(email)?;
        let account = self
            .accounts
            .find_by_email(&email)
            .await?
            .ok_or(CredentialError::NotFound)?;

        let replacement = generate_recovery_password();
        let credential_hash = hash_password(&replacement)?;
        self.accounts
            .rotate_credential(account.id, &credential_hash)
            .await?;

        self.outbox
            .send_recovered_password(&account.email, &account.profile.full_name, &replacement);

        tracing::info!(account = %account.id, "credential rotated for recovery");
        Ok(())
    }
}

/// Generate a 6-digit verification code from the process CSPRNG.
#[must_use]
pub fn generate_verification_code() -> String {
    let code: u32 = rand::rng().random_range(100_000..1_000_000);
    code.to_string()
}

/// Generate a replacement password: 8 random bytes, hex encoded.
fn generate_recovery_password() -> String {
    let bytes: [u8; 8] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), CredentialError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(CredentialError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| CredentialError::Hash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), CredentialError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| CredentialError::CredentialMismatch)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| CredentialError::CredentialMismatch)
}
