//! Credential error types.

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur during credential operations.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] plaza_core::EmailError),

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// An account with this email already exists.
    #[error("email already registered")]
    AlreadyRegistered,

    /// No account for the given email.
    #[error("account not found")]
    NotFound,

    /// Verification code does not match (or none is outstanding).
    #[error("verification code mismatch")]
    OtpMismatch,

    /// Verification code issued too long ago.
    #[error("verification code expired")]
    OtpExpired,

    /// Account has not verified its email yet.
    #[error("email not verified")]
    NotVerified,

    /// Password comparison failed.
    #[error("wrong password")]
    CredentialMismatch,

    /// Password hashing error.
    #[error("password hashing error")]
    Hash,

    /// Store/database error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
