//! HTTP-facing error mapping.
//!
//! Every credential operation answers with a uniform `{success, message}`
//! envelope carrying a human-readable reason, never internals. Store and
//! hashing failures are the only class mapped to a 500 with a generic
//! message; all other failures are 200 with `success: false`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::services::credentials::CredentialError;
use crate::services::feed::FeedError;

const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

/// Uniform response envelope for the account operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

impl ApiResponse {
    /// Successful outcome with a confirmation message.
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// Failed outcome with a user-facing reason.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl IntoResponse for CredentialError {
    fn into_response(self) -> Response {
        match self {
            Self::Store(error) => {
                tracing::error!(%error, "credential operation hit the store");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::failure(GENERIC_FAILURE)),
                )
                    .into_response()
            }
            Self::Hash => {
                tracing::error!("password hashing failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::failure(GENERIC_FAILURE)),
                )
                    .into_response()
            }
            other => (StatusCode::OK, Json(ApiResponse::failure(user_message(&other))))
                .into_response(),
        }
    }
}

impl IntoResponse for FeedError {
    fn into_response(self) -> Response {
        match self {
            Self::UnknownAccount => (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::failure("This account does not exist.")),
            )
                .into_response(),
            Self::Store(error) => {
                tracing::error!(%error, "feed operation hit the store");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::failure(GENERIC_FAILURE)),
                )
                    .into_response()
            }
        }
    }
}

/// The reason shown to the caller, per failure kind.
fn user_message(error: &CredentialError) -> String {
    match error {
        CredentialError::InvalidEmail(_) => "Enter a valid email address.".to_owned(),
        CredentialError::WeakPassword(reason) => format!("{reason}."),
        CredentialError::AlreadyRegistered => {
            "This email address is already registered.".to_owned()
        }
        CredentialError::NotFound => "This email address is not registered.".to_owned(),
        CredentialError::OtpMismatch => {
            "The verification code is not correct. Check your email and try again.".to_owned()
        }
        CredentialError::OtpExpired => {
            "The verification code has expired. Register again to receive a new one.".to_owned()
        }
        CredentialError::NotVerified => "You need to verify your email first.".to_owned(),
        CredentialError::CredentialMismatch => {
            "The password you entered is not correct.".to_owned()
        }
        CredentialError::Hash | CredentialError::Store(_) => GENERIC_FAILURE.to_owned(),
    }
}
