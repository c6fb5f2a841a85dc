//! Account lifecycle routes.
//!
//! Each handler answers with the uniform `{success, message}` envelope; the
//! error-side mapping lives on [`CredentialError`]'s `IntoResponse`.

use axum::Json;
use axum::extract::State;
use serde::Deserialize;

use crate::error::ApiResponse;
use crate::models::Profile;
use crate::services::credentials::{CredentialError, Registration};
use crate::state::AppState;

/// Registration input.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub shop_number: String,
    pub phone_number: String,
    pub business_name: String,
}

/// Verification input.
#[derive(Debug, Deserialize)]
pub struct VerifyOtpForm {
    pub email: String,
    pub otp: String,
}

/// Login input.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Recovery input.
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordForm {
    pub email: String,
}

/// `POST /register`
pub async fn register(
    State(state): State<AppState>,
    Json(form): Json<RegisterForm>,
) -> Result<Json<ApiResponse>, CredentialError> {
    state
        .credentials()
        .register(Registration {
            email: form.email,
            password: form.password,
            profile: Profile {
                full_name: form.full_name,
                shop_number: form.shop_number,
                phone_number: form.phone_number,
                business_name: form.business_name,
                face_image: None,
                shop_image: None,
            },
        })
        .await?;

    Ok(Json(ApiResponse::ok(
        "Registration successful. Check your email for your verification code.",
    )))
}

/// `POST /verify-otp`
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(form): Json<VerifyOtpForm>,
) -> Result<Json<ApiResponse>, CredentialError> {
    state.credentials().verify_otp(&form.email, &form.otp).await?;

    Ok(Json(ApiResponse::ok("Email verification successful.")))
}

/// `POST /login`
pub async fn login(
    State(state): State<AppState>,
    Json(form): Json<LoginForm>,
) -> Result<Json<ApiResponse>, CredentialError> {
    state.credentials().login(&form.email, &form.password).await?;

    Ok(Json(ApiResponse::ok("Successfully logged in to your account.")))
}

/// `POST /forgot-password`
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(form): Json<ForgotPasswordForm>,
) -> Result<Json<ApiResponse>, CredentialError> {
    state.credentials().forgot_password(&form.email).await?;

    Ok(Json(ApiResponse::ok(
        "A new password has been sent to your email.",
    )))
}
