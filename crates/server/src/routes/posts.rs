//! Post creation and profile lookup routes.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use plaza_core::{AccountId, PostId};

use crate::models::Account;
use crate::services::feed::{FeedError, NewPost};
use crate::state::AppState;

/// Post creation input. The media path is owned by the upload collaborator.
#[derive(Debug, Deserialize)]
pub struct CreatePostForm {
    pub account_id: AccountId,
    pub content: String,
    pub media: Option<String>,
}

/// Post creation output.
#[derive(Debug, Serialize)]
pub struct CreatedPost {
    pub id: PostId,
}

/// Public profile view: never carries the credential hash or the
/// verification code.
#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub id: AccountId,
    pub email: String,
    pub full_name: String,
    pub shop_number: String,
    pub phone_number: String,
    pub business_name: String,
    pub face_image: Option<String>,
    pub shop_image: Option<String>,
    pub verified: bool,
}

impl From<Account> for ProfileView {
    fn from(account: Account) -> Self {
        let verified = account.is_verified();
        Self {
            id: account.id,
            email: account.email.into_inner(),
            full_name: account.profile.full_name,
            shop_number: account.profile.shop_number,
            phone_number: account.profile.phone_number,
            business_name: account.profile.business_name,
            face_image: account.profile.face_image,
            shop_image: account.profile.shop_image,
            verified,
        }
    }
}

/// `POST /posts`
pub async fn create_post(
    State(state): State<AppState>,
    Json(form): Json<CreatePostForm>,
) -> Result<(StatusCode, Json<CreatedPost>), FeedError> {
    let post = state
        .feed()
        .create_post(NewPost {
            owner: form.account_id,
            content: form.content,
            media: form.media,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(CreatedPost { id: post.id })))
}

/// `GET /profile/{id}`
pub async fn profile(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ProfileView>, FeedError> {
    let account = state.feed().profile(AccountId::new(id)).await?;
    Ok(Json(ProfileView::from(account)))
}
