//! Account endpoints.
//!
//! `POST /api/auth/signup` and `POST /api/auth/signin` are unprotected and
//! return a bearer token. The rest require that token.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::identity::{ProfileView, SignInForm, SignUpForm};

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub profile: ProfileView,
}

/// `POST /api/auth/signup`
pub async fn signup(
    State(ctx): State<ApiContext>,
    Json(form): Json<SignUpForm>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    form.validate()?;

    // PBKDF2 runs on a blocking worker.
    let identity = ctx.core.identity();
    let user = tokio::task::spawn_blocking(move || {
        identity.sign_up(&form.email, form.password.trim(), &form.username)
    })
    .await??;

    let token = ctx.core.start_session(user.clone())?;
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            token,
            profile: user.view(),
        }),
    ))
}

/// `POST /api/auth/signin`
pub async fn signin(
    State(ctx): State<ApiContext>,
    Json(form): Json<SignInForm>,
) -> Result<Json<SessionResponse>, ApiError> {
    form.validate()?;

    let identity = ctx.core.identity();
    let user =
        tokio::task::spawn_blocking(move || identity.sign_in(&form.email, &form.password))
            .await??;

    let token = ctx.core.start_session(user.clone())?;
    Ok(Json(SessionResponse {
        token,
        profile: user.view(),
    }))
}

/// `POST /api/auth/signout`
pub async fn signout(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<StatusCode, ApiError> {
    ctx.core.end_session(&auth.token)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/auth/me`
pub async fn me(Extension(auth): Extension<AuthContext>) -> Json<ProfileView> {
    Json(auth.session.user.view())
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: String,
}

/// `PUT /api/auth/profile`
pub async fn update_profile(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileView>, ApiError> {
    let user = ctx
        .core
        .identity()
        .update_display_name(auth.user_id(), &update.display_name)?;
    ctx.core.refresh_user(&user)?;
    Ok(Json(user.view()))
}
