//! Daily health log endpoints.
//!
//! - `GET /api/journal`: the caller's entries, newest first
//! - `POST /api/journal`: record an entry
//! - `DELETE /api/journal/:id`: delete one of the caller's entries

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::journal::{self, DailyEntryForm, EntryCard, JournalView};

/// `GET /api/journal`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<JournalView>, ApiError> {
    let store = ctx.core.journal();
    Ok(Json(journal::load_journal(store.as_ref(), auth.user_id())?))
}

/// `POST /api/journal`
pub async fn record(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Json(form): Json<DailyEntryForm>,
) -> Result<(StatusCode, Json<EntryCard>), ApiError> {
    let store = ctx.core.journal();
    let stored = journal::record_entry(store.as_ref(), auth.user_id(), form)?;
    Ok((StatusCode::CREATED, Json(journal::card(&stored))))
}

/// `DELETE /api/journal/:id`
pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let store = ctx.core.journal();
    journal::delete_entry(store.as_ref(), auth.user_id(), &id)?;
    Ok(StatusCode::NO_CONTENT)
}
