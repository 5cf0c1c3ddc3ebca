//! Medical report endpoints.
//!
//! - `GET /api/reports`: the caller's reports, newest first
//! - `POST /api/reports`: multipart upload: `title`, `notes`, `file`
//! - `GET /api/reports/:id`: metadata plus a fresh read URL
//! - `DELETE /api/reports/:id`: remove the image, then the metadata
//!
//! Blob calls may be blocking HTTP, so the flows run on blocking workers.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::reports::{self, ReportDetail, ReportUpload, ReportsView};

/// `GET /api/reports`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<ReportsView>, ApiError> {
    let store = ctx.core.reports();
    Ok(Json(reports::list_reports(store.as_ref(), auth.user_id())?))
}

/// `POST /api/reports`
pub async fn upload(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ReportDetail>), ApiError> {
    let mut title = String::new();
    let mut notes = String::new();
    let mut file: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed upload: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "title" | "notes" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read {name}: {e}")))?;
                if name == "title" {
                    title = value;
                } else {
                    notes = value;
                }
            }
            "file" => {
                let file_name = field.file_name().unwrap_or("report").to_string();
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| {
                        mime_guess::from_path(&file_name)
                            .first_or_octet_stream()
                            .to_string()
                    });
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file data: {e}")))?;
                file = Some((file_name, content_type, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let (original_name, content_type, bytes) = file.unwrap_or_default();
    let upload = ReportUpload {
        title,
        notes,
        original_name,
        content_type,
        bytes,
    };
    upload.validate()?;

    let owner = auth.user_id().to_string();
    let (store, blobs) = (ctx.core.reports(), ctx.core.blobs());
    let stored = tokio::task::spawn_blocking(move || {
        reports::upload_report(store.as_ref(), blobs.as_ref(), &owner, upload)
    })
    .await??;

    Ok((
        StatusCode::CREATED,
        Json(ReportDetail {
            id: stored.id,
            title: stored.record.title,
            upload_date: stored.record.upload_date,
            notes: (!stored.record.notes.is_empty()).then_some(stored.record.notes),
            image_url: stored.record.url,
        }),
    ))
}

/// `GET /api/reports/:id`
pub async fn view(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<Json<ReportDetail>, ApiError> {
    let owner = auth.user_id().to_string();
    let (store, blobs) = (ctx.core.reports(), ctx.core.blobs());
    let detail = tokio::task::spawn_blocking(move || {
        reports::view_report(store.as_ref(), blobs.as_ref(), &owner, &id)
    })
    .await??;
    Ok(Json(detail))
}

/// `DELETE /api/reports/:id`
pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let owner = auth.user_id().to_string();
    let (store, blobs) = (ctx.core.reports(), ctx.core.blobs());
    tokio::task::spawn_blocking(move || {
        reports::delete_report(store.as_ref(), blobs.as_ref(), &owner, &id)
    })
    .await??;
    Ok(StatusCode::NO_CONTENT)
}
