//! Symptom picker endpoints.
//!
//! - `GET /api/symptoms`: the fixed catalog
//! - `GET /api/picker`: the caller's current picker screen
//! - `POST /api/picker/events`: apply one UI event, return the screen
//!
//! A submit event admits a request and returns immediately with the
//! screen in its pending phase; the prediction runs on a blocking worker
//! and settles into the same controller. Pass `?wait=true` to hold the
//! response until it settles.

use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, AuthContext};
use crate::controller::{Controller, PickerScreen, UiEvent};
use crate::prediction::{PredictionError, Predictor, Submission};

/// `GET /api/symptoms`
pub async fn catalog(State(ctx): State<ApiContext>) -> Json<Vec<&'static str>> {
    Json(ctx.core.catalog().iter().map(|s| s.label()).collect())
}

/// `GET /api/picker`
pub async fn screen(Extension(auth): Extension<AuthContext>) -> Result<Json<PickerScreen>, ApiError> {
    let picker = auth
        .session
        .picker
        .lock()
        .map_err(|_| ApiError::Internal("picker lock".into()))?;
    Ok(Json(picker.screen()))
}

#[derive(Debug, Default, Deserialize)]
pub struct EventQuery {
    #[serde(default)]
    pub wait: bool,
}

/// `POST /api/picker/events`
pub async fn event(
    State(ctx): State<ApiContext>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<EventQuery>,
    Json(event): Json<UiEvent>,
) -> Result<Json<PickerScreen>, ApiError> {
    let picker = Arc::clone(&auth.session.picker);

    let (submission, screen) = {
        let mut controller = picker
            .lock()
            .map_err(|_| ApiError::Internal("picker lock".into()))?;
        let submission = controller.handle(event);
        (submission, controller.screen())
    };

    let Some(submission) = submission else {
        return Ok(Json(screen));
    };

    let task = tokio::spawn(run_prediction(
        ctx.core.predictor(),
        Arc::clone(&picker),
        submission,
    ));
    if !query.wait {
        return Ok(Json(screen));
    }

    task.await?;
    let controller = picker
        .lock()
        .map_err(|_| ApiError::Internal("picker lock".into()))?;
    Ok(Json(controller.screen()))
}

/// Send one admitted request and settle its outcome into `picker`.
async fn run_prediction(
    predictor: Arc<dyn Predictor>,
    picker: Arc<Mutex<Controller>>,
    submission: Submission,
) {
    let Submission { seq, request } = submission;
    let outcome = tokio::task::spawn_blocking(move || predictor.predict(&request))
        .await
        .unwrap_or_else(|e| {
            Err(PredictionError::Transport(format!(
                "prediction task failed: {e}"
            )))
        });

    match picker.lock() {
        Ok(mut controller) => {
            controller.settle(seq, outcome);
        }
        Err(_) => tracing::error!(seq, "Picker lock poisoned; dropping prediction result"),
    }
}
