//! HTTP API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Layer stack (outermost → innermost): trace → CORS → auth (protected
//! routes only) → handler.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;
use crate::reports::MAX_REPORT_BYTES;

/// Multipart framing on top of the largest accepted image.
const UPLOAD_BODY_LIMIT: usize = MAX_REPORT_BYTES + 1024 * 1024;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost
/// layer of each group). Handlers use `State<ApiContext>`.
pub fn api_router(core: Arc<CoreState>) -> Router {
    let ctx = ApiContext::new(core);
    build_router(ctx)
}

fn build_router(ctx: ApiContext) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/auth/signout", post(endpoints::auth::signout))
        .route("/auth/me", get(endpoints::auth::me))
        .route("/auth/profile", put(endpoints::auth::update_profile))
        .route("/picker", get(endpoints::picker::screen))
        .route("/picker/events", post(endpoints::picker::event))
        .route("/service/health", get(endpoints::service::health))
        .route(
            "/journal",
            get(endpoints::journal::list).post(endpoints::journal::record),
        )
        .route(
            "/journal/:id",
            axum::routing::delete(endpoints::journal::remove),
        )
        .route(
            "/reports",
            get(endpoints::reports::list)
                .post(endpoints::reports::upload)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/reports/:id",
            get(endpoints::reports::view).delete(endpoints::reports::remove),
        )
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx.clone()));

    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/symptoms", get(endpoints::picker::catalog))
        .route("/auth/signup", post(endpoints::auth::signup))
        .route("/auth/signin", post(endpoints::auth::signin))
        .with_state(ctx);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .nest("/api", protected)
        .nest("/api", unprotected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::config::AppConfig;
    use crate::core_state::Services;
    use crate::db::open_memory_database;
    use crate::identity::LocalIdentityProvider;
    use crate::prediction::{MockPredictor, PredictionError, PredictionResponse};

    fn flu() -> PredictionResponse {
        PredictionResponse::parse(
            r#"{"prediction":"Flu","top3":[{"disease":"Flu","confidence":82.4}],
                "shap":[{"symptom":"Fever","value":0.31},{"symptom":"Rash","value":-0.12}]}"#,
        )
        .unwrap()
    }

    /// Core backed by a mock predictor, in-memory stores, and a temp blob dir.
    /// The tempdir guard must be kept alive for the duration of the test.
    fn core_with(predictor: Arc<MockPredictor>) -> (CoreState, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let config = AppConfig {
            data_dir: tmp.path().to_path_buf(),
            ..AppConfig::default()
        };
        let identity = LocalIdentityProvider::with_iterations(open_memory_database().unwrap(), 10);
        let services = Services::in_memory(&config, predictor, Arc::new(identity));
        (CoreState::new(config, services), tmp)
    }

    fn test_core(predictor: MockPredictor) -> (Arc<CoreState>, tempfile::TempDir) {
        let (core, tmp) = core_with(Arc::new(predictor));
        (Arc::new(core), tmp)
    }

    fn json_request(method: &str, uri: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json");
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {t}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header("Authorization", format!("Bearer {t}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn sign_up(app: &Router, email: &str) -> String {
        let req = json_request(
            "POST",
            "/api/auth/signup",
            None,
            serde_json::json!({
                "username": "Ana",
                "email": email,
                "password": "secret1",
                "confirm_password": "secret1"
            }),
        );
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        body_json(response).await["token"].as_str().unwrap().to_string()
    }

    async fn send_event(app: &Router, token: &str, uri: &str, event: serde_json::Value) -> serde_json::Value {
        let response = app
            .clone()
            .oneshot(json_request("POST", uri, Some(token), event))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await
    }

    #[tokio::test]
    async fn health_is_public() {
        let (core, _tmp) = test_core(MockPredictor::answering(flu()));
        let app = api_router(core);
        let response = app.oneshot(empty_request("GET", "/api/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["storage"], "local");
    }

    #[tokio::test]
    async fn catalog_lists_all_symptoms() {
        let (core, _tmp) = test_core(MockPredictor::answering(flu()));
        let app = api_router(core);
        let response = app.oneshot(empty_request("GET", "/api/symptoms", None)).await.unwrap();
        let json = body_json(response).await;
        assert_eq!(json.as_array().unwrap().len(), 27);
        assert_eq!(json[0], "Fever");
    }

    #[tokio::test]
    async fn picker_requires_auth() {
        let (core, _tmp) = test_core(MockPredictor::answering(flu()));
        let app = api_router(core);

        let response = app
            .clone()
            .oneshot(empty_request("GET", "/api/picker", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(empty_request("GET", "/api/picker", Some("invalid-token")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"]["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn signup_validation_errors_are_400() {
        let (core, _tmp) = test_core(MockPredictor::answering(flu()));
        let app = api_router(core);
        let req = json_request(
            "POST",
            "/api/auth/signup",
            None,
            serde_json::json!({
                "username": "Ana",
                "email": "ana@example.com",
                "password": "secret1",
                "confirm_password": "secret2"
            }),
        );
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["message"], "Passwords do not match");
    }

    #[tokio::test]
    async fn signin_signout_round_trip() {
        let (core, _tmp) = test_core(MockPredictor::answering(flu()));
        let app = api_router(core);
        let first = sign_up(&app, "ana@example.com").await;

        let wrong = json_request(
            "POST",
            "/api/auth/signin",
            None,
            serde_json::json!({"email": "ana@example.com", "password": "nope123"}),
        );
        let response = app.clone().oneshot(wrong).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"]["message"], "Incorrect password.");

        let right = json_request(
            "POST",
            "/api/auth/signin",
            None,
            serde_json::json!({"email": "ana@example.com", "password": "secret1"}),
        );
        let response = app.clone().oneshot(right).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["profile"]["username"], "Ana");
        assert_eq!(json["profile"]["initial"], "A");
        let second = json["token"].as_str().unwrap().to_string();
        assert_ne!(first, second);

        let response = app
            .clone()
            .oneshot(empty_request("POST", "/api/auth/signout", Some(&second)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .clone()
            .oneshot(empty_request("GET", "/api/auth/me", Some(&second)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        // The other session is unaffected.
        let response = app
            .oneshot(empty_request("GET", "/api/auth/me", Some(&first)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn profile_update_is_visible_via_me() {
        let (core, _tmp) = test_core(MockPredictor::answering(flu()));
        let app = api_router(core);
        let token = sign_up(&app, "ana@example.com").await;

        let req = json_request(
            "PUT",
            "/api/auth/profile",
            Some(&token),
            serde_json::json!({"display_name": "Zoe"}),
        );
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(empty_request("GET", "/api/auth/me", Some(&token)))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["username"], "Zoe");
        assert_eq!(json["initial"], "Z");
    }

    #[tokio::test]
    async fn picker_flow_selects_submits_and_renders_result() {
        let (core, _tmp) = test_core(MockPredictor::answering(flu()));
        let app = api_router(core);
        let token = sign_up(&app, "ana@example.com").await;

        let screen = send_event(
            &app,
            &token,
            "/api/picker/events",
            serde_json::json!({"type": "search_input", "query": "cou"}),
        )
        .await;
        assert_eq!(screen["dropdown"]["state"], "items");
        assert_eq!(screen["dropdown"]["items"].as_array().unwrap().len(), 2);
        assert_eq!(screen["controls"]["submit_enabled"], false);

        send_event(
            &app,
            &token,
            "/api/picker/events",
            serde_json::json!({"type": "item_toggled", "label": "Fever"}),
        )
        .await;

        let screen = send_event(
            &app,
            &token,
            "/api/picker/events?wait=true",
            serde_json::json!({"type": "submit_clicked"}),
        )
        .await;
        assert_eq!(screen["phase"], "succeeded");
        assert_eq!(screen["result"]["state"], "success");
        assert_eq!(screen["result"]["result"]["prediction"], "Flu");
        assert_eq!(screen["result"]["result"]["confidence_label"], "82%");
        assert_eq!(screen["controls"]["loading"], false);
    }

    #[tokio::test]
    async fn submit_without_wait_returns_pending_then_settles() {
        let (predictor, gate) = MockPredictor::answering(flu()).gated();
        let predictor = Arc::new(predictor);
        let (core, _tmp) = core_with(Arc::clone(&predictor));
        let app = api_router(Arc::new(core));
        let token = sign_up(&app, "ana@example.com").await;

        send_event(
            &app,
            &token,
            "/api/picker/events",
            serde_json::json!({"type": "item_toggled", "label": "Fever"}),
        )
        .await;
        let screen = send_event(
            &app,
            &token,
            "/api/picker/events",
            serde_json::json!({"type": "submit_clicked"}),
        )
        .await;
        assert_eq!(screen["phase"], "pending");
        assert_eq!(screen["controls"]["loading"], true);
        assert_eq!(screen["controls"]["submit_enabled"], false);

        // A second submit while pending is ignored.
        let screen = send_event(
            &app,
            &token,
            "/api/picker/events",
            serde_json::json!({"type": "submit_clicked"}),
        )
        .await;
        assert_eq!(screen["phase"], "pending");

        gate.release();
        let mut phase = String::new();
        for _ in 0..100 {
            let response = app
                .clone()
                .oneshot(empty_request("GET", "/api/picker", Some(&token)))
                .await
                .unwrap();
            phase = body_json(response).await["phase"].as_str().unwrap().to_string();
            if phase != "pending" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(phase, "succeeded");
        assert_eq!(predictor.call_count(), 1);
    }

    #[tokio::test]
    async fn idle_session_token_is_rejected() {
        let (core, _tmp) = core_with(Arc::new(MockPredictor::answering(flu())));
        let app = api_router(Arc::new(core.with_session_ttl(Duration::from_millis(50))));
        let token = sign_up(&app, "ana@example.com").await;

        tokio::time::sleep(Duration::from_millis(80)).await;

        let response = app
            .clone()
            .oneshot(empty_request("GET", "/api/picker", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"]["code"], "AUTH_REQUIRED");

        let response = app.oneshot(empty_request("GET", "/api/health", None)).await.unwrap();
        assert_eq!(body_json(response).await["active_sessions"], 0);
    }

    #[tokio::test]
    async fn prediction_failure_renders_failure_panel() {
        let error = PredictionError::Server {
            status: 500,
            body: "internal error".into(),
        };
        let (core, _tmp) = test_core(MockPredictor::failing(error));
        let app = api_router(core);
        let token = sign_up(&app, "ana@example.com").await;

        send_event(
            &app,
            &token,
            "/api/picker/events",
            serde_json::json!({"type": "item_toggled", "label": "Rash"}),
        )
        .await;
        let screen = send_event(
            &app,
            &token,
            "/api/picker/events?wait=true",
            serde_json::json!({"type": "search_enter"}),
        )
        .await;
        assert_eq!(screen["phase"], "failed");
        assert_eq!(screen["result"]["state"], "failure");
        assert_eq!(
            screen["result"]["failure"]["message"],
            "Server error: 500 internal error"
        );
        assert_eq!(screen["result"]["failure"]["body"], "internal error");
    }

    #[tokio::test]
    async fn pickers_are_per_session() {
        let (core, _tmp) = test_core(MockPredictor::answering(flu()));
        let app = api_router(core);
        let ana = sign_up(&app, "ana@example.com").await;
        let bob = sign_up(&app, "bob@example.com").await;

        send_event(
            &app,
            &ana,
            "/api/picker/events",
            serde_json::json!({"type": "item_toggled", "label": "Fever"}),
        )
        .await;

        let response = app
            .oneshot(empty_request("GET", "/api/picker", Some(&bob)))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["selected"].as_array().unwrap().len(), 0);
        assert_eq!(json["chips"]["state"], "hint");
    }

    #[tokio::test]
    async fn service_health_is_relayed() {
        let (core, _tmp) = test_core(MockPredictor::answering(flu()));
        let app = api_router(core);
        let token = sign_up(&app, "ana@example.com").await;
        let response = app
            .oneshot(empty_request("GET", "/api/service/health", Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn journal_crud() {
        let (core, _tmp) = test_core(MockPredictor::answering(flu()));
        let app = api_router(core);
        let token = sign_up(&app, "ana@example.com").await;

        let req = json_request(
            "POST",
            "/api/journal",
            Some(&token),
            serde_json::json!({"date": "2026-01-05", "mood": "Good", "water": "2L"}),
        );
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let card = body_json(response).await;
        assert_eq!(card["date_label"], "Monday, January 5, 2026");
        assert_eq!(card["sleep"], "Not specified");
        assert!(card["notes"].is_null());
        let id = card["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(empty_request("GET", "/api/journal", Some(&token)))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["count_label"], "1 entry");

        let response = app
            .clone()
            .oneshot(empty_request("DELETE", &format!("/api/journal/{id}"), Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(empty_request("DELETE", &format!("/api/journal/{id}"), Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn journal_rejects_missing_mood() {
        let (core, _tmp) = test_core(MockPredictor::answering(flu()));
        let app = api_router(core);
        let token = sign_up(&app, "ana@example.com").await;
        let req = json_request(
            "POST",
            "/api/journal",
            Some(&token),
            serde_json::json!({"date": "2026-01-05", "mood": ""}),
        );
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    fn multipart_request(token: &str, title: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
        let boundary = "healthai-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\n{title}\r\n\
                 --{boundary}\r\nContent-Disposition: form-data; name=\"notes\"\r\n\r\nFasting\r\n\
                 --{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"scan.png\"\r\n\
                 Content-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/reports")
            .header("Authorization", format!("Bearer {token}"))
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn report_upload_view_delete() {
        let (core, tmp) = test_core(MockPredictor::answering(flu()));
        let app = api_router(core);
        let token = sign_up(&app, "ana@example.com").await;

        let response = app
            .clone()
            .oneshot(multipart_request(&token, "CBC panel", "image/png", &[1, 2, 3, 4]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["title"], "CBC panel");
        assert_eq!(created["notes"], "Fasting");
        let id = created["id"].as_str().unwrap().to_string();
        assert!(tmp.path().join("blobs/medical-reports").exists());

        let response = app
            .clone()
            .oneshot(empty_request("GET", "/api/reports", Some(&token)))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["count_label"], "1 report");

        let response = app
            .clone()
            .oneshot(empty_request("GET", &format!("/api/reports/{id}"), Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_json(response).await["image_url"]
            .as_str()
            .unwrap()
            .starts_with("file://"));

        let response = app
            .clone()
            .oneshot(empty_request("DELETE", &format!("/api/reports/{id}"), Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(empty_request("GET", &format!("/api/reports/{id}"), Some(&token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn report_upload_rejects_non_images() {
        let (core, _tmp) = test_core(MockPredictor::answering(flu()));
        let app = api_router(core);
        let token = sign_up(&app, "ana@example.com").await;
        let response = app
            .oneshot(multipart_request(&token, "CBC", "application/pdf", b"%PDF"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"]["message"],
            "Please upload a PNG or JPG image."
        );
    }

    #[tokio::test]
    async fn truncated_title_field_is_reported_as_unreadable() {
        let (core, _tmp) = test_core(MockPredictor::answering(flu()));
        let app = api_router(core);
        let token = sign_up(&app, "ana@example.com").await;

        let boundary = "healthai-test-boundary";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"title\"\r\n\r\nCBC pan"
        );
        let req = Request::builder()
            .method("POST")
            .uri("/api/reports")
            .header("Authorization", format!("Bearer {token}"))
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let message = body_json(response).await["error"]["message"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(message.starts_with("Failed to read title"), "got {message}");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (core, _tmp) = test_core(MockPredictor::answering(flu()));
        let app = api_router(core);
        let response = app
            .oneshot(empty_request("GET", "/nonexistent", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
