//! Prediction service clients.
//!
//! `HttpPredictor` speaks the service's JSON contract over blocking
//! reqwest; callers on an async runtime run it on a blocking worker.
//! `MockPredictor` replays scripted outcomes and records every call.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Mutex;
use std::time::Duration;

use super::error::PredictionError;
use super::types::{PredictionRequest, PredictionResponse, ServiceHealth};

/// Connect phase gets its own bound even when requests are unbounded.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Anything that can turn a symptom snapshot into a prediction.
pub trait Predictor: Send + Sync {
    /// One request, one response. No retry.
    fn predict(&self, request: &PredictionRequest) -> Result<PredictionResponse, PredictionError>;

    /// Probe the service's health endpoint.
    fn health(&self) -> Result<ServiceHealth, PredictionError>;

    /// Base URL shown to the user when a request fails.
    fn endpoint(&self) -> &str;
}

// ═══════════════════════════════════════════════════════════
// HttpPredictor
// ═══════════════════════════════════════════════════════════

/// HTTP client for the prediction service.
pub struct HttpPredictor {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: Option<u64>,
}

impl HttpPredictor {
    /// Create a client for `base_url`. `timeout` of `None` leaves a hung
    /// request pending indefinitely.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, PredictionError> {
        let mut builder = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS));
        // The blocking builder applies a 30s default; override it either way.
        builder = builder.timeout(timeout);

        let client = builder
            .build()
            .map_err(|e| PredictionError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            client,
            timeout_secs: timeout.map(|t| t.as_secs()),
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> PredictionError {
        if e.is_timeout() {
            PredictionError::Timeout {
                secs: self.timeout_secs.unwrap_or(CONNECT_TIMEOUT_SECS),
            }
        } else if e.is_connect() {
            PredictionError::Transport(format!("cannot connect to {}", self.base_url))
        } else {
            PredictionError::Transport(e.to_string())
        }
    }

    fn read_body(
        &self,
        response: reqwest::blocking::Response,
    ) -> Result<(u16, String), PredictionError> {
        let status = response.status().as_u16();
        let body = response.text().map_err(|e| self.map_send_error(e))?;
        Ok((status, body))
    }
}

/// Classify a completed HTTP exchange.
pub fn interpret_response(status: u16, body: &str) -> Result<PredictionResponse, PredictionError> {
    if !(200..300).contains(&status) {
        return Err(PredictionError::Server {
            status,
            body: body.to_string(),
        });
    }
    PredictionResponse::parse(body)
}

impl Predictor for HttpPredictor {
    fn predict(&self, request: &PredictionRequest) -> Result<PredictionResponse, PredictionError> {
        let url = format!("{}/predict", self.base_url);
        tracing::debug!(symptoms = request.symptoms.len(), %url, "Sending prediction request");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let (status, body) = self.read_body(response)?;
        interpret_response(status, &body)
    }

    fn health(&self) -> Result<ServiceHealth, PredictionError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let (status, body) = self.read_body(response)?;
        if !(200..300).contains(&status) {
            return Err(PredictionError::Server { status, body });
        }
        serde_json::from_str(&body).map_err(|e| PredictionError::MalformedResponse(e.to_string()))
    }

    fn endpoint(&self) -> &str {
        &self.base_url
    }
}

// ═══════════════════════════════════════════════════════════
// MockPredictor
// ═══════════════════════════════════════════════════════════

/// Scripted predictor for tests and offline demos.
///
/// Outcomes are consumed in order; when the script runs out the last
/// configured fallback is returned.
pub struct MockPredictor {
    endpoint: String,
    script: Mutex<VecDeque<Result<PredictionResponse, PredictionError>>>,
    fallback: Result<PredictionResponse, PredictionError>,
    calls: AtomicUsize,
    requests: Mutex<Vec<PredictionRequest>>,
    gate: Mutex<Option<mpsc::Receiver<()>>>,
}

/// Releases a gated `MockPredictor` call. Dropping it also releases.
pub struct MockGate {
    tx: mpsc::Sender<()>,
}

impl MockGate {
    pub fn release(self) {
        let _ = self.tx.send(());
    }
}

impl MockPredictor {
    /// Always answers with `response`.
    pub fn answering(response: PredictionResponse) -> Self {
        Self::with_fallback(Ok(response))
    }

    /// Always fails with `error`.
    pub fn failing(error: PredictionError) -> Self {
        Self::with_fallback(Err(error))
    }

    fn with_fallback(fallback: Result<PredictionResponse, PredictionError>) -> Self {
        Self {
            endpoint: "http://mock.predictor".to_string(),
            script: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        }
    }

    /// Queue a one-off outcome ahead of the fallback.
    pub fn then(self, outcome: Result<PredictionResponse, PredictionError>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(outcome);
        }
        self
    }

    /// Block the first call until the returned gate is released.
    pub fn gated(self) -> (Self, MockGate) {
        let (tx, rx) = mpsc::channel();
        if let Ok(mut gate) = self.gate.lock() {
            *gate = Some(rx);
        }
        (self, MockGate { tx })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<PredictionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Predictor for MockPredictor {
    fn predict(&self, request: &PredictionRequest) -> Result<PredictionResponse, PredictionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let gate = self.gate.lock().ok().and_then(|mut g| g.take());
        if let Some(rx) = gate {
            let _ = rx.recv();
        }

        self.script
            .lock()
            .ok()
            .and_then(|mut s| s.pop_front())
            .unwrap_or_else(|| self.fallback.clone())
    }

    fn health(&self) -> Result<ServiceHealth, PredictionError> {
        Ok(ServiceHealth {
            status: "healthy".into(),
            timestamp: None,
            services: serde_json::Map::new(),
        })
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::Router;

    fn request() -> PredictionRequest {
        PredictionRequest {
            symptoms: vec!["Fever".into(), "Cough (Dry)".into()],
        }
    }

    fn flu() -> PredictionResponse {
        PredictionResponse::parse(
            r#"{"prediction":"Flu","top3":[{"disease":"Flu","confidence":82.4}],"shap":[]}"#,
        )
        .unwrap()
    }

    /// Serve `router` on an ephemeral localhost port, returning its base URL.
    async fn spawn_stub(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn predict_against(base_url: String) -> Result<PredictionResponse, PredictionError> {
        tokio::task::spawn_blocking(move || {
            let client = HttpPredictor::new(&base_url, Some(Duration::from_secs(5))).unwrap();
            client.predict(&request())
        })
        .await
        .unwrap()
    }

    #[test]
    fn interpret_success() {
        let body = r#"{"prediction":"Flu","top3":[{"disease":"Flu","confidence":82.4}],"shap":[]}"#;
        assert_eq!(interpret_response(200, body).unwrap(), flu());
    }

    #[test]
    fn interpret_non_2xx_keeps_body_verbatim() {
        let err = interpret_response(500, "internal error").unwrap_err();
        assert_eq!(
            err,
            PredictionError::Server {
                status: 500,
                body: "internal error".into()
            }
        );
    }

    #[test]
    fn interpret_2xx_garbage_is_malformed() {
        let err = interpret_response(200, "not json").unwrap_err();
        assert!(matches!(err, PredictionError::MalformedResponse(_)));
    }

    #[test]
    fn constructor_trims_trailing_slash() {
        let client = HttpPredictor::new("http://127.0.0.1:5000/", None).unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:5000");
        assert_eq!(client.timeout_secs, None);
    }

    #[tokio::test]
    async fn posts_symptoms_and_parses_success() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let router = Router::new().route(
            "/predict",
            post(move |axum::Json(body): axum::Json<serde_json::Value>| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(body["symptoms"], serde_json::json!(["Fever", "Cough (Dry)"]));
                    axum::Json(serde_json::json!({
                        "prediction": "Flu",
                        "top3": [{"disease": "Flu", "confidence": 82.4}],
                        "shap": [{"symptom": "Fever", "value": 0.31}]
                    }))
                }
            }),
        );
        let base = spawn_stub(router).await;

        let response = predict_against(base).await.unwrap();
        assert_eq!(response.primary_label(), "Flu");
        assert_eq!(response.shap.len(), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn server_500_surfaces_status_and_body() {
        let router = Router::new().route(
            "/predict",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "internal error") }),
        );
        let base = spawn_stub(router).await;

        let err = predict_against(base).await.unwrap_err();
        assert_eq!(
            err,
            PredictionError::Server {
                status: 500,
                body: "internal error".into()
            }
        );
    }

    #[tokio::test]
    async fn success_status_with_html_body_is_malformed() {
        let router = Router::new().route("/predict", post(|| async { "<h1>hello</h1>" }));
        let base = spawn_stub(router).await;

        let err = predict_against(base).await.unwrap_err();
        assert!(matches!(err, PredictionError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn unreachable_service_is_a_transport_error() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = predict_against(format!("http://{addr}")).await.unwrap_err();
        assert!(matches!(err, PredictionError::Transport(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn health_probe_parses_service_status() {
        let router = Router::new().route(
            "/health",
            get(|| async {
                axum::Json(serde_json::json!({
                    "status": "healthy",
                    "timestamp": "2026-10-18T10:00:00",
                    "services": {"model": "loaded", "s3": "configured"}
                }))
            }),
        );
        let base = spawn_stub(router).await;

        let health = tokio::task::spawn_blocking(move || {
            HttpPredictor::new(&base, None).unwrap().health()
        })
        .await
        .unwrap()
        .unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.services["model"], "loaded");
    }

    #[test]
    fn mock_replays_script_then_fallback() {
        let mock = MockPredictor::answering(flu()).then(Err(PredictionError::Timeout { secs: 1 }));
        assert!(mock.predict(&request()).is_err());
        assert_eq!(mock.predict(&request()).unwrap(), flu());
        assert_eq!(mock.predict(&request()).unwrap(), flu());
        assert_eq!(mock.call_count(), 3);
        assert_eq!(mock.requests().len(), 3);
    }

    #[test]
    fn gated_mock_waits_for_release() {
        let (mock, gate) = MockPredictor::answering(flu()).gated();
        let mock = Arc::new(mock);
        let worker = {
            let mock = mock.clone();
            std::thread::spawn(move || mock.predict(&request()))
        };
        gate.release();
        assert_eq!(worker.join().unwrap().unwrap(), flu());
        assert_eq!(mock.call_count(), 1);
    }
}
