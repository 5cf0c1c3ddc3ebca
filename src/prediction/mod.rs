//! Prediction service contract, clients, and the request lifecycle.

pub mod client;
pub mod error;
pub mod lifecycle;
pub mod types;

pub use client::{interpret_response, HttpPredictor, MockGate, MockPredictor, Predictor};
pub use error::{FailureKind, PredictionError};
pub use lifecycle::{RequestLifecycle, RequestState, Settlement, Submission};
pub use types::{PredictionRequest, PredictionResponse, RankedCondition, ServiceHealth, ShapContribution};
