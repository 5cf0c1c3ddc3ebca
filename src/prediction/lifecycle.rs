//! Single-flight request lifecycle.
//!
//! ```text
//! Idle ──begin──▶ Pending ──settle(ok)──▶ Succeeded ─┐
//!                    │                                │ begin
//!                    └──settle(err)─▶ Failed ─────────┤
//!                    ▲                                │
//!                    └────────────────────────────────┘
//! ```
//!
//! Every submission gets a monotonic sequence number. A settlement whose
//! sequence is not the latest submission is dropped, so the machine stays
//! correct even if a caller relaxes single-flight.

use super::error::PredictionError;
use super::types::{PredictionRequest, PredictionResponse};
use crate::symptoms::Symptom;

/// Current request state. Exactly one is live at a time.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RequestState {
    #[default]
    Idle,
    Pending { seq: u64 },
    Succeeded { seq: u64, response: PredictionResponse },
    Failed { seq: u64, error: PredictionError },
}

impl RequestState {
    pub fn phase(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Pending { .. } => "pending",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }
}

/// A request that has been admitted and must be sent exactly once,
/// then reported back via [`RequestLifecycle::settle`].
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub seq: u64,
    pub request: PredictionRequest,
}

/// What `settle` did with a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Applied,
    /// Not the latest submission; ignored.
    Stale,
}

#[derive(Debug, Default)]
pub struct RequestLifecycle {
    state: RequestState,
    last_seq: u64,
}

impl RequestLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &RequestState {
        &self.state
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, RequestState::Pending { .. })
    }

    /// Admit a new submission.
    ///
    /// Returns `None` (no-op) when the snapshot is empty or a request is
    /// already in flight. Otherwise moves to `Pending`, discarding any
    /// previous result.
    pub fn begin(&mut self, snapshot: &[Symptom]) -> Option<Submission> {
        if self.is_pending() {
            tracing::debug!("Submit ignored: request already pending");
            return None;
        }
        let request = PredictionRequest::from_snapshot(snapshot)?;

        self.last_seq += 1;
        let seq = self.last_seq;
        self.state = RequestState::Pending { seq };
        tracing::debug!(seq, symptoms = request.symptoms.len(), "Prediction pending");

        Some(Submission { seq, request })
    }

    /// Record the outcome of submission `seq`.
    pub fn settle(
        &mut self,
        seq: u64,
        outcome: Result<PredictionResponse, PredictionError>,
    ) -> Settlement {
        if self.state != (RequestState::Pending { seq }) {
            tracing::debug!(seq, latest = self.last_seq, "Discarding stale prediction result");
            return Settlement::Stale;
        }

        self.state = match outcome {
            Ok(response) => {
                tracing::debug!(seq, "Prediction succeeded");
                RequestState::Succeeded { seq, response }
            }
            Err(error) => {
                tracing::warn!(seq, code = error.code(), %error, "Prediction failed");
                RequestState::Failed { seq, error }
            }
        };
        Settlement::Applied
    }
}
