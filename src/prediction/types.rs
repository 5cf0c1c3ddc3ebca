//! Wire types for `POST /predict` and `GET /health`.

use serde::{Deserialize, Serialize};

use super::error::PredictionError;
use crate::symptoms::Symptom;

/// Request body: a snapshot of the selection. The server treats it as
/// an unordered set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRequest {
    pub symptoms: Vec<String>,
}

impl PredictionRequest {
    /// Returns `None` for an empty snapshot; an empty request is never sent.
    pub fn from_snapshot(snapshot: &[Symptom]) -> Option<Self> {
        if snapshot.is_empty() {
            return None;
        }
        Some(Self {
            symptoms: snapshot.iter().map(|s| s.label().to_string()).collect(),
        })
    }
}

/// One ranked candidate. `confidence` is a percentage on a 0–100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCondition {
    pub disease: String,
    pub confidence: f64,
}

/// Signed contribution of one symptom towards the prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapContribution {
    pub symptom: String,
    pub value: f64,
}

/// Success body. `prediction` may be absent; `top3[0].disease` stands in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    #[serde(default)]
    pub prediction: Option<String>,
    pub top3: Vec<RankedCondition>,
    pub shap: Vec<ShapContribution>,
}

impl PredictionResponse {
    /// Parse and validate a 2xx body.
    ///
    /// Invalid JSON, missing fields, and an empty `top3` are all
    /// `MalformedResponse`.
    pub fn parse(body: &str) -> Result<Self, PredictionError> {
        let parsed: Self = serde_json::from_str(body)
            .map_err(|e| PredictionError::MalformedResponse(e.to_string()))?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<(), PredictionError> {
        if self.top3.is_empty() {
            return Err(PredictionError::MalformedResponse(
                "top3 must contain at least one entry".into(),
            ));
        }
        Ok(())
    }

    /// The highest-ranked entry as received (index 0, not re-sorted).
    pub fn primary(&self) -> Option<&RankedCondition> {
        self.top3.first()
    }

    /// Label for the primary prediction.
    pub fn primary_label(&self) -> &str {
        match self.prediction.as_deref() {
            Some(label) if !label.trim().is_empty() => label,
            _ => self.primary().map(|c| c.disease.as_str()).unwrap_or(""),
        }
    }
}

/// Body of the service's `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub services: serde_json::Map<String, serde_json::Value>,
}
