//! Turns a settled prediction into display-ready view models.
//!
//! Confidence bars are independent (each is its own percentage, never
//! renormalized against the others). SHAP bars use a fixed linear
//! calibration: `min(|value| × scale, 100)` percent of the half-track,
//! anchored at the midpoint and growing right for supportive evidence,
//! left for contrary evidence.

use serde::Serialize;

use crate::config::DEFAULT_SHAP_SCALE;
use crate::prediction::{FailureKind, PredictionError, PredictionResponse};

// ═══════════════════════════════════════════
// View types, serialised to the frontend
// ═══════════════════════════════════════════

/// One row of the ranked list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceBar {
    pub disease: String,
    /// Rounded integer percent.
    pub percent: u32,
    /// `"82%"`.
    pub label: String,
    /// Filled width of the bar, 0–100.
    pub width_pct: u32,
}

/// Which way a contribution bar grows from the track midpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BarDirection {
    Rightward,
    Leftward,
}

/// Color coding by sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Evidence {
    /// Pushes towards the prediction.
    Supportive,
    /// Pushes away from it.
    Contrary,
}

/// One symptom's contribution bar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContributionBar {
    pub symptom: String,
    pub value: f64,
    /// Raw signed value at 4 decimals, e.g. `"-0.1200"`.
    pub value_label: String,
    pub length_pct: f64,
    pub direction: BarDirection,
    pub evidence: Evidence,
}

/// Everything the result card shows after a success.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultView {
    pub prediction: String,
    pub confidence_percent: u32,
    pub confidence_label: String,
    pub ranked: Vec<ConfidenceBar>,
    pub contributions: Vec<ContributionBar>,
}

/// Everything the result card shows after a failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureView {
    pub title: &'static str,
    pub kind: FailureKind,
    pub code: &'static str,
    /// Full user-facing message, e.g. `"Server error: 500 internal error"`.
    pub message: String,
    /// HTTP status for server errors.
    pub status: Option<u16>,
    /// Raw server body, verbatim, for server errors.
    pub body: Option<String>,
    /// `"Please ensure your server is running on <endpoint>"`.
    pub hint: String,
}

// ═══════════════════════════════════════════
// ResultPresenter
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
pub struct ResultPresenter {
    shap_scale: f64,
}

impl Default for ResultPresenter {
    fn default() -> Self {
        Self::new(DEFAULT_SHAP_SCALE)
    }
}

impl ResultPresenter {
    pub fn new(shap_scale: f64) -> Self {
        Self { shap_scale }
    }

    pub fn shap_scale(&self) -> f64 {
        self.shap_scale
    }

    /// Build the success view. Entries render in the order received;
    /// index 0 of `top3` is the primary.
    pub fn present(&self, response: &PredictionResponse) -> ResultView {
        let ranked: Vec<ConfidenceBar> = response
            .top3
            .iter()
            .map(|c| {
                let percent = rounded_percent(c.confidence);
                ConfidenceBar {
                    disease: c.disease.clone(),
                    percent,
                    label: format!("{percent}%"),
                    width_pct: percent.min(100),
                }
            })
            .collect();

        let confidence_percent = ranked.first().map(|b| b.percent).unwrap_or(0);

        ResultView {
            prediction: response.primary_label().to_string(),
            confidence_percent,
            confidence_label: format!("{confidence_percent}%"),
            ranked,
            contributions: response
                .shap
                .iter()
                .map(|s| self.contribution(&s.symptom, s.value))
                .collect(),
        }
    }

    fn contribution(&self, symptom: &str, value: f64) -> ContributionBar {
        // -0.0 would otherwise print as "-0.0000".
        let value = value + 0.0;
        let negative = value < 0.0;
        ContributionBar {
            symptom: symptom.to_string(),
            value,
            value_label: format!("{value:.4}"),
            length_pct: self.bar_length(value),
            direction: if negative {
                BarDirection::Leftward
            } else {
                BarDirection::Rightward
            },
            evidence: if negative {
                Evidence::Contrary
            } else {
                Evidence::Supportive
            },
        }
    }

    /// `min(|value| × scale, 100)`; NaN draws nothing.
    pub fn bar_length(&self, value: f64) -> f64 {
        let length = value.abs() * self.shap_scale;
        if length.is_nan() {
            return 0.0;
        }
        length.clamp(0.0, 100.0)
    }

    /// Build the failure view. Nothing from an earlier success survives.
    pub fn present_failure(&self, error: &PredictionError, endpoint: &str) -> FailureView {
        let (status, body) = match error {
            PredictionError::Server { status, body } => (Some(*status), Some(body.clone())),
            _ => (None, None),
        };
        FailureView {
            title: "Prediction Failed",
            kind: error.kind(),
            code: error.code(),
            message: error.to_string(),
            status,
            body,
            hint: format!("Please ensure your server is running on {endpoint}"),
        }
    }
}

/// Round half up to an integer percent, clamped to 0–100.
fn rounded_percent(confidence: f64) -> u32 {
    if !confidence.is_finite() {
        return 0;
    }
    (confidence + 0.5).floor().clamp(0.0, 100.0) as u32
}
