//! Fixed catalog of symptom labels the predictor was trained on.
//!
//! A `Symptom` can only be obtained from a catalog, so every selection
//! is a subset of the catalog by construction.

use serde::{Serialize, Serializer};

/// Known symptoms in canonical display order.
pub const SYMPTOMS: &[&str] = &[
    "Fever",
    "Cough (Dry)",
    "Cough (Productive)",
    "Sore Throat",
    "Runny Nose",
    "Nasal Congestion",
    "Sneezing",
    "Headache (General)",
    "Headache (Throbbing)",
    "Body Aches",
    "Fatigue",
    "Chills",
    "Shortness of Breath",
    "Chest Pain (Sharp)",
    "Chest Tightness",
    "Nausea",
    "Vomiting",
    "Diarrhea",
    "Abdominal Pain (General)",
    "Abdominal Pain (Lower Right)",
    "Loss of Appetite",
    "Loss of Smell/Taste",
    "Dizziness",
    "Rash",
    "Itching",
    "Eye Redness",
    "Ear Pain",
];

/// A catalog symptom. Identity is the label; the position only fixes
/// canonical display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symptom {
    position: usize,
    label: &'static str,
}

impl Symptom {
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Index in the catalog's canonical order.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl std::fmt::Display for Symptom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label)
    }
}

impl Serialize for Symptom {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label)
    }
}

/// Ordered, immutable list of known symptoms.
#[derive(Debug, Clone, Copy)]
pub struct SymptomCatalog {
    labels: &'static [&'static str],
}

impl Default for SymptomCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl SymptomCatalog {
    /// The catalog shipped with the app.
    pub fn standard() -> Self {
        Self { labels: SYMPTOMS }
    }

    /// A catalog over any static label list (labels are assumed unique).
    pub fn from_static(labels: &'static [&'static str]) -> Self {
        Self { labels }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// All symptoms in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = Symptom> + '_ {
        self.labels
            .iter()
            .enumerate()
            .map(|(position, &label)| Symptom { position, label })
    }

    /// Exact, case-sensitive label lookup.
    pub fn lookup(&self, label: &str) -> Option<Symptom> {
        self.iter().find(|s| s.label == label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains(&label)
    }
}
