//! The set of symptoms the user has picked, plus the chip view built
//! from it.

use std::collections::HashSet;

use serde::Serialize;

use super::catalog::Symptom;

/// Hint shown in the chip area while nothing is selected.
pub const EMPTY_SELECTION_HINT: &str = "Click to select symptoms";

/// Membership-only set of catalog symptoms.
///
/// Insertion order carries no meaning. Snapshots come back in catalog
/// order so renders are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    members: HashSet<Symptom>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add if absent, remove if present. Returns `true` when the symptom
    /// is selected afterwards.
    pub fn toggle(&mut self, symptom: Symptom) -> bool {
        if self.members.remove(&symptom) {
            false
        } else {
            self.members.insert(symptom);
            true
        }
    }

    /// Remove without toggling. Returns whether anything changed.
    pub fn remove(&mut self, symptom: &Symptom) -> bool {
        self.members.remove(symptom)
    }

    pub fn contains(&self, symptom: &Symptom) -> bool {
        self.members.contains(symptom)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Materialized selection in catalog order.
    pub fn snapshot(&self) -> Vec<Symptom> {
        let mut members: Vec<Symptom> = self.members.iter().copied().collect();
        members.sort_by_key(|s| s.position());
        members
    }

    pub fn labels(&self) -> Vec<String> {
        self.snapshot()
            .into_iter()
            .map(|s| s.label().to_string())
            .collect()
    }
}

/// A removable tag for one selected symptom.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chip {
    pub label: &'static str,
}

/// What the chip area shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChipsView {
    Hint { text: &'static str },
    Chips { chips: Vec<Chip> },
}

impl ChipsView {
    pub fn build(selection: &SelectionSet) -> Self {
        if selection.is_empty() {
            return Self::Hint {
                text: EMPTY_SELECTION_HINT,
            };
        }
        Self::Chips {
            chips: selection
                .snapshot()
                .into_iter()
                .map(|s| Chip { label: s.label() })
                .collect(),
        }
    }
}
