//! Incremental search over the symptom catalog and the dropdown view
//! built from it.

use serde::Serialize;

use super::catalog::{Symptom, SymptomCatalog};
use super::selection::SelectionSet;

/// Placeholder shown when a query matches nothing.
pub const NO_MATCHES_PLACEHOLDER: &str = "No symptoms found";

/// Case-insensitive substring filter. Surrounding whitespace in the query
/// is ignored; an empty query returns the whole catalog in canonical order.
pub fn filter(catalog: &SymptomCatalog, query: &str) -> Vec<Symptom> {
    let needle = query.trim().to_lowercase();
    catalog
        .iter()
        .filter(|s| needle.is_empty() || s.label().to_lowercase().contains(&needle))
        .collect()
}

/// One row of the filtered checklist.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChecklistItem {
    pub label: &'static str,
    pub checked: bool,
}

/// What the dropdown panel shows.
///
/// `NoMatches` is distinct from `Closed` so the caller can tell
/// "nothing rendered" apart from "searched and found nothing".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DropdownView {
    Closed,
    NoMatches { placeholder: &'static str },
    Items { items: Vec<ChecklistItem> },
}

impl DropdownView {
    /// Re-run the filter and mark each match with its selection state.
    pub fn build(
        catalog: &SymptomCatalog,
        query: &str,
        selection: &SelectionSet,
        open: bool,
    ) -> Self {
        if !open {
            return Self::Closed;
        }
        let matches = filter(catalog, query);
        if matches.is_empty() {
            return Self::NoMatches {
                placeholder: NO_MATCHES_PLACEHOLDER,
            };
        }
        Self::Items {
            items: matches
                .into_iter()
                .map(|s| ChecklistItem {
                    label: s.label(),
                    checked: selection.contains(&s),
                })
                .collect(),
        }
    }

    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Closed)
    }
}
