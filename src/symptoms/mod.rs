//! Symptom catalog, search, and selection.

pub mod catalog;
pub mod search;
pub mod selection;

pub use catalog::{Symptom, SymptomCatalog, SYMPTOMS};
pub use search::{filter, ChecklistItem, DropdownView, NO_MATCHES_PLACEHOLDER};
pub use selection::{Chip, ChipsView, SelectionSet, EMPTY_SELECTION_HINT};
