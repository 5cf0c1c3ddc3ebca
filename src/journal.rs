//! Daily health log: form validation, storage, and card rendering.
//!
//! Entries are owner-scoped records in the `healthEntries` collection.
//! Optional fields left blank are stored with their placeholder text so
//! older entries and new ones render the same way.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::records::{Record, RecordStore, StoreError, Stored};

pub const NOT_SPECIFIED: &str = "Not specified";
pub const NO_NOTES: &str = "No notes";
pub const EMPTY_JOURNAL_MESSAGE: &str =
    "No entries yet. Start tracking your health by filling out the form above!";

// ═══════════════════════════════════════════
// Types
// ═══════════════════════════════════════════

/// One day's log as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyEntry {
    pub date: NaiveDate,
    pub mood: String,
    pub sleep: String,
    pub water: String,
    pub meals: String,
    pub notes: String,
}

impl Record for DailyEntry {
    const COLLECTION: &'static str = "healthEntries";
}

/// The daily-entry form as submitted. Blank optional fields are allowed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DailyEntryForm {
    pub date: String, // YYYY-MM-DD
    pub mood: String,
    #[serde(default)]
    pub sleep: Option<String>,
    #[serde(default)]
    pub water: Option<String>,
    #[serde(default)]
    pub meals: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("Please choose a date")]
    MissingDate,
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Please choose a mood")]
    MissingMood,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One rendered entry card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryCard {
    pub id: String,
    /// `"Monday, January 5, 2026"`.
    pub date_label: String,
    /// When the entry was saved, RFC 3339.
    pub recorded_at: String,
    pub mood: String,
    pub sleep: String,
    pub water: String,
    pub meals: String,
    /// `None` when the entry has no notes.
    pub notes: Option<String>,
}

/// The history list with its header count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JournalView {
    pub count_label: String,
    pub entries: Vec<EntryCard>,
    /// Shown instead of cards when there are none.
    pub empty_message: Option<&'static str>,
}

// ═══════════════════════════════════════════
// Form handling
// ═══════════════════════════════════════════

fn or_placeholder(value: Option<String>, placeholder: &str) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => placeholder.to_string(),
    }
}

impl DailyEntryForm {
    /// Check required fields and fill blanks with their placeholders.
    pub fn into_entry(self) -> Result<DailyEntry, JournalError> {
        let date = self.date.trim();
        if date.is_empty() {
            return Err(JournalError::MissingDate);
        }
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| JournalError::InvalidDate(date.to_string()))?;
        let mood = self.mood.trim();
        if mood.is_empty() {
            return Err(JournalError::MissingMood);
        }

        Ok(DailyEntry {
            date,
            mood: mood.to_string(),
            sleep: or_placeholder(self.sleep, NOT_SPECIFIED),
            water: or_placeholder(self.water, NOT_SPECIFIED),
            meals: or_placeholder(self.meals, NOT_SPECIFIED),
            notes: or_placeholder(self.notes, NO_NOTES),
        })
    }
}

// ═══════════════════════════════════════════
// Display helpers
// ═══════════════════════════════════════════

/// `"Monday, January 5, 2026"`.
pub fn long_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

/// `"0 entries"`, `"1 entry"`, `"3 entries"`.
pub fn entry_count_label(count: usize) -> String {
    if count == 1 {
        "1 entry".to_string()
    } else {
        format!("{count} entries")
    }
}

pub fn card(stored: &Stored<DailyEntry>) -> EntryCard {
    let entry = &stored.record;
    EntryCard {
        id: stored.id.clone(),
        date_label: long_date(entry.date),
        recorded_at: stored.created_at.to_rfc3339(),
        mood: entry.mood.clone(),
        sleep: entry.sleep.clone(),
        water: entry.water.clone(),
        meals: entry.meals.clone(),
        notes: (entry.notes != NO_NOTES).then(|| entry.notes.clone()),
    }
}

pub fn journal_view(entries: &[Stored<DailyEntry>]) -> JournalView {
    JournalView {
        count_label: entry_count_label(entries.len()),
        entries: entries.iter().map(card).collect(),
        empty_message: entries.is_empty().then_some(EMPTY_JOURNAL_MESSAGE),
    }
}

// ═══════════════════════════════════════════
// Operations
// ═══════════════════════════════════════════

pub fn record_entry(
    store: &dyn RecordStore<DailyEntry>,
    owner_id: &str,
    form: DailyEntryForm,
) -> Result<Stored<DailyEntry>, JournalError> {
    let entry = form.into_entry()?;
    let stored = store.create(owner_id, entry)?;
    tracing::info!(entry_id = %stored.id, "Daily entry recorded");
    Ok(stored)
}

pub fn load_journal(
    store: &dyn RecordStore<DailyEntry>,
    owner_id: &str,
) -> Result<JournalView, JournalError> {
    let entries = store.list_by_owner(owner_id)?;
    Ok(journal_view(&entries))
}

pub fn delete_entry(
    store: &dyn RecordStore<DailyEntry>,
    owner_id: &str,
    entry_id: &str,
) -> Result<(), JournalError> {
    store.delete(owner_id, entry_id)?;
    tracing::info!(entry_id, "Daily entry deleted");
    Ok(())
}
