//! Medical report images: upload validation and the upload, view, and
//! delete flows across the record store and the blob store.
//!
//! Metadata lives in the `medicalReports` collection. The image itself
//! goes to the blob store under a timestamped name so user-supplied
//! file names never reach the bucket key.

use std::fmt::Display;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::blob::{BlobError, BlobStore, READ_URL_TTL_SECS};
use crate::records::{Record, RecordStore, StoreError, Stored};

pub const MAX_REPORT_BYTES: usize = 10 * 1024 * 1024;
pub const ACCEPTED_CONTENT_TYPES: &[&str] = &["image/png", "image/jpeg", "image/jpg"];
pub const EMPTY_REPORTS_MESSAGE: &str =
    "No reports uploaded yet. Start by uploading your first medical report above!";

// ═══════════════════════════════════════════
// Types
// ═══════════════════════════════════════════

/// Report metadata as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    /// Empty when the user left notes blank.
    pub notes: String,
    /// Blob name, `<unix millis>.<ext>`.
    pub file_name: String,
    /// Read URL returned at upload time. Expires; use `view_report` for a
    /// fresh one.
    pub url: String,
    pub upload_date: String,
}

impl Record for Report {
    const COLLECTION: &'static str = "medicalReports";
}

/// An upload as received from the form.
#[derive(Debug, Clone)]
pub struct ReportUpload {
    pub title: String,
    pub notes: String,
    pub original_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Please enter a report title")]
    MissingTitle,
    #[error("Please select a file")]
    MissingFile,
    #[error("Please upload a PNG or JPG image.")]
    UnsupportedType(String),
    #[error("File size must be less than 10MB.")]
    TooLarge(usize),
    #[error("Report not found")]
    NotFound(String),
    #[error("File storage error: {0}")]
    Blob(#[from] BlobError),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ReportError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id, .. } => Self::NotFound(id),
            other => Self::Store(other),
        }
    }
}

/// One card in the reports grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportCard {
    pub id: String,
    pub title: String,
    pub upload_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportsView {
    pub count_label: String,
    pub reports: Vec<ReportCard>,
    pub empty_message: Option<&'static str>,
}

/// The viewer modal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDetail {
    pub id: String,
    pub title: String,
    pub upload_date: String,
    pub notes: Option<String>,
    pub image_url: String,
}

// ═══════════════════════════════════════════
// Validation and naming
// ═══════════════════════════════════════════

impl ReportUpload {
    pub fn validate(&self) -> Result<(), ReportError> {
        if self.title.trim().is_empty() {
            return Err(ReportError::MissingTitle);
        }
        if self.bytes.is_empty() {
            return Err(ReportError::MissingFile);
        }
        let content_type = self.content_type.trim().to_ascii_lowercase();
        if !ACCEPTED_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(ReportError::UnsupportedType(self.content_type.clone()));
        }
        if self.bytes.len() > MAX_REPORT_BYTES {
            return Err(ReportError::TooLarge(self.bytes.len()));
        }
        Ok(())
    }

    /// `<unix millis>.<ext>`, the extension taken from the original name.
    pub fn blob_name(&self, now: DateTime<Utc>) -> String {
        let ext = self
            .original_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or(match self.content_type.trim() {
                "image/png" => "png",
                _ => "jpg",
            });
        format!("{}.{ext}", now.timestamp_millis())
    }
}

/// Same shape as a US-locale `toLocaleString`: `1/5/2026, 3:04:05 PM`.
pub fn upload_date_label<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    at.format("%-m/%-d/%Y, %-I:%M:%S %p").to_string()
}

/// `"0 reports"`, `"1 report"`, `"4 reports"`.
pub fn report_count_label(count: usize) -> String {
    if count == 1 {
        "1 report".to_string()
    } else {
        format!("{count} reports")
    }
}

pub fn reports_view(reports: &[Stored<Report>]) -> ReportsView {
    ReportsView {
        count_label: report_count_label(reports.len()),
        reports: reports
            .iter()
            .map(|r| ReportCard {
                id: r.id.clone(),
                title: r.record.title.clone(),
                upload_date: r.record.upload_date.clone(),
            })
            .collect(),
        empty_message: reports.is_empty().then_some(EMPTY_REPORTS_MESSAGE),
    }
}

// ═══════════════════════════════════════════
// Flows
// ═══════════════════════════════════════════

/// Upload the image, then save its metadata. If the metadata save fails
/// the blob is removed again.
pub fn upload_report(
    store: &dyn RecordStore<Report>,
    blobs: &dyn BlobStore,
    owner_id: &str,
    upload: ReportUpload,
) -> Result<Stored<Report>, ReportError> {
    upload.validate()?;
    let now = Utc::now();
    let blob_name = upload.blob_name(now);
    let size = upload.bytes.len();

    let blob = blobs.upload(owner_id, &blob_name, upload.content_type.trim(), upload.bytes)?;

    let report = Report {
        title: upload.title.trim().to_string(),
        notes: upload.notes.trim().to_string(),
        file_name: blob.file_name.clone(),
        url: blob.url,
        upload_date: upload_date_label(&now.with_timezone(&Local)),
    };

    match store.create(owner_id, report) {
        Ok(stored) => {
            tracing::info!(report_id = %stored.id, size, "Report uploaded");
            Ok(stored)
        }
        Err(err) => {
            if let Err(cleanup) = blobs.delete(owner_id, &blob.file_name) {
                tracing::warn!(error = %cleanup, "Failed to remove orphaned report blob");
            }
            Err(err.into())
        }
    }
}

pub fn list_reports(
    store: &dyn RecordStore<Report>,
    owner_id: &str,
) -> Result<ReportsView, ReportError> {
    Ok(reports_view(&store.list_by_owner(owner_id)?))
}

/// Metadata plus a fresh read URL valid for an hour.
pub fn view_report(
    store: &dyn RecordStore<Report>,
    blobs: &dyn BlobStore,
    owner_id: &str,
    report_id: &str,
) -> Result<ReportDetail, ReportError> {
    let stored = store.get(owner_id, report_id)?;
    let image_url = blobs.signed_url(
        owner_id,
        &stored.record.file_name,
        Duration::from_secs(READ_URL_TTL_SECS),
    )?;
    let report = stored.record;
    Ok(ReportDetail {
        id: stored.id,
        title: report.title,
        upload_date: report.upload_date,
        notes: (!report.notes.is_empty()).then_some(report.notes),
        image_url,
    })
}

/// Remove the blob first, then the metadata.
pub fn delete_report(
    store: &dyn RecordStore<Report>,
    blobs: &dyn BlobStore,
    owner_id: &str,
    report_id: &str,
) -> Result<(), ReportError> {
    let stored = store.get(owner_id, report_id)?;
    blobs.delete(owner_id, &stored.record.file_name)?;
    store.delete(owner_id, report_id)?;
    tracing::info!(report_id, "Report deleted");
    Ok(())
}
