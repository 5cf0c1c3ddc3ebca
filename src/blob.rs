//! Blob store for report images.
//!
//! Objects are keyed `medical-reports/<owner>/<clean name>`. The cloud
//! backend goes through the service's `/s3/*` endpoints; the local
//! backend writes files under the data directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const KEY_PREFIX: &str = "medical-reports";
/// Lifetime of a read URL handed to the viewer.
pub const READ_URL_TTL_SECS: u64 = 3600;

const BLOB_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("Invalid blob name: {0}")]
    InvalidName(String),
    #[error("Network error: {0}")]
    Transport(String),
    #[error("Server responded with {status}: {message}")]
    Server { status: u16, message: String },
    #[error("Blob store rejected request: {0}")]
    Rejected(String),
    #[error("Blob I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where an uploaded object ended up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlobRef {
    pub key: String,
    pub file_name: String,
    pub url: String,
}

pub trait BlobStore: Send + Sync {
    fn upload(
        &self,
        owner_id: &str,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<BlobRef, BlobError>;

    fn delete(&self, owner_id: &str, file_name: &str) -> Result<(), BlobError>;

    /// A URL that can read the object for about `expires_in`.
    fn signed_url(
        &self,
        owner_id: &str,
        file_name: &str,
        expires_in: Duration,
    ) -> Result<String, BlobError>;
}

// ═══════════════════════════════════════════
// Naming
// ═══════════════════════════════════════════

/// Replace anything outside `[A-Za-z0-9._-]` with `_`, then make sure the
/// name carries an extension (from `content_type`, else `jpg`).
pub fn clean_file_name(file_name: &str, content_type: &str) -> String {
    let mut clean: String = file_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if !clean.contains('.') {
        clean.push('.');
        clean.push_str(extension_for(content_type));
    }
    clean
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type.trim().to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|exts| exts.first().copied())
            .unwrap_or("jpg"),
    }
}

pub fn blob_key(owner_id: &str, clean_name: &str) -> String {
    format!("{KEY_PREFIX}/{owner_id}/{clean_name}")
}

fn check_owner(owner_id: &str) -> Result<(), BlobError> {
    if owner_id.is_empty() || owner_id.contains(['/', '\\']) || owner_id.contains("..") {
        return Err(BlobError::InvalidName(format!("owner {owner_id:?}")));
    }
    Ok(())
}

fn check_name(clean_name: &str) -> Result<(), BlobError> {
    if clean_name.is_empty() || clean_name.starts_with('.') {
        return Err(BlobError::InvalidName(clean_name.to_string()));
    }
    Ok(())
}

// ═══════════════════════════════════════════
// HttpBlobStore
// ═══════════════════════════════════════════

/// Response envelope shared by the `/s3/*` endpoints.
#[derive(Debug, Deserialize)]
struct BlobEnvelope {
    #[serde(default)]
    success: bool,
    url: Option<String>,
    key: Option<String>,
    #[serde(rename = "fileName")]
    file_name: Option<String>,
    error: Option<String>,
}

pub struct HttpBlobStore {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpBlobStore {
    pub fn new(base_url: &str) -> Result<Self, BlobError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(BLOB_TIMEOUT_SECS))
            .build()
            .map_err(|e| BlobError::Transport(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn finish(response: reqwest::blocking::Response) -> Result<BlobEnvelope, BlobError> {
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| BlobError::Transport(e.to_string()))?;
        let envelope = serde_json::from_str::<BlobEnvelope>(&body).ok();

        if !status.is_success() {
            let message = envelope.and_then(|e| e.error).unwrap_or(body);
            return Err(BlobError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let envelope = envelope
            .ok_or_else(|| BlobError::Rejected(format!("unreadable response: {body}")))?;
        if !envelope.success {
            return Err(BlobError::Rejected(
                envelope.error.clone().unwrap_or_else(|| "request failed".into()),
            ));
        }
        Ok(envelope)
    }

    fn post_json(&self, path: &str, body: serde_json::Value) -> Result<BlobEnvelope, BlobError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(&body)
            .send()
            .map_err(|e| BlobError::Transport(e.to_string()))?;
        Self::finish(response)
    }
}

impl BlobStore for HttpBlobStore {
    fn upload(
        &self,
        owner_id: &str,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<BlobRef, BlobError> {
        check_owner(owner_id)?;
        let clean = clean_file_name(file_name, content_type);
        check_name(&clean)?;

        let mime = if content_type.trim().is_empty() {
            mime_guess::from_path(&clean).first_or_octet_stream().to_string()
        } else {
            content_type.to_string()
        };
        let part = reqwest::blocking::multipart::Part::bytes(bytes)
            .file_name(clean.clone())
            .mime_str(&mime)
            .map_err(|e| BlobError::InvalidName(format!("content type {mime}: {e}")))?;
        let form = reqwest::blocking::multipart::Form::new()
            .part("file", part)
            .text("userId", owner_id.to_string())
            .text("fileName", clean.clone());

        let response = self
            .client
            .post(format!("{}/s3/upload", self.base_url))
            .multipart(form)
            .send()
            .map_err(|e| BlobError::Transport(e.to_string()))?;
        let envelope = Self::finish(response)?;

        let file_name = envelope.file_name.unwrap_or(clean);
        tracing::info!(owner_id, file_name = %file_name, "Blob uploaded");
        Ok(BlobRef {
            key: envelope
                .key
                .unwrap_or_else(|| blob_key(owner_id, &file_name)),
            url: envelope.url.unwrap_or_default(),
            file_name,
        })
    }

    fn delete(&self, owner_id: &str, file_name: &str) -> Result<(), BlobError> {
        check_owner(owner_id)?;
        check_name(file_name)?;
        self.post_json(
            "/s3/delete",
            serde_json::json!({ "userId": owner_id, "fileName": file_name }),
        )?;
        tracing::info!(owner_id, file_name, "Blob deleted");
        Ok(())
    }

    fn signed_url(
        &self,
        owner_id: &str,
        file_name: &str,
        expires_in: Duration,
    ) -> Result<String, BlobError> {
        check_owner(owner_id)?;
        check_name(file_name)?;
        let envelope = self.post_json(
            "/s3/get-signed-url",
            serde_json::json!({
                "userId": owner_id,
                "fileName": file_name,
                "expiresIn": expires_in.as_secs(),
            }),
        )?;
        envelope
            .url
            .ok_or_else(|| BlobError::Rejected("no url in response".into()))
    }
}

// ═══════════════════════════════════════════
// LocalBlobStore
// ═══════════════════════════════════════════

/// Files under `<root>/<key>`. Read URLs are `file://` and never expire.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, owner_id: &str, clean_name: &str) -> PathBuf {
        self.root.join(KEY_PREFIX).join(owner_id).join(clean_name)
    }

    fn file_url(path: &Path) -> String {
        format!("file://{}", path.display())
    }
}

impl BlobStore for LocalBlobStore {
    fn upload(
        &self,
        owner_id: &str,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<BlobRef, BlobError> {
        check_owner(owner_id)?;
        let clean = clean_file_name(file_name, content_type);
        check_name(&clean)?;

        let path = self.path_for(owner_id, &clean);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, &bytes)?;
        tracing::info!(owner_id, file_name = %clean, size = bytes.len(), "Blob stored locally");

        Ok(BlobRef {
            key: blob_key(owner_id, &clean),
            url: Self::file_url(&path),
            file_name: clean,
        })
    }

    fn delete(&self, owner_id: &str, file_name: &str) -> Result<(), BlobError> {
        check_owner(owner_id)?;
        check_name(file_name)?;
        match std::fs::remove_file(self.path_for(owner_id, file_name)) {
            Ok(()) => Ok(()),
            // Deleting a missing object succeeds, as it does in the bucket.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn signed_url(
        &self,
        owner_id: &str,
        file_name: &str,
        _expires_in: Duration,
    ) -> Result<String, BlobError> {
        check_owner(owner_id)?;
        check_name(file_name)?;
        let path = self.path_for(owner_id, file_name);
        if !path.exists() {
            return Err(BlobError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", blob_key(owner_id, file_name)),
            )));
        }
        Ok(Self::file_url(&path))
    }
}
