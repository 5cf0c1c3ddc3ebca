use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// Application-level constants
pub const APP_NAME: &str = "HealthAI";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prediction + report-storage service used when nothing is configured.
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000";

/// Local API server address used when nothing is configured.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Prediction request timeout in seconds. `0` disables the timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Display calibration for SHAP bars: `|value| × scale`, clamped to 100%.
/// Not derived from the data range, so bars saturate for |value| ≥ 100/scale.
pub const DEFAULT_SHAP_SCALE: f64 = 200.0;

/// Signed-in sessions unused for this long are dropped.
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 12 * 60 * 60;

const ENV_API_URL: &str = "HEALTHAI_API_URL";
const ENV_BIND: &str = "HEALTHAI_BIND";
const ENV_STORAGE: &str = "HEALTHAI_STORAGE";
const ENV_DATA_DIR: &str = "HEALTHAI_DATA_DIR";
const ENV_TIMEOUT: &str = "HEALTHAI_REQUEST_TIMEOUT_SECS";
const ENV_SHAP_SCALE: &str = "HEALTHAI_SHAP_SCALE";
const ENV_SESSION_IDLE: &str = "HEALTHAI_SESSION_IDLE_SECS";

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "healthai_lib=info,tower_http=info"
}

/// Get the application data directory.
/// ~/HealthAI/ on all platforms; falls back to the working directory
/// when no home directory can be resolved.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

// ═══════════════════════════════════════════════════════════
// Storage backend selection
// ═══════════════════════════════════════════════════════════

/// Where report images live. Records (journal entries, report metadata)
/// always go to the local SQLite document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Files on this device under `<data dir>/blobs`.
    Local,
    /// The remote report-storage service at the API base URL.
    Cloud,
}

impl std::str::FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "cloud" => Ok(Self::Cloud),
            other => Err(ConfigError::Invalid {
                key: ENV_STORAGE,
                value: other.to_string(),
                reason: "expected `local` or `cloud`".into(),
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

// ═══════════════════════════════════════════════════════════
// AppConfig
// ═══════════════════════════════════════════════════════════

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    /// Base URL of the prediction service (no trailing slash).
    pub api_base_url: String,
    pub bind_addr: SocketAddr,
    pub storage: StorageBackend,
    pub data_dir: PathBuf,
    /// `None` means a hung prediction request stays pending.
    pub request_timeout_secs: Option<u64>,
    pub shap_scale: f64,
    pub session_idle_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            storage: StorageBackend::Local,
            data_dir: app_data_dir(),
            request_timeout_secs: Some(DEFAULT_REQUEST_TIMEOUT_SECS),
            shap_scale: DEFAULT_SHAP_SCALE,
            session_idle_secs: DEFAULT_SESSION_IDLE_SECS,
        }
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (environment in production,
    /// a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = non_empty(lookup(ENV_API_URL)) {
            config.api_base_url = url.trim().trim_end_matches('/').to_string();
        }

        let bind = non_empty(lookup(ENV_BIND)).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        config.bind_addr = bind.trim().parse().map_err(|e| ConfigError::Invalid {
            key: ENV_BIND,
            value: bind.clone(),
            reason: format!("{e}"),
        })?;

        if let Some(storage) = non_empty(lookup(ENV_STORAGE)) {
            config.storage = storage.parse()?;
        }

        if let Some(dir) = non_empty(lookup(ENV_DATA_DIR)) {
            config.data_dir = PathBuf::from(dir);
        }

        if let Some(raw) = non_empty(lookup(ENV_TIMEOUT)) {
            let secs: u64 = raw.trim().parse().map_err(|e| ConfigError::Invalid {
                key: ENV_TIMEOUT,
                value: raw.clone(),
                reason: format!("{e}"),
            })?;
            config.request_timeout_secs = (secs > 0).then_some(secs);
        }

        if let Some(raw) = non_empty(lookup(ENV_SHAP_SCALE)) {
            let scale: f64 = raw.trim().parse().map_err(|e| ConfigError::Invalid {
                key: ENV_SHAP_SCALE,
                value: raw.clone(),
                reason: format!("{e}"),
            })?;
            if !scale.is_finite() || scale <= 0.0 {
                return Err(ConfigError::Invalid {
                    key: ENV_SHAP_SCALE,
                    value: raw,
                    reason: "must be a positive number".into(),
                });
            }
            config.shap_scale = scale;
        }

        if let Some(raw) = non_empty(lookup(ENV_SESSION_IDLE)) {
            let secs: u64 = raw.trim().parse().map_err(|e| ConfigError::Invalid {
                key: ENV_SESSION_IDLE,
                value: raw.clone(),
                reason: format!("{e}"),
            })?;
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    key: ENV_SESSION_IDLE,
                    value: raw,
                    reason: "must be at least one second".into(),
                });
            }
            config.session_idle_secs = secs;
        }

        Ok(config)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    /// SQLite database holding accounts and records.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("healthai.db")
    }

    /// Root directory of the local blob store.
    pub fn blob_dir(&self) -> PathBuf {
        self.data_dir.join("blobs")
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
