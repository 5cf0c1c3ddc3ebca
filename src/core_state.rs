//! Transport-agnostic application state.
//!
//! `CoreState` holds the configured collaborators (predictor, identity,
//! record stores, blob store) and the table of signed-in sessions. Each
//! session owns its own picker `Controller`, so two browser tabs never
//! share a selection. Wrapped in `Arc` at startup and handed to the HTTP
//! layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use crate::blob::{BlobStore, HttpBlobStore, LocalBlobStore};
use crate::config::{AppConfig, StorageBackend};
use crate::controller::Controller;
use crate::db;
use crate::identity::{generate_token, hash_token, IdentityProvider, LocalIdentityProvider, UserProfile};
use crate::journal::DailyEntry;
use crate::prediction::{HttpPredictor, Predictor};
use crate::presenter::ResultPresenter;
use crate::records::{MemoryRecordStore, RecordStore, SqliteRecordStore};
use crate::reports::Report;
use crate::symptoms::SymptomCatalog;

// ═══════════════════════════════════════════════════════════
// Services
// ═══════════════════════════════════════════════════════════

/// The collaborators `CoreState` delegates to.
pub struct Services {
    pub predictor: Arc<dyn Predictor>,
    pub identity: Arc<dyn IdentityProvider>,
    pub journal: Arc<dyn RecordStore<DailyEntry>>,
    pub reports: Arc<dyn RecordStore<Report>>,
    pub blobs: Arc<dyn BlobStore>,
}

impl Services {
    /// Production wiring from configuration.
    ///
    /// Builds blocking HTTP clients, so call it outside an async runtime.
    pub fn from_config(config: &AppConfig) -> Result<Self, CoreError> {
        let db_path = config.database_path();
        let predictor = HttpPredictor::new(&config.api_base_url, config.request_timeout())
            .map_err(|e| CoreError::Setup(e.to_string()))?;

        let blobs: Arc<dyn BlobStore> = match config.storage {
            StorageBackend::Local => Arc::new(LocalBlobStore::new(config.blob_dir())),
            StorageBackend::Cloud => Arc::new(
                HttpBlobStore::new(&config.api_base_url)
                    .map_err(|e| CoreError::Setup(e.to_string()))?,
            ),
        };

        tracing::info!(
            database = %db_path.display(),
            storage = ?config.storage,
            predictor = %config.api_base_url,
            "Opening services"
        );

        Ok(Self {
            predictor: Arc::new(predictor),
            identity: Arc::new(LocalIdentityProvider::new(db::open_database(&db_path)?)),
            journal: Arc::new(SqliteRecordStore::new(db::open_database(&db_path)?)),
            reports: Arc::new(SqliteRecordStore::new(db::open_database(&db_path)?)),
            blobs,
        })
    }

    /// Everything in memory except blobs, which go under `config.blob_dir()`.
    pub fn in_memory(
        config: &AppConfig,
        predictor: Arc<dyn Predictor>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            predictor,
            identity,
            journal: Arc::new(MemoryRecordStore::new()),
            reports: Arc::new(MemoryRecordStore::new()),
            blobs: Arc::new(LocalBlobStore::new(config.blob_dir())),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Sessions
// ═══════════════════════════════════════════════════════════

/// One signed-in user and their picker.
#[derive(Clone)]
pub struct Session {
    pub user: UserProfile,
    pub picker: Arc<Mutex<Controller>>,
}

struct SessionEntry {
    session: Session,
    last_seen: Instant,
}

impl SessionEntry {
    fn is_live(&self, now: Instant, ttl: Duration) -> bool {
        now.duration_since(self.last_seen) < ttl
    }
}

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    pub config: AppConfig,
    catalog: SymptomCatalog,
    presenter: ResultPresenter,
    services: Services,
    /// Keyed by SHA-256 of the bearer token.
    sessions: RwLock<HashMap<[u8; 32], SessionEntry>>,
    /// Idle time after which a session is dropped.
    session_ttl: Duration,
}

impl CoreState {
    pub fn new(config: AppConfig, services: Services) -> Self {
        let presenter = ResultPresenter::new(config.shap_scale);
        let session_ttl = config.session_idle_timeout();
        Self {
            config,
            catalog: SymptomCatalog::standard(),
            presenter,
            services,
            sessions: RwLock::new(HashMap::new()),
            session_ttl,
        }
    }

    /// Override the configured session idle timeout.
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    /// Open the configured services and build state from them.
    pub fn open(config: AppConfig) -> Result<Self, CoreError> {
        let services = Services::from_config(&config)?;
        Ok(Self::new(config, services))
    }

    // ── Collaborators ───────────────────────────────────────

    pub fn catalog(&self) -> &SymptomCatalog {
        &self.catalog
    }

    pub fn predictor(&self) -> Arc<dyn Predictor> {
        Arc::clone(&self.services.predictor)
    }

    pub fn identity(&self) -> Arc<dyn IdentityProvider> {
        Arc::clone(&self.services.identity)
    }

    pub fn journal(&self) -> Arc<dyn RecordStore<DailyEntry>> {
        Arc::clone(&self.services.journal)
    }

    pub fn reports(&self) -> Arc<dyn RecordStore<Report>> {
        Arc::clone(&self.services.reports)
    }

    pub fn blobs(&self) -> Arc<dyn BlobStore> {
        Arc::clone(&self.services.blobs)
    }

    /// A fresh picker: empty selection, idle request.
    pub fn new_controller(&self) -> Controller {
        Controller::new(
            self.catalog,
            self.presenter,
            self.services.predictor.endpoint(),
        )
    }

    // ── Session table ───────────────────────────────────────

    /// Register `user` and return the bearer token for the session.
    /// Idle sessions are swept first.
    pub fn start_session(&self, user: UserProfile) -> Result<String, CoreError> {
        let token = generate_token();
        let session = Session {
            user,
            picker: Arc::new(Mutex::new(self.new_controller())),
        };
        let now = Instant::now();
        let mut sessions = self.sessions.write().map_err(|_| CoreError::LockPoisoned)?;
        self.sweep(&mut sessions, now);
        tracing::info!(user_id = %session.user.id, active = sessions.len() + 1, "Session started");
        sessions.insert(
            hash_token(&token),
            SessionEntry {
                session,
                last_seen: now,
            },
        );
        Ok(token)
    }

    /// Resolve a bearer token and mark the session as used. Expired
    /// tokens are treated like unknown ones.
    pub fn session(&self, token: &str) -> Result<Session, CoreError> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().map_err(|_| CoreError::LockPoisoned)?;
        self.sweep(&mut sessions, now);
        let entry = sessions
            .get_mut(&hash_token(token))
            .ok_or(CoreError::NoActiveSession)?;
        entry.last_seen = now;
        Ok(entry.session.clone())
    }

    fn sweep(&self, sessions: &mut HashMap<[u8; 32], SessionEntry>, now: Instant) {
        let before = sessions.len();
        sessions.retain(|_, entry| entry.is_live(now, self.session_ttl));
        let expired = before - sessions.len();
        if expired > 0 {
            tracing::info!(expired, active = sessions.len(), "Idle sessions expired");
        }
    }

    /// Replace the cached profile on every session of `user.id`.
    pub fn refresh_user(&self, user: &UserProfile) -> Result<(), CoreError> {
        let mut sessions = self.sessions.write().map_err(|_| CoreError::LockPoisoned)?;
        for entry in sessions.values_mut().filter(|e| e.session.user.id == user.id) {
            entry.session.user = user.clone();
        }
        Ok(())
    }

    /// Drop the session. Its picker, including any pending request, goes
    /// with it.
    pub fn end_session(&self, token: &str) -> Result<(), CoreError> {
        let mut sessions = self.sessions.write().map_err(|_| CoreError::LockPoisoned)?;
        match sessions.remove(&hash_token(token)) {
            Some(entry) => {
                tracing::info!(user_id = %entry.session.user.id, "Session ended");
                Ok(())
            }
            None => Err(CoreError::NoActiveSession),
        }
    }

    /// Sessions that have not yet gone idle.
    pub fn session_count(&self) -> usize {
        let now = Instant::now();
        self.sessions
            .read()
            .map(|s| s.values().filter(|e| e.is_live(now, self.session_ttl)).count())
            .unwrap_or(0)
    }
}

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("No active session")]
    NoActiveSession,
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Service setup failed: {0}")]
    Setup(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prediction::{MockPredictor, PredictionResponse};
    use chrono::Utc;

    fn state() -> CoreState {
        let config = AppConfig {
            data_dir: std::env::temp_dir().join("healthai-core-state-tests"),
            ..AppConfig::default()
        };
        let predictor = MockPredictor::answering(
            PredictionResponse::parse(r#"{"top3":[{"disease":"Flu","confidence":82.4}],"shap":[]}"#)
                .unwrap(),
        );
        let identity = LocalIdentityProvider::with_iterations(db::open_memory_database().unwrap(), 10);
        let services = Services::in_memory(&config, Arc::new(predictor), Arc::new(identity));
        CoreState::new(config, services)
    }

    fn user(id: &str) -> UserProfile {
        UserProfile {
            id: id.into(),
            email: format!("{id}@example.com"),
            display_name: id.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn sessions_start_lookup_and_end() {
        let state = state();
        let token = state.start_session(user("ana")).unwrap();
        assert_eq!(state.session(&token).unwrap().user.id, "ana");
        assert_eq!(state.session_count(), 1);

        state.end_session(&token).unwrap();
        assert!(matches!(state.session(&token), Err(CoreError::NoActiveSession)));
        assert!(matches!(state.end_session(&token), Err(CoreError::NoActiveSession)));
    }

    #[test]
    fn unknown_token_has_no_session() {
        let state = state();
        assert!(matches!(state.session("nope"), Err(CoreError::NoActiveSession)));
    }

    #[test]
    fn each_session_gets_its_own_picker() {
        let state = state();
        let a = state.session(&state.start_session(user("ana")).unwrap()).unwrap();
        let b = state.session(&state.start_session(user("ana")).unwrap()).unwrap();
        assert!(!Arc::ptr_eq(&a.picker, &b.picker));
    }

    #[test]
    fn refresh_user_updates_all_sessions_of_that_user() {
        let state = state();
        let t1 = state.start_session(user("ana")).unwrap();
        let t2 = state.start_session(user("bob")).unwrap();
        let mut renamed = user("ana");
        renamed.display_name = "Ana Maria".into();
        state.refresh_user(&renamed).unwrap();
        assert_eq!(state.session(&t1).unwrap().user.display_name, "Ana Maria");
        assert_eq!(state.session(&t2).unwrap().user.display_name, "bob");
    }

    #[test]
    fn idle_session_expires() {
        let state = state().with_session_ttl(Duration::from_millis(50));
        let token = state.start_session(user("ana")).unwrap();
        std::thread::sleep(Duration::from_millis(80));
        assert!(matches!(state.session(&token), Err(CoreError::NoActiveSession)));
        assert_eq!(state.session_count(), 0);
    }

    #[test]
    fn lookup_keeps_session_alive() {
        let state = state().with_session_ttl(Duration::from_millis(200));
        let token = state.start_session(user("ana")).unwrap();
        for _ in 0..4 {
            std::thread::sleep(Duration::from_millis(100));
            assert_eq!(state.session(&token).unwrap().user.id, "ana");
        }
    }

    #[test]
    fn starting_a_session_sweeps_idle_ones() {
        let state = state().with_session_ttl(Duration::from_millis(50));
        for _ in 0..100 {
            state.start_session(user("ana")).unwrap();
        }
        std::thread::sleep(Duration::from_millis(80));
        let fresh = state.start_session(user("ana")).unwrap();
        assert_eq!(state.sessions.read().unwrap().len(), 1);
        assert!(state.session(&fresh).is_ok());
    }

    #[test]
    fn controller_uses_predictor_endpoint() {
        let state = state();
        let screen = state.new_controller().screen();
        assert!(screen.selected.is_empty());
        assert_eq!(screen.phase, "idle");
    }
}
