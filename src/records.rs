//! Owner-scoped record store for daily entries and report metadata.
//!
//! Each record kind lives in its own collection. Records are listed per
//! owner, newest first. An id owned by someone else behaves exactly like
//! an id that does not exist.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::DatabaseError;

/// A record kind that can be stored.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Collection name, e.g. `"dailyEntries"`.
    const COLLECTION: &'static str;
}

/// A record plus the fields the store assigns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stored<R> {
    pub id: String,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: R,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{collection} record not found: {id}")]
    NotFound { collection: &'static str, id: String },
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error("Internal lock error")]
    LockPoisoned,
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(err))
    }
}

pub trait RecordStore<R: Record>: Send + Sync {
    fn create(&self, owner_id: &str, record: R) -> Result<Stored<R>, StoreError>;

    /// All of `owner_id`'s records, newest first.
    fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Stored<R>>, StoreError>;

    fn get(&self, owner_id: &str, id: &str) -> Result<Stored<R>, StoreError>;

    fn delete(&self, owner_id: &str, id: &str) -> Result<(), StoreError>;
}

fn not_found<R: Record>(id: &str) -> StoreError {
    StoreError::NotFound {
        collection: R::COLLECTION,
        id: id.to_string(),
    }
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_default()
}

// ═══════════════════════════════════════════
// SQLite
// ═══════════════════════════════════════════

/// One `records` table shared by all collections; bodies are JSON.
pub struct SqliteRecordStore<R> {
    conn: Mutex<Connection>,
    _kind: PhantomData<fn() -> R>,
}

impl<R: Record> SqliteRecordStore<R> {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            _kind: PhantomData,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

fn decode<R: Record>(
    id: String,
    owner_id: String,
    created_at: i64,
    body: &str,
) -> Result<Stored<R>, StoreError> {
    let record: R = serde_json::from_str(body).map_err(|e| {
        DatabaseError::CorruptDocument(format!("{} {id}: {e}", R::COLLECTION))
    })?;
    Ok(Stored {
        id,
        owner_id,
        created_at: millis_to_datetime(created_at),
        record,
    })
}

impl<R: Record> RecordStore<R> for SqliteRecordStore<R> {
    fn create(&self, owner_id: &str, record: R) -> Result<Stored<R>, StoreError> {
        let body = serde_json::to_string(&record)
            .map_err(|e| DatabaseError::CorruptDocument(e.to_string()))?;
        let created_at = Utc::now();
        let id = Uuid::new_v4().to_string();

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO records (id, collection, owner_id, created_at, body)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                R::COLLECTION,
                owner_id,
                created_at.timestamp_millis(),
                body
            ],
        )?;

        Ok(Stored {
            id,
            owner_id: owner_id.to_string(),
            created_at: millis_to_datetime(created_at.timestamp_millis()),
            record,
        })
    }

    fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Stored<R>>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, created_at, body FROM records
             WHERE collection = ?1 AND owner_id = ?2
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map(params![R::COLLECTION, owner_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, owner, created_at, body) = row?;
            records.push(decode(id, owner, created_at, &body)?);
        }
        Ok(records)
    }

    fn get(&self, owner_id: &str, id: &str) -> Result<Stored<R>, StoreError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT id, owner_id, created_at, body FROM records
                 WHERE collection = ?1 AND owner_id = ?2 AND id = ?3",
                params![R::COLLECTION, owner_id, id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;
        let (id, owner, created_at, body) = row.ok_or_else(|| not_found::<R>(id))?;
        decode(id, owner, created_at, &body)
    }

    fn delete(&self, owner_id: &str, id: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM records WHERE collection = ?1 AND owner_id = ?2 AND id = ?3",
            params![R::COLLECTION, owner_id, id],
        )?;
        if deleted == 0 {
            return Err(not_found::<R>(id));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════
// In-memory
// ═══════════════════════════════════════════

/// Same semantics as [`SqliteRecordStore`], held in a map.
pub struct MemoryRecordStore<R> {
    inner: Mutex<MemoryInner<R>>,
}

struct MemoryInner<R> {
    next_order: u64,
    /// id → (insertion order, record)
    records: HashMap<String, (u64, Stored<R>)>,
}

impl<R: Record> Default for MemoryRecordStore<R> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                next_order: 0,
                records: HashMap::new(),
            }),
        }
    }
}

impl<R: Record> MemoryRecordStore<R> {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryInner<R>>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl<R: Record> RecordStore<R> for MemoryRecordStore<R> {
    fn create(&self, owner_id: &str, record: R) -> Result<Stored<R>, StoreError> {
        let stored = Stored {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            created_at: millis_to_datetime(Utc::now().timestamp_millis()),
            record,
        };
        let mut inner = self.lock()?;
        inner.next_order += 1;
        let order = inner.next_order;
        inner
            .records
            .insert(stored.id.clone(), (order, stored.clone()));
        Ok(stored)
    }

    fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Stored<R>>, StoreError> {
        let inner = self.lock()?;
        let mut owned: Vec<&(u64, Stored<R>)> = inner
            .records
            .values()
            .filter(|(_, s)| s.owner_id == owner_id)
            .collect();
        owned.sort_by(|(oa, a), (ob, b)| {
            b.created_at.cmp(&a.created_at).then_with(|| ob.cmp(oa))
        });
        Ok(owned.into_iter().map(|(_, s)| s.clone()).collect())
    }

    fn get(&self, owner_id: &str, id: &str) -> Result<Stored<R>, StoreError> {
        let inner = self.lock()?;
        inner
            .records
            .get(id)
            .filter(|(_, s)| s.owner_id == owner_id)
            .map(|(_, s)| s.clone())
            .ok_or_else(|| not_found::<R>(id))
    }

    fn delete(&self, owner_id: &str, id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let owned = inner
            .records
            .get(id)
            .is_some_and(|(_, s)| s.owner_id == owner_id);
        if !owned {
            return Err(not_found::<R>(id));
        }
        inner.records.remove(id);
        Ok(())
    }
}
