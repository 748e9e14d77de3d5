//! redb-backed session store.
//!
//! Sessions are serialized with MessagePack. A second table records every
//! assertion ID that has minted a session, so a replayed SAML response cannot
//! mint another one. Expired entries in both tables are removed by
//! [`evict_expired`](SessionStore::evict_expired).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use tracing::{debug, warn};

use super::types::{Session, SessionId};

/// Sessions, keyed by hex session ID.
const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

/// Consumed assertion IDs, value is the MessagePack expiry timestamp.
const SEEN_ASSERTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("seen_assertions");

/// How many sessions the in-memory cache holds before evicting.
const MAX_CACHED_SESSIONS: usize = 10_000;

pub struct SessionStore {
    db: Database,
    cache: RwLock<HashMap<SessionId, Session>>,
}

impl SessionStore {
    /// Open (or create) the store at `path` and warm the cache with every
    /// session that is still live.
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create directory {:?}", parent))?;
            }
        }

        let db = Database::create(&path)
            .with_context(|| format!("failed to open session database {:?}", path))?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(SESSIONS)?;
            let _ = write_txn.open_table(SEEN_ASSERTIONS)?;
        }
        write_txn.commit()?;

        let cache = Self::load_live_sessions(&db)?;
        debug!(sessions = cache.len(), "warmed session cache");

        Ok(Self {
            db,
            cache: RwLock::new(cache),
        })
    }

    /// Store a new session. Fails if the assertion that produced it has
    /// already been consumed.
    pub fn create(&self, session: Session) -> Result<SessionId> {
        let id = session.id;

        if self.is_assertion_used(&session.assertion_id)? {
            anyhow::bail!("assertion replay detected: {}", session.assertion_id);
        }
        self.mark_assertion_used(&session.assertion_id, session.expires_at)?;

        self.persist(&session)?;

        if let Ok(mut cache) = self.cache.write() {
            if cache.len() >= MAX_CACHED_SESSIONS {
                evict_oldest(&mut cache);
            }
            cache.insert(id, session);
        }

        Ok(id)
    }

    /// Look up a live session. Expired sessions read as absent; their
    /// storage is reclaimed by the cleanup sweep, not here.
    pub fn get(&self, id: SessionId) -> Result<Option<Session>> {
        if let Ok(mut cache) = self.cache.write() {
            if let Some(session) = cache.get(&id) {
                if session.is_expired() {
                    cache.remove(&id);
                    return Ok(None);
                }
                return Ok(Some(session.clone()));
            }
        }

        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SESSIONS)?;

        let key = id.to_hex();
        let Some(value) = table.get(key.as_str())? else {
            return Ok(None);
        };

        let session: Session =
            rmp_serde::from_slice(value.value()).context("failed to deserialize session")?;
        if session.is_expired() {
            return Ok(None);
        }

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(id, session.clone());
        }

        Ok(Some(session))
    }

    /// Whether an assertion ID has already minted a session.
    pub fn is_assertion_used(&self, assertion_id: &str) -> Result<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SEEN_ASSERTIONS)?;
        Ok(table.get(assertion_id)?.is_some())
    }

    fn mark_assertion_used(&self, assertion_id: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let data = rmp_serde::to_vec(&expires_at)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SEEN_ASSERTIONS)?;
            table.insert(assertion_id, data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Remove expired sessions and stale assertion records from cache and
    /// disk. Returns the number of sessions removed from disk.
    pub fn evict_expired(&self) -> Result<usize> {
        if let Ok(mut cache) = self.cache.write() {
            cache.retain(|_, session| !session.is_expired());
        }

        let expired_sessions = self.scan_keys(SESSIONS, |bytes| {
            // Undecodable records are also swept.
            match rmp_serde::from_slice::<Session>(bytes) {
                Ok(session) => session.is_expired(),
                Err(_) => true,
            }
        })?;

        let now = Utc::now();
        let stale_assertions = self.scan_keys(SEEN_ASSERTIONS, |bytes| {
            match rmp_serde::from_slice::<DateTime<Utc>>(bytes) {
                Ok(expires_at) => now > expires_at,
                Err(_) => true,
            }
        })?;

        let evicted = expired_sessions.len();

        if !expired_sessions.is_empty() || !stale_assertions.is_empty() {
            let write_txn = self.db.begin_write()?;
            {
                let mut sessions = write_txn.open_table(SESSIONS)?;
                for key in &expired_sessions {
                    sessions.remove(key.as_str())?;
                }
                let mut assertions = write_txn.open_table(SEEN_ASSERTIONS)?;
                for key in &stale_assertions {
                    assertions.remove(key.as_str())?;
                }
            }
            write_txn.commit()?;
        }

        Ok(evicted)
    }

    /// Number of sessions on disk, live or not.
    pub fn session_count(&self) -> Result<usize> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SESSIONS)?;
        Ok(table.len()? as usize)
    }

    fn persist(&self, session: &Session) -> Result<()> {
        let data = rmp_serde::to_vec(session).context("failed to serialize session")?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(SESSIONS)?;
            table.insert(session.id.to_hex().as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Collect the keys of a table whose values match `dead`.
    fn scan_keys(
        &self,
        table_def: TableDefinition<'static, &'static str, &'static [u8]>,
        dead: impl Fn(&[u8]) -> bool,
    ) -> Result<Vec<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(table_def)?;

        let mut keys = Vec::new();
        for entry in table.iter()? {
            let (key, value) = entry?;
            if dead(value.value()) {
                keys.push(key.value().to_string());
            }
        }
        Ok(keys)
    }

    fn load_live_sessions(db: &Database) -> Result<HashMap<SessionId, Session>> {
        let mut sessions = HashMap::new();
        let read_txn = db.begin_read()?;
        let table = read_txn.open_table(SESSIONS)?;

        for entry in table.iter()? {
            let (key, value) = entry?;
            match rmp_serde::from_slice::<Session>(value.value()) {
                Ok(session) if !session.is_expired() => {
                    sessions.insert(session.id, session);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(key = key.value(), error = %e, "skipping undecodable session record");
                }
            }
        }

        Ok(sessions)
    }
}

/// Drop the entry closest to expiry.
fn evict_oldest(cache: &mut HashMap<SessionId, Session>) {
    if let Some(oldest) = cache
        .iter()
        .min_by_key(|(_, s)| s.expires_at)
        .map(|(id, _)| *id)
    {
        cache.remove(&oldest);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_store() -> (SessionStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = SessionStore::open(dir.path().join("sessions.redb")).unwrap();
        (store, dir)
    }

    fn test_session(assertion_id: &str) -> Session {
        Session::new(
            "user@example.com".to_string(),
            assertion_id.to_string(),
            "https://idp.example.com".to_string(),
            3600,
        )
    }

    #[test]
    fn test_create_and_get() {
        let (store, _dir) = test_store();

        let session = test_session("assertion-123");
        let id = session.id;
        store.create(session).unwrap();

        let retrieved = store.get(id).unwrap().unwrap();
        assert_eq!(retrieved.user_id, "user@example.com");
        assert_eq!(retrieved.assertion_id, "assertion-123");
    }

    #[test]
    fn test_get_survives_cold_cache() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sessions.redb");

        let session = test_session("assertion-persist");
        let id = session.id;
        {
            let store = SessionStore::open(path.clone()).unwrap();
            store.create(session).unwrap();
        }

        let store = SessionStore::open(path).unwrap();
        assert!(store.get(id).unwrap().is_some());
    }

    #[test]
    fn test_expired_session_reads_absent() {
        let (store, _dir) = test_store();

        let mut session = test_session("assertion-456");
        session.expires_at = Utc::now() - chrono::Duration::seconds(10);
        let id = session.id;
        store.create(session).unwrap();

        assert!(store.get(id).unwrap().is_none());
    }

    #[test]
    fn test_assertion_replay_refused() {
        let (store, _dir) = test_store();

        store.create(test_session("unique-assertion")).unwrap();

        let result = store.create(test_session("unique-assertion"));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("replay"));
    }

    #[test]
    fn test_evict_expired() {
        let (store, _dir) = test_store();

        let mut expired = test_session("assertion-expired");
        expired.expires_at = Utc::now() - chrono::Duration::seconds(10);
        store.persist(&expired).unwrap();

        store.create(test_session("assertion-live")).unwrap();
        assert_eq!(store.session_count().unwrap(), 2);

        let evicted = store.evict_expired().unwrap();
        assert_eq!(evicted, 1);
        assert_eq!(store.session_count().unwrap(), 1);
    }
}
