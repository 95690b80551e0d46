use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::{ChangeListener, Identity, Record, RemoteStore, SubscriptionHandle};
use crate::error::StoreError;

/// Milliseconds since the Unix epoch, computed by SQLite at write time
const SERVER_NOW_MS: &str = "CAST((julianday('now') - 2440587.5) * 86400000.0 AS INTEGER)";

/// Record store backed by a shared SQLite file.
///
/// Every process that opens the same file is an independent client. Each
/// subscription owns a watcher thread with its own connection that polls
/// `PRAGMA data_version` and pushes the full collection whenever any
/// connection has committed.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    identity: Mutex<Option<Identity>>,
    poll_interval: Duration,
}

impl SqliteStore {
    /// Open or create the store file and initialize its schema.
    pub fn open(db_path: &Path, poll_interval: Duration) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = open_connection(db_path)?;
        init_schema(&conn)?;

        info!("📁 Record store opened at: {}", db_path.display());

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: db_path.to_path_buf(),
            identity: Mutex::new(None),
            poll_interval,
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))?;
        f(&conn)
    }
}

fn open_connection(db_path: &Path) -> Result<Connection, StoreError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    // WAL lets the watcher read while another process writes
    let _mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
    Ok(conn)
}

/// Creates all tables if they don't exist.
fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    // One row per record; body is the full JSON field map
    conn.execute(
        "CREATE TABLE IF NOT EXISTS records (
            collection      TEXT NOT NULL,
            id              TEXT NOT NULL,
            body            TEXT NOT NULL,
            PRIMARY KEY (collection, id)
        )",
        [],
    )?;

    // Anonymous identities issued by this store
    conn.execute(
        "CREATE TABLE IF NOT EXISTS identities (
            uid             TEXT PRIMARY KEY,
            created_at      INTEGER NOT NULL
        )",
        [],
    )?;

    Ok(())
}

/// Read every record of a collection ordered by id.
///
/// Rows whose body is not a JSON object are skipped with a warning.
fn read_records(conn: &Connection, collection: &str) -> Result<Vec<Record>, StoreError> {
    let mut stmt = conn.prepare("SELECT id, body FROM records WHERE collection = ?1 ORDER BY id")?;

    let rows = stmt.query_map([collection], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (id, body) = row?;
        match serde_json::from_str::<Map<String, Value>>(&body) {
            Ok(fields) => records.push(Record { id, fields }),
            Err(e) => warn!("⚠️  Skipping malformed record {collection}/{id}: {e}"),
        }
    }

    Ok(records)
}

fn data_version(conn: &Connection) -> Result<i64, StoreError> {
    Ok(conn.query_row("PRAGMA data_version", [], |row| row.get(0))?)
}

impl RemoteStore for SqliteStore {
    fn sign_in_anonymously(&self) -> Result<Identity, StoreError> {
        let identity = Identity::anonymous();

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO identities (uid, created_at) VALUES (?1, ?2)",
                params![&identity.uid, Utc::now().timestamp_millis()],
            )?;
            Ok(())
        })?;

        let mut slot = self
            .identity
            .lock()
            .map_err(|_| StoreError::Unavailable("identity lock poisoned".to_string()))?;
        *slot = Some(identity.clone());

        Ok(identity)
    }

    fn current_identity(&self) -> Option<Identity> {
        self.identity.lock().ok()?.clone()
    }

    fn read_once(&self, collection: &str) -> Result<Vec<Record>, StoreError> {
        self.with_conn(|conn| read_records(conn, collection))
    }

    fn put_stamped(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
        author: &str,
    ) -> Result<(), StoreError> {
        let body = serde_json::to_string(&fields).map_err(|e| StoreError::Malformed {
            id: id.to_string(),
            reason: e.to_string(),
        })?;

        let sql = format!(
            "INSERT OR REPLACE INTO records (collection, id, body)
             VALUES (?1, ?2, json_set(?3, '$.lastUpdated', {SERVER_NOW_MS}, '$.updatedBy', ?4))"
        );

        self.with_conn(|conn| {
            conn.execute(&sql, params![collection, id, body, author])?;
            Ok(())
        })
    }

    fn subscribe(
        &self,
        collection: &str,
        on_change: ChangeListener,
    ) -> Result<SubscriptionHandle, StoreError> {
        let conn = open_connection(&self.db_path)?;
        let stop = Arc::new(AtomicBool::new(false));
        let watcher = Watcher {
            conn,
            collection: collection.to_string(),
            poll_interval: self.poll_interval,
            stop: Arc::clone(&stop),
            on_change,
        };

        thread::Builder::new()
            .name(format!("{collection}-watch"))
            .spawn(move || watcher.run())?;

        Ok(SubscriptionHandle::new(move || {
            stop.store(true, Ordering::Relaxed);
        }))
    }
}

/// Background poller delivering collection snapshots to one listener
struct Watcher {
    conn: Connection,
    collection: String,
    poll_interval: Duration,
    stop: Arc<AtomicBool>,
    on_change: ChangeListener,
}

impl Watcher {
    fn run(self) {
        let mut last_version: Option<i64> = None;

        while !self.stop.load(Ordering::Relaxed) {
            match self.poll(last_version) {
                Ok(version) => last_version = Some(version),
                // Transient failures are retried on the next tick
                Err(e) => warn!("⚠️  Watch of {} failed: {e}", self.collection),
            }
            thread::sleep(self.poll_interval);
        }

        debug!("Watch of {} stopped", self.collection);
    }

    fn poll(&self, last_version: Option<i64>) -> Result<i64, StoreError> {
        let version = data_version(&self.conn)?;
        if last_version == Some(version) {
            return Ok(version);
        }

        let records = read_records(&self.conn, &self.collection)?;
        if self.stop.load(Ordering::Relaxed) {
            return Ok(version);
        }

        debug!("🔄 {} changed, delivering {} records", self.collection, records.len());
        (self.on_change)(records);

        Ok(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::mpsc;

    struct TempStore {
        path: PathBuf,
    }

    impl TempStore {
        fn new() -> Self {
            let path = std::env::temp_dir()
                .join(format!("campus-companion-test-{}", uuid::Uuid::new_v4()))
                .join("campus.db");
            Self { path }
        }

        fn open(&self) -> SqliteStore {
            SqliteStore::open(&self.path, Duration::from_millis(20)).unwrap()
        }
    }

    impl Drop for TempStore {
        fn drop(&mut self) {
            if let Some(dir) = self.path.parent() {
                let _ = std::fs::remove_dir_all(dir);
            }
        }
    }

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_write_requires_identity() {
        let temp = TempStore::new();
        let store = temp.open();

        let result = store.write("rooms", "a", fields(json!({ "name": "A" })));
        assert_eq!(result, Err(StoreError::Unauthenticated));
    }

    #[test]
    fn test_write_is_stamped_by_the_store() {
        let temp = TempStore::new();
        let store = temp.open();
        let identity = store.sign_in_anonymously().unwrap();
        let before = Utc::now().timestamp_millis();

        store
            .write("rooms", "a", fields(json!({ "name": "A", "floor": 1 })))
            .unwrap();
        store
            .write("rooms", "a", fields(json!({ "name": "A" })))
            .unwrap();

        let records = store.read_once("rooms").unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.id, "a");
        assert!(!record.fields.contains_key("floor"));
        assert_eq!(record.fields["updatedBy"], json!(identity.uid));

        let stamped = record.fields["lastUpdated"].as_i64().unwrap();
        assert!((stamped - before).abs() < 60_000);
    }

    #[test]
    fn test_two_clients_see_each_others_writes() {
        let temp = TempStore::new();
        let first = temp.open();
        let second = temp.open();
        first.sign_in_anonymously().unwrap();
        let writer = second.sign_in_anonymously().unwrap();

        let (tx, rx) = mpsc::channel();
        let handle = first
            .subscribe("rooms", Box::new(move |records| drop(tx.send(records))))
            .unwrap();

        let initial = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(initial.is_empty());

        second
            .write("rooms", "a", fields(json!({ "name": "A" })))
            .unwrap();

        let delivered = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].fields["updatedBy"], json!(writer.uid));

        handle.unsubscribe();
    }

    #[test]
    fn test_ensure_seeded_twice_writes_once() {
        let temp = TempStore::new();
        let store = temp.open();
        store.sign_in_anonymously().unwrap();
        let defaults = vec![Record {
            id: "a".into(),
            fields: fields(json!({ "name": "A" })),
        }];

        assert_eq!(store.ensure_seeded("rooms", &defaults).unwrap(), 1);
        assert_eq!(store.ensure_seeded("rooms", &defaults).unwrap(), 0);
        assert_eq!(store.read_once("rooms").unwrap().len(), 1);
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let temp = TempStore::new();
        let store = temp.open();
        store.sign_in_anonymously().unwrap();
        store.write("rooms", "good", Map::new()).unwrap();
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO records (collection, id, body) VALUES ('rooms', 'bad', 'not json')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let records = store.read_once("rooms").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "good");
    }
}
