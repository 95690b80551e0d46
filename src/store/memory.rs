use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::debug;

use super::{
    ChangeListener, Identity, Record, RemoteStore, SubscriptionHandle, LAST_UPDATED_FIELD,
    UPDATED_BY_FIELD,
};
use crate::error::StoreError;

type Collection = BTreeMap<String, Map<String, Value>>;

struct Listener {
    id: u64,
    collection: String,
    on_change: Arc<ChangeListener>,
}

#[derive(Default)]
struct Shared {
    collections: HashMap<String, Collection>,
    listeners: Vec<Listener>,
    next_listener: u64,
}

impl Shared {
    fn snapshot(&self, collection: &str) -> Vec<Record> {
        self.collections
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .map(|(id, fields)| Record {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn listeners_for(&self, collection: &str) -> Vec<Arc<ChangeListener>> {
        self.listeners
            .iter()
            .filter(|l| l.collection == collection)
            .map(|l| Arc::clone(&l.on_change))
            .collect()
    }
}

/// In-process record store.
///
/// Clones are the same client. `connect` returns another client of the same
/// records with its own identity, which is how concurrent writers are modelled.
/// Listeners run synchronously on the writing thread, after the lock is released.
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Mutex<Shared>>,
    identity: Arc<Mutex<Option<Identity>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A second client sharing this store's records, not yet signed in.
    #[cfg(test)]
    pub fn connect(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            identity: Arc::new(Mutex::new(None)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Shared>, StoreError> {
        self.shared
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

impl RemoteStore for MemoryStore {
    fn sign_in_anonymously(&self) -> Result<Identity, StoreError> {
        let identity = Identity::anonymous();
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
        Ok(self.lock()?.snapshot(collection))
    }

    fn put_stamped(
        &self,
        collection: &str,
        id: &str,
        mut fields: Map<String, Value>,
        author: &str,
    ) -> Result<(), StoreError> {
        fields.insert(
            LAST_UPDATED_FIELD.to_string(),
            Value::from(Utc::now().timestamp_millis()),
        );
        fields.insert(UPDATED_BY_FIELD.to_string(), Value::from(author));

        let (snapshot, listeners) = {
            let mut shared = self.lock()?;
            shared
                .collections
                .entry(collection.to_string())
                .or_default()
                .insert(id.to_string(), fields);
            (shared.snapshot(collection), shared.listeners_for(collection))
        };

        debug!("{collection}/{id} written, notifying {} listeners", listeners.len());
        for listener in listeners {
            listener(snapshot.clone());
        }

        Ok(())
    }

    fn subscribe(
        &self,
        collection: &str,
        on_change: ChangeListener,
    ) -> Result<SubscriptionHandle, StoreError> {
        let on_change = Arc::new(on_change);

        let (listener_id, snapshot) = {
            let mut shared = self.lock()?;
            let listener_id = shared.next_listener;
            shared.next_listener += 1;
            shared.listeners.push(Listener {
                id: listener_id,
                collection: collection.to_string(),
                on_change: Arc::clone(&on_change),
            });
            (listener_id, shared.snapshot(collection))
        };

        on_change(snapshot);

        let shared: Weak<Mutex<Shared>> = Arc::downgrade(&self.shared);
        Ok(SubscriptionHandle::new(move || {
            if let Some(shared) = shared.upgrade() {
                if let Ok(mut shared) = shared.lock() {
                    shared.listeners.retain(|l| l.id != listener_id);
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::mpsc;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_write_requires_identity() {
        let store = MemoryStore::new();
        let result = store.write("rooms", "a", fields(json!({ "name": "A" })));
        assert_eq!(result, Err(StoreError::Unauthenticated));
        assert!(store.read_once("rooms").unwrap().is_empty());
    }

    #[test]
    fn test_write_overwrites_and_stamps() {
        let store = MemoryStore::new();
        let identity = store.sign_in_anonymously().unwrap();

        store
            .write("rooms", "a", fields(json!({ "name": "A", "floor": 2 })))
            .unwrap();
        store
            .write("rooms", "a", fields(json!({ "name": "A2" })))
            .unwrap();

        let records = store.read_once("rooms").unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.fields["name"], json!("A2"));
        // Full overwrite, not a patch
        assert!(!record.fields.contains_key("floor"));
        assert_eq!(record.fields[UPDATED_BY_FIELD], json!(identity.uid));
        assert!(record.fields[LAST_UPDATED_FIELD].is_i64());
    }

    #[test]
    fn test_subscribe_delivers_initial_and_changes() {
        let store = MemoryStore::new();
        store.sign_in_anonymously().unwrap();
        let (tx, rx) = mpsc::channel();

        let handle = store
            .subscribe(
                "rooms",
                Box::new(move |records| {
                    let _ = tx.send(records.len());
                }),
            )
            .unwrap();

        assert_eq!(rx.recv().unwrap(), 0);
        store.write("rooms", "a", Map::new()).unwrap();
        assert_eq!(rx.recv().unwrap(), 1);

        handle.unsubscribe();
        store.write("rooms", "b", Map::new()).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_other_collections_do_not_notify() {
        let store = MemoryStore::new();
        store.sign_in_anonymously().unwrap();
        let (tx, rx) = mpsc::channel();
        let _handle = store
            .subscribe("rooms", Box::new(move |records| drop(tx.send(records))))
            .unwrap();
        rx.recv().unwrap();

        store.write("halls", "x", Map::new()).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_connected_clients_share_records_not_identity() {
        let first = MemoryStore::new();
        let second = first.connect();
        first.sign_in_anonymously().unwrap();

        assert!(second.current_identity().is_none());
        first.write("rooms", "a", Map::new()).unwrap();
        assert_eq!(second.read_once("rooms").unwrap().len(), 1);
    }

    #[test]
    fn test_ensure_seeded_is_idempotent() {
        let store = MemoryStore::new();
        store.sign_in_anonymously().unwrap();
        let defaults = vec![
            Record { id: "a".into(), fields: fields(json!({ "name": "A" })) },
            Record { id: "b".into(), fields: fields(json!({ "name": "B" })) },
        ];

        assert_eq!(store.ensure_seeded("rooms", &defaults).unwrap(), 2);
        assert_eq!(store.ensure_seeded("rooms", &defaults).unwrap(), 0);

        let records = store.read_once("rooms").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].fields[UPDATED_BY_FIELD], json!(super::super::SYSTEM_AUTHOR));
    }
}
