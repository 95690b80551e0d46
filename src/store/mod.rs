/// Remote record store boundary
///
/// A keyed record collection with subscribe, read-once and write, plus an
/// anonymous identity provider. The store, not the client, assigns the
/// `lastUpdated` timestamp of every write.
///
/// Implementations:
/// - `memory.rs` - in-process store, used offline and in tests
/// - `sqlite.rs` - shared-file store; every process opening the same file is a writer

pub mod memory;
pub mod sqlite;

use serde_json::{Map, Value};

use crate::error::StoreError;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Collection key of the study-space records
pub const STUDY_SPACES: &str = "studySpaces";

/// Author stamped on records written by first-run seeding
pub const SYSTEM_AUTHOR: &str = "system";

/// Field names the store stamps on every write
pub const LAST_UPDATED_FIELD: &str = "lastUpdated";
pub const UPDATED_BY_FIELD: &str = "updatedBy";

/// An anonymous identity issued by the store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub uid: String,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            uid: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// One record of a collection: its key and its full field map
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub fields: Map<String, Value>,
}

/// Listener invoked with the full collection every time any record changes
pub type ChangeListener = Box<dyn Fn(Vec<Record>) + Send + Sync + 'static>;

/// Handle returned by `RemoteStore::subscribe`.
///
/// The listener stays registered until `unsubscribe` is called or the
/// handle is dropped.
pub struct SubscriptionHandle {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl SubscriptionHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// A realtime keyed record store.
///
/// All methods block the calling thread; callers on the UI thread run them
/// through `tokio::task::spawn_blocking`.
pub trait RemoteStore: Send + Sync {
    /// Establish an anonymous identity used to stamp subsequent writes.
    fn sign_in_anonymously(&self) -> Result<Identity, StoreError>;

    fn current_identity(&self) -> Option<Identity>;

    /// Read the current records of a collection once, ordered by id.
    fn read_once(&self, collection: &str) -> Result<Vec<Record>, StoreError>;

    /// Overwrite the full record value and stamp it with a server timestamp
    /// and `author`. Performs no identity check; use `write`.
    fn put_stamped(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
        author: &str,
    ) -> Result<(), StoreError>;

    /// Register a continuous listener. It is invoked once with the current
    /// records and again after every change to the collection.
    fn subscribe(
        &self,
        collection: &str,
        on_change: ChangeListener,
    ) -> Result<SubscriptionHandle, StoreError>;

    /// Overwrite a record as the signed-in identity.
    ///
    /// Completion means the store has the value, not that subscribers have
    /// seen it.
    fn write(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<(), StoreError> {
        let identity = self.current_identity().ok_or(StoreError::Unauthenticated)?;
        self.put_stamped(collection, id, fields, &identity.uid)
    }

    /// Write each default record if the collection is empty.
    ///
    /// Returns the number of records written. Not transactional: concurrent
    /// first runs may both seed, and the last write of each record wins.
    fn ensure_seeded(&self, collection: &str, defaults: &[Record]) -> Result<usize, StoreError> {
        if self.current_identity().is_none() {
            return Err(StoreError::Unauthenticated);
        }

        if !self.read_once(collection)?.is_empty() {
            return Ok(0);
        }

        for record in defaults {
            self.put_stamped(collection, &record.id, record.fields.clone(), SYSTEM_AUTHOR)?;
        }

        Ok(defaults.len())
    }
}
