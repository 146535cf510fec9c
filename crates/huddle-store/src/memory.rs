#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use huddle_core::{
    Environment,
    store::{
        CollectionPath, DocumentSnapshot, DocumentStore, FieldUpdate, Fields, Query, StoreError,
        Subscription,
    },
};
use tokio::sync::mpsc;
use tracing::trace;

use crate::SimEnv;

/// Length of store-assigned document ids.
const AUTO_ID_LEN: usize = 20;

/// In-memory document store for testing and simulation
///
/// Collections are `BTreeMap`s keyed by document id; live queries are
/// re-evaluated after every write to their collection and a new full result
/// set is pushed only when it differs from the last one delivered. All state
/// is wrapped in Arc<Mutex<>> so clones share one store, like clients sharing
/// one backend.
///
/// Every operation yields to the runtime before touching state, so
/// concurrently issued operations interleave the way they would against a
/// remote store. The mutex is never held across an `.await`.
///
/// Test hooks model backend failures: [`set_offline`](Self::set_offline)
/// makes every call fail with `Unavailable`, and
/// [`deny_writes`](Self::deny_writes) rejects writes under a path prefix with
/// `PermissionDenied`.
#[derive(Clone)]
pub struct MemoryStore<E: Environment = SimEnv> {
    inner: Arc<Mutex<MemoryStoreInner>>,
    env: E,
}

struct MemoryStoreInner {
    /// Documents organized by collection path, keyed by document id
    collections: HashMap<CollectionPath, BTreeMap<String, DocumentSnapshot>>,

    /// Live queries and document watches
    watchers: Vec<Watcher>,

    /// Next watcher id
    next_watcher_id: u64,

    /// Path prefixes that reject writes
    denied_prefixes: Vec<String>,

    /// When set, every operation fails with `Unavailable`
    offline: bool,

    /// Number of successful writes (set, update, add)
    write_count: usize,
}

struct Watcher {
    id: u64,
    collection: CollectionPath,
    sink: Sink,
}

enum Sink {
    Query {
        query: Query,
        tx: mpsc::UnboundedSender<Vec<DocumentSnapshot>>,
        last: Vec<DocumentSnapshot>,
    },
    Document {
        id: String,
        tx: mpsc::UnboundedSender<Option<DocumentSnapshot>>,
        last: Option<DocumentSnapshot>,
    },
}

impl Sink {
    /// Push a fresh snapshot if the result changed. Returns false once the
    /// receiving side is gone.
    fn refresh(&mut self, docs: Option<&BTreeMap<String, DocumentSnapshot>>) -> bool {
        match self {
            Self::Query { query, tx, last } => {
                let results = docs.map(|docs| query.evaluate(docs.values())).unwrap_or_default();
                if results == *last {
                    return !tx.is_closed();
                }
                *last = results.clone();
                tx.send(results).is_ok()
            },
            Self::Document { id, tx, last } => {
                let current = docs.and_then(|docs| docs.get(id.as_str())).cloned();
                if current == *last {
                    return !tx.is_closed();
                }
                *last = current.clone();
                tx.send(current).is_ok()
            },
        }
    }
}

impl MemoryStoreInner {
    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }

    fn check_writable(&self, collection: &CollectionPath, id: &str) -> Result<(), StoreError> {
        self.check_online()?;
        let path = format!("{collection}/{id}");
        if self.denied_prefixes.iter().any(|prefix| path.starts_with(prefix.as_str())) {
            return Err(StoreError::PermissionDenied { path });
        }
        Ok(())
    }

    /// Re-evaluate every watcher on `collection`, dropping disconnected ones.
    fn notify(&mut self, collection: &CollectionPath) {
        let Self { collections, watchers, .. } = self;
        let docs = collections.get(collection);
        watchers.retain_mut(|watcher| {
            if watcher.collection != *collection {
                return true;
            }
            watcher.sink.refresh(docs)
        });
    }

    fn add_watcher(&mut self, collection: &CollectionPath, mut sink: Sink) -> u64 {
        let watcher_id = self.next_watcher_id;
        self.next_watcher_id += 1;

        // Initial snapshot is always delivered, even when empty.
        let docs = self.collections.get(collection);
        match &mut sink {
            Sink::Query { query, tx, last } => {
                let results = docs.map(|docs| query.evaluate(docs.values())).unwrap_or_default();
                *last = results.clone();
                let _ = tx.send(results);
            },
            Sink::Document { id, tx, last } => {
                let current = docs.and_then(|docs| docs.get(id.as_str())).cloned();
                *last = current.clone();
                let _ = tx.send(current);
            },
        }

        self.watchers.push(Watcher { id: watcher_id, collection: collection.clone(), sink });
        watcher_id
    }
}

impl<E: Environment> MemoryStore<E> {
    /// Create a new empty store using `env` for create times and ids.
    pub fn new(env: E) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryStoreInner {
                collections: HashMap::new(),
                watchers: Vec::new(),
                next_watcher_id: 0,
                denied_prefixes: Vec::new(),
                offline: false,
                write_count: 0,
            })),
            env,
        }
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned (a thread panicked while
    /// holding the lock). This is acceptable for test/simulation code.
    #[allow(clippy::expect_used)]
    fn lock(&self) -> MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().expect("Mutex poisoned")
    }

    /// Simulate losing (or regaining) connectivity.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Reject writes to any document whose `collection/id` path starts with
    /// `prefix`.
    pub fn deny_writes(&self, prefix: impl Into<String>) {
        self.lock().denied_prefixes.push(prefix.into());
    }

    /// Lift all write denials.
    pub fn allow_all_writes(&self) {
        self.lock().denied_prefixes.clear();
    }

    /// Number of documents in a collection.
    ///
    /// Useful for debugging and testing.
    pub fn document_count(&self, collection: &CollectionPath) -> usize {
        self.lock().collections.get(collection).map_or(0, BTreeMap::len)
    }

    /// Number of successful writes since creation.
    pub fn write_count(&self) -> usize {
        self.lock().write_count
    }

    /// Number of live watchers. Drops to zero once every subscription is
    /// disposed and the next write has pruned closed ones.
    pub fn watcher_count(&self) -> usize {
        self.lock().watchers.len()
    }

    /// Read a document without yielding. For test assertions.
    pub fn peek(&self, collection: &CollectionPath, id: &str) -> Option<DocumentSnapshot> {
        self.lock().collections.get(collection).and_then(|docs| docs.get(id)).cloned()
    }

    fn disposer(&self, watcher_id: u64) -> impl FnOnce() + Send + 'static {
        let weak = Arc::downgrade(&self.inner);
        move || {
            if let Some(inner) = weak.upgrade() {
                if let Ok(mut inner) = inner.lock() {
                    inner.watchers.retain(|watcher| watcher.id != watcher_id);
                }
            }
        }
    }
}

impl Default for MemoryStore<SimEnv> {
    fn default() -> Self {
        Self::new(SimEnv::default())
    }
}

#[async_trait]
impl<E: Environment> DocumentStore for MemoryStore<E> {
    async fn get_document(
        &self,
        collection: &CollectionPath,
        id: &str,
    ) -> Result<Option<DocumentSnapshot>, StoreError> {
        tokio::task::yield_now().await;
        let inner = self.lock();
        inner.check_online()?;

        Ok(inner.collections.get(collection).and_then(|docs| docs.get(id)).cloned())
    }

    async fn set_document(
        &self,
        collection: &CollectionPath,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        let mut inner = self.lock();
        inner.check_writable(collection, id)?;

        let docs = inner.collections.entry(collection.clone()).or_default();
        let create_time = docs.get(id).map_or_else(|| self.env.now(), |doc| doc.create_time);
        docs.insert(id.to_string(), DocumentSnapshot { id: id.to_string(), create_time, fields });
        inner.write_count += 1;
        trace!(collection = %collection, id, "set document");

        inner.notify(collection);
        Ok(())
    }

    async fn update_fields(
        &self,
        collection: &CollectionPath,
        id: &str,
        updates: Vec<FieldUpdate>,
    ) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        let mut inner = self.lock();
        inner.check_writable(collection, id)?;

        let doc = inner
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                path: collection.to_string(),
                id: id.to_string(),
            })?;

        for update in &updates {
            update.apply(&mut doc.fields);
        }
        inner.write_count += 1;
        trace!(collection = %collection, id, updates = updates.len(), "updated fields");

        inner.notify(collection);
        Ok(())
    }

    async fn add_document(
        &self,
        collection: &CollectionPath,
        fields: Fields,
    ) -> Result<DocumentSnapshot, StoreError> {
        tokio::task::yield_now().await;
        let mut inner = self.lock();
        inner.check_online()?;

        let docs = inner.collections.entry(collection.clone()).or_default();
        let mut id = self.env.random_token(AUTO_ID_LEN);
        while docs.contains_key(&id) {
            id = self.env.random_token(AUTO_ID_LEN);
        }
        inner.check_writable(collection, &id)?;

        let snapshot = DocumentSnapshot { id: id.clone(), create_time: self.env.now(), fields };
        inner.collections.entry(collection.clone()).or_default().insert(id, snapshot.clone());
        inner.write_count += 1;
        trace!(collection = %collection, id = %snapshot.id, "added document");

        inner.notify(collection);
        Ok(snapshot)
    }

    async fn query_documents(
        &self,
        collection: &CollectionPath,
        query: &Query,
    ) -> Result<Vec<DocumentSnapshot>, StoreError> {
        tokio::task::yield_now().await;
        let inner = self.lock();
        inner.check_online()?;

        Ok(inner
            .collections
            .get(collection)
            .map(|docs| query.evaluate(docs.values()))
            .unwrap_or_default())
    }

    async fn subscribe_query(
        &self,
        collection: &CollectionPath,
        query: Query,
    ) -> Result<Subscription<Vec<DocumentSnapshot>>, StoreError> {
        tokio::task::yield_now().await;
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher_id = {
            let mut inner = self.lock();
            inner.check_online()?;
            inner.add_watcher(collection, Sink::Query { query, tx, last: Vec::new() })
        };
        trace!(collection = %collection, watcher_id, "opened query subscription");

        Ok(Subscription::new(rx, self.disposer(watcher_id)))
    }

    async fn subscribe_document(
        &self,
        collection: &CollectionPath,
        id: &str,
    ) -> Result<Subscription<Option<DocumentSnapshot>>, StoreError> {
        tokio::task::yield_now().await;
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher_id = {
            let mut inner = self.lock();
            inner.check_online()?;
            inner.add_watcher(
                collection,
                Sink::Document { id: id.to_string(), tx, last: None },
            )
        };
        trace!(collection = %collection, id, watcher_id, "opened document subscription");

        Ok(Subscription::new(rx, self.disposer(watcher_id)))
    }
}
