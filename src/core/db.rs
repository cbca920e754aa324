use std::{path::PathBuf, sync::Arc};

use serde_json::Value;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use crate::{
    persist::{LocalStore, PersistError, PersistResult, memory::MemoryStore, sqlite::SqliteStore},
    types::{RecordKey, StoreName},
};

type SharedStore = Arc<Mutex<Box<dyn LocalStore>>>;
type Opener = Arc<dyn Fn() -> PersistResult<Box<dyn LocalStore>> + Send + Sync>;

struct Inner {
    opener: Opener,
    store: OnceCell<SharedStore>,
}

/// Cloneable async handle over one [`LocalStore`].
///
/// The store is opened on first use. Blocking store calls run on the
/// blocking pool, one at a time.
#[derive(Clone)]
pub struct LocalDb {
    inner: Arc<Inner>,
}

impl LocalDb {
    /// Defers opening until the first operation or [`Self::init`].
    pub fn lazy<F>(opener: F) -> Self
    where
        F: Fn() -> PersistResult<Box<dyn LocalStore>> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                opener: Arc::new(opener),
                store: OnceCell::new(),
            }),
        }
    }

    /// Lazily opened SQLite store at `path`.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::lazy(move || {
            let store = SqliteStore::open(&path)?;
            Ok(Box::new(store) as Box<dyn LocalStore>)
        })
    }

    /// Lazily created in-memory store.
    pub fn in_memory() -> Self {
        Self::lazy(|| Ok(Box::new(MemoryStore::new()) as Box<dyn LocalStore>))
    }

    /// Wraps an already opened store.
    pub fn from_store(store: impl LocalStore + 'static) -> Self {
        let shared: SharedStore = Arc::new(Mutex::new(Box::new(store)));
        Self {
            inner: Arc::new(Inner {
                opener: Arc::new(|| -> PersistResult<Box<dyn LocalStore>> {
                    Err(PersistError::Message("store already opened".to_string()))
                }),
                store: OnceCell::new_with(Some(shared)),
            }),
        }
    }

    /// Opens the store if needed. Safe to call repeatedly; a failed open is
    /// retried on the next call.
    pub async fn init(&self) -> PersistResult<()> {
        self.handle().await.map(|_| ())
    }

    /// True once the store has been opened.
    pub fn is_initialized(&self) -> bool {
        self.inner.store.initialized()
    }

    async fn handle(&self) -> PersistResult<SharedStore> {
        let store = self
            .inner
            .store
            .get_or_try_init(|| async {
                let opener = Arc::clone(&self.inner.opener);
                let store = tokio::task::spawn_blocking(move || opener())
                    .await
                    .map_err(|e| PersistError::Message(format!("join error: {e}")))??;
                debug!("local store opened");
                Ok::<_, PersistError>(Arc::new(Mutex::new(store)))
            })
            .await?;
        Ok(Arc::clone(store))
    }

    /// Runs `f` against the store on the blocking pool.
    pub async fn with_store<T, F>(&self, f: F) -> PersistResult<T>
    where
        F: FnOnce(&mut dyn LocalStore) -> PersistResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.handle().await?;
        tokio::task::spawn_blocking(move || {
            let mut guard = store.blocking_lock();
            f(&mut **guard)
        })
        .await
        .map_err(|e| PersistError::Message(format!("join error: {e}")))?
    }

    /// See [`LocalStore::get_all`].
    pub async fn get_all(&self, store: StoreName) -> PersistResult<Vec<Value>> {
        self.with_store(move |s| s.get_all(store)).await
    }

    /// See [`LocalStore::get`].
    pub async fn get(&self, store: StoreName, key: RecordKey) -> PersistResult<Option<Value>> {
        self.with_store(move |s| s.get(store, &key)).await
    }

    /// See [`LocalStore::put`].
    pub async fn put(&self, store: StoreName, record: Value) -> PersistResult<RecordKey> {
        self.with_store(move |s| s.put(store, record)).await
    }

    /// See [`LocalStore::put_many`].
    pub async fn put_many(
        &self,
        store: StoreName,
        records: Vec<Value>,
    ) -> PersistResult<Vec<RecordKey>> {
        self.with_store(move |s| s.put_many(store, records)).await
    }

    /// See [`LocalStore::count`].
    pub async fn count(&self, store: StoreName) -> PersistResult<usize> {
        self.with_store(move |s| s.count(store)).await
    }

    /// See [`LocalStore::delete`].
    pub async fn delete(&self, store: StoreName, key: RecordKey) -> PersistResult<()> {
        self.with_store(move |s| s.delete(store, &key)).await
    }

    /// See [`LocalStore::clear`].
    pub async fn clear(&self, store: StoreName) -> PersistResult<()> {
        self.with_store(move |s| s.clear(store)).await
    }
}
