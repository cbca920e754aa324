//! Offline-aware request wrapper: the one path UI code reads and writes through.
//!
//! Writes that fail are queued and applied optimistically to the local
//! store; reads that fail fall back to the last cached records.

use std::sync::Arc;

use reqwest::Url;
use serde_json::Value;
use tracing::warn;

use crate::{
    core::{db::LocalDb, queue::PendingQueue},
    persist::PersistError,
    record::{date_field, matches_scope, record_key, with_local_id},
    routes::{delete_url, endpoint, operation_for_method},
    transport::{ApiRequest, Transport, TransportError},
    types::{Method, Operation, RecordKey, StoreName},
};

/// Failure surfaced by [`OfflineClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The call never got a response.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// The server answered with a non-2xx status.
    #[error("HTTP error! status: {0}")]
    Status(u16),
    /// Queueing or cache access failed.
    #[error("local store error: {0}")]
    Persist(#[from] PersistError),
    /// The collection has no remote endpoint.
    #[error("no endpoint for store `{0}`")]
    NoEndpoint(StoreName),
    /// The URL could not be parsed for cache lookup.
    #[error("invalid url `{0}`")]
    InvalidUrl(String),
}

/// Per-call options for [`OfflineClient::fetch`].
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOptions {
    /// HTTP verb.
    pub method: Method,
    /// JSON body for writes.
    pub body: Option<Value>,
    /// Collection used for caching and queueing. Without it the call is a
    /// plain request.
    pub store: Option<StoreName>,
    /// Cache GET results and fall back to them on failure.
    pub use_cache: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            method: Method::Get,
            body: None,
            store: None,
            use_cache: true,
        }
    }
}

impl FetchOptions {
    /// Cached GET for `store`.
    pub fn get(store: StoreName) -> Self {
        Self {
            store: Some(store),
            ..Self::default()
        }
    }

    /// Write with `method` and `body` for `store`.
    pub fn write(method: Method, store: StoreName, body: Value) -> Self {
        Self {
            method,
            body: Some(body),
            store: Some(store),
            ..Self::default()
        }
    }
}

/// Offline-aware client over a transport, a local store and the queue.
#[derive(Clone)]
pub struct OfflineClient {
    db: LocalDb,
    queue: PendingQueue,
    transport: Arc<dyn Transport>,
}

impl OfflineClient {
    /// Client queueing into `queue` and caching into the queue's store.
    pub fn new(queue: PendingQueue, transport: Arc<dyn Transport>) -> Self {
        Self {
            db: queue.db().clone(),
            queue,
            transport,
        }
    }

    /// Local store used for caching.
    pub fn db(&self) -> &LocalDb {
        &self.db
    }

    /// Queue failed writes land in.
    pub fn queue(&self) -> &PendingQueue {
        &self.queue
    }

    /// Sends a request with offline handling.
    ///
    /// A failed POST/PUT with a store and body is queued and answered with
    /// the optimistic local copy. A failed DELETE is queued, applied locally,
    /// and still returns the error. A failed GET answers from the cache.
    pub async fn fetch(&self, url: &str, options: FetchOptions) -> Result<Value, ClientError> {
        if options.method == Method::Get {
            self.read(url, options).await
        } else {
            self.write(url, options).await
        }
    }

    /// Saves `body` to the store's endpoint with POST.
    pub async fn save(&self, store: StoreName, body: Value) -> Result<Value, ClientError> {
        let url = endpoint(store).ok_or(ClientError::NoEndpoint(store))?;
        self.fetch(url, FetchOptions::write(Method::Post, store, body)).await
    }

    /// Lists the store's records, from cache when offline.
    pub async fn list(&self, store: StoreName) -> Result<Value, ClientError> {
        let url = endpoint(store).ok_or(ClientError::NoEndpoint(store))?;
        self.fetch(url, FetchOptions::get(store)).await
    }

    /// Loads the record for one date, from cache when offline.
    pub async fn load_by_date(&self, store: StoreName, date: &str) -> Result<Value, ClientError> {
        let url = endpoint(store).ok_or(ClientError::NoEndpoint(store))?;
        self.fetch(&format!("{url}?date={date}"), FetchOptions::get(store))
            .await
    }

    /// Deletes the record identified by `identifier` (`id`, `date` or `log_date`).
    pub async fn remove(&self, store: StoreName, identifier: Value) -> Result<(), ClientError> {
        let url = endpoint(store).ok_or(ClientError::NoEndpoint(store))?;
        self.delete(&delete_url(url, &identifier), store, identifier)
            .await
    }

    /// DELETE with offline handling.
    ///
    /// On success the local copy is removed. On failure the delete is queued,
    /// the local copy is removed anyway, and the error is returned.
    pub async fn delete(
        &self,
        url: &str,
        store: StoreName,
        identifier: Value,
    ) -> Result<(), ClientError> {
        match self.send(ApiRequest::delete(url)).await {
            Ok(_) => {
                if let Err(err) = self.evict(store, &identifier).await {
                    warn!(%err, %url, "could not evict deleted record from cache");
                }
                Ok(())
            }
            Err(err) => {
                warn!(%url, %err, "delete failed, queuing for sync");
                self.queue
                    .enqueue(store, Operation::Delete, identifier.clone())
                    .await?;
                self.evict(store, &identifier).await?;
                Err(err)
            }
        }
    }

    async fn send(&self, request: ApiRequest) -> Result<Option<Value>, ClientError> {
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(ClientError::Status(response.status));
        }
        Ok(response.body)
    }

    async fn write(&self, url: &str, options: FetchOptions) -> Result<Value, ClientError> {
        let request = ApiRequest {
            method: options.method,
            url: url.to_string(),
            body: options.body.clone(),
        };

        let err = match self.send(request).await {
            Ok(data) => {
                let data = data.unwrap_or(Value::Null);
                if let Some(store) = options.store {
                    if let Err(err) = self.cache(store, &data).await {
                        warn!(%err, %url, "could not cache confirmed write");
                    }
                }
                return Ok(data);
            }
            Err(err) => err,
        };

        let (Some(store), Some(body), Some(operation)) = (
            options.store,
            options.body,
            operation_for_method(options.method),
        ) else {
            return Err(err);
        };
        warn!(%url, %err, "request failed, queuing for sync");

        match operation {
            Operation::Delete => {
                self.queue.enqueue(store, operation, body.clone()).await?;
                self.evict(store, &body).await?;
                Err(err)
            }
            Operation::Create | Operation::Update => {
                let (local, key) = with_local_id(&body).map_err(PersistError::from)?;
                self.queue
                    .enqueue_with_local_id(store, operation, body, key)
                    .await?;
                self.db.put(store, local.clone()).await?;
                Ok(local)
            }
        }
    }

    async fn read(&self, url: &str, options: FetchOptions) -> Result<Value, ClientError> {
        let err = match self.send(ApiRequest::get(url)).await {
            Ok(data) => {
                let data = data.unwrap_or(Value::Null);
                if let (Some(store), true) = (options.store, options.use_cache) {
                    if let Err(err) = self.cache(store, &data).await {
                        warn!(%err, %url, "could not cache fetched data");
                    }
                }
                return Ok(data);
            }
            Err(err) => err,
        };

        let (Some(store), true) = (options.store, options.use_cache) else {
            return Err(err);
        };
        warn!(%url, %err, "fetch failed, using cached data");

        let (date, id) = scope_params(url)?;
        let cached = self.db.get_all(store).await?;
        if date.is_some() || id.is_some() {
            let hit = cached
                .into_iter()
                .find(|rec| matches_scope(rec, date.as_deref(), id.as_deref()));
            return Ok(hit.unwrap_or(Value::Null));
        }
        Ok(Value::Array(cached))
    }

    async fn cache(&self, store: StoreName, data: &Value) -> Result<(), PersistError> {
        match data {
            Value::Array(items) => {
                let records: Vec<Value> = items.iter().filter(|v| v.is_object()).cloned().collect();
                if !records.is_empty() {
                    self.db.put_many(store, records).await?;
                }
            }
            Value::Object(_) => {
                self.db.put(store, data.clone()).await?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Removes local copies addressed by `identifier`: by `id` when present,
    /// otherwise every record whose date matches.
    async fn evict(&self, store: StoreName, identifier: &Value) -> Result<(), PersistError> {
        if let Some(key) = record_key(identifier)? {
            return self.db.delete(store, key).await;
        }
        let Some(date) = date_field(identifier) else {
            return Ok(());
        };

        let keys: Vec<RecordKey> = self
            .db
            .get_all(store)
            .await?
            .iter()
            .filter(|rec| matches_scope(rec, Some(date.as_str()), None))
            .filter_map(|rec| record_key(rec).ok().flatten())
            .collect();
        for key in keys {
            self.db.delete(store, key).await?;
        }
        Ok(())
    }
}

fn scope_params(url: &str) -> Result<(Option<String>, Option<String>), ClientError> {
    let parsed = Url::parse(url)
        .or_else(|_| Url::parse("http://localhost").and_then(|base| base.join(url)))
        .map_err(|_| ClientError::InvalidUrl(url.to_string()))?;

    let mut date = None;
    let mut id = None;
    for (k, v) in parsed.query_pairs() {
        match k.as_ref() {
            "date" if date.is_none() && !v.is_empty() => date = Some(v.into_owned()),
            "id" if id.is_none() && !v.is_empty() => id = Some(v.into_owned()),
            _ => {}
        }
    }
    Ok((date, id))
}
