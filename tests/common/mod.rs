#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use serde_json::{Value, json};

use gymsync::{
    persist::{LocalStore, PersistError, PersistResult, memory::MemoryStore},
    transport::{ApiRequest, ApiResponse, Transport, TransportError, TransportFuture},
    types::{Method, RecordKey, StoreName},
};

#[derive(Default)]
struct MockState {
    calls: Vec<ApiRequest>,
    offline: bool,
    failures: Vec<(String, Option<u16>)>,
    get_bodies: HashMap<String, Value>,
    next_id: i64,
}

/// Scripted transport: records calls, echoes writes with a server id.
pub struct MockTransport {
    state: Mutex<MockState>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState {
                next_id: 100,
                ..MockState::default()
            }),
        })
    }

    pub fn set_offline(&self, offline: bool) {
        self.state.lock().expect("lock").offline = offline;
    }

    /// Requests whose URL or body text contains `pattern` fail: with a network
    /// error when `status` is `None`, otherwise with that status.
    pub fn fail_matching(&self, pattern: &str, status: Option<u16>) {
        self.state
            .lock()
            .expect("lock")
            .failures
            .push((pattern.to_string(), status));
    }

    pub fn clear_failures(&self) {
        self.state.lock().expect("lock").failures.clear();
    }

    pub fn respond_to_get(&self, url: &str, body: Value) {
        self.state
            .lock()
            .expect("lock")
            .get_bodies
            .insert(url.to_string(), body);
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.state.lock().expect("lock").calls.clone()
    }

    pub fn call_urls(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.url).collect()
    }

    fn respond(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut state = self.state.lock().expect("lock");
        state.calls.push(request.clone());

        if state.offline {
            return Err(TransportError::Network("offline".to_string()));
        }

        let haystack = format!(
            "{} {}",
            request.url,
            request.body.as_ref().map(Value::to_string).unwrap_or_default()
        );
        let failure = state
            .failures
            .iter()
            .find(|(p, _)| haystack.contains(p.as_str()));
        if let Some((_, status)) = failure {
            return match status {
                Some(code) => Ok(ApiResponse::json(*code, json!({"error": "failed"}))),
                None => Err(TransportError::Network("connection reset".to_string())),
            };
        }

        match request.method {
            Method::Get => Ok(ApiResponse::json(
                200,
                state.get_bodies.get(&request.url).cloned().unwrap_or_else(|| json!([])),
            )),
            Method::Post | Method::Put => {
                let mut body = request.body.unwrap_or_else(|| json!({}));
                if let Some(obj) = body.as_object_mut() {
                    if !obj.get("id").is_some_and(Value::is_i64) {
                        state.next_id += 1;
                        obj.insert("id".to_string(), json!(state.next_id));
                    }
                }
                Ok(ApiResponse::json(200, body))
            }
            Method::Delete => Ok(ApiResponse::json(200, json!({"success": true}))),
        }
    }
}

impl Transport for MockTransport {
    fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
        let out = self.respond(request);
        Box::pin(async move { out })
    }
}

/// Switches shared between a test and its [`FaultyStore`].
#[derive(Clone, Default)]
pub struct Faults {
    /// While set, every `pendingSync` read fails.
    pub queue_reads: Arc<AtomicBool>,
    /// Number of upcoming `pendingSync` counts that fail.
    pub queue_counts: Arc<AtomicUsize>,
}

/// In-memory store whose queue reads and counts can be made to fail.
pub struct FaultyStore {
    inner: MemoryStore,
    faults: Faults,
}

impl FaultyStore {
    pub fn new() -> (Self, Faults) {
        let faults = Faults::default();
        (
            Self {
                inner: MemoryStore::new(),
                faults: faults.clone(),
            },
            faults,
        )
    }

    fn queue_read_fails(&self, store: StoreName) -> bool {
        store == StoreName::PendingSync && self.faults.queue_reads.load(Ordering::SeqCst)
    }
}

fn disk_error() -> PersistError {
    PersistError::Message("disk I/O error".to_string())
}

impl LocalStore for FaultyStore {
    fn get_all(&self, store: StoreName) -> PersistResult<Vec<Value>> {
        if self.queue_read_fails(store) {
            return Err(disk_error());
        }
        self.inner.get_all(store)
    }

    fn count(&self, store: StoreName) -> PersistResult<usize> {
        if self.queue_read_fails(store) {
            return Err(disk_error());
        }
        let one_shot = store == StoreName::PendingSync
            && self
                .faults
                .queue_counts
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
        if one_shot {
            return Err(disk_error());
        }
        self.inner.count(store)
    }

    fn get(&self, store: StoreName, key: &RecordKey) -> PersistResult<Option<Value>> {
        self.inner.get(store, key)
    }

    fn put(&mut self, store: StoreName, record: Value) -> PersistResult<RecordKey> {
        self.inner.put(store, record)
    }

    fn put_many(&mut self, store: StoreName, records: Vec<Value>) -> PersistResult<Vec<RecordKey>> {
        self.inner.put_many(store, records)
    }

    fn delete(&mut self, store: StoreName, key: &RecordKey) -> PersistResult<()> {
        self.inner.delete(store, key)
    }

    fn clear(&mut self, store: StoreName) -> PersistResult<()> {
        self.inner.clear(store)
    }
}
