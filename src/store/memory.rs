//! In-process store.
//!
//! Used for `--dry-run` and by tests. Write-once semantics match what a
//! WebDAV server enforces for `If-None-Match: *`.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;

use super::{EntryType, PutOptions, RemoteStore, StoreError, StoreResult, WriteSink};

/// One recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Stat(String),
    CreateDirectory(String),
    Put { path: String, overwrite: bool },
    OpenSink(String),
}

#[derive(Debug, Clone)]
enum Entry {
    File(Bytes),
    Directory,
}

#[derive(Debug, Default)]
struct Inner {
    entries: Mutex<BTreeMap<String, Entry>>,
    calls: Mutex<Vec<StoreCall>>,
    failing: Mutex<HashSet<String>>,
}

/// Thread-safe in-memory [`RemoteStore`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write to `path` fail.
    pub fn fail_writes_to(&self, path: impl Into<String>) {
        self.inner.failing.lock().insert(path.into());
    }

    /// Contents stored at `path`.
    pub fn get(&self, path: &str) -> Option<Bytes> {
        match self.inner.entries.lock().get(path) {
            Some(Entry::File(data)) => Some(data.clone()),
            _ => None,
        }
    }

    /// All stored file paths, sorted.
    pub fn files(&self) -> Vec<String> {
        self.inner
            .entries
            .lock()
            .iter()
            .filter(|(_, entry)| matches!(entry, Entry::File(_)))
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.inner.calls.lock().clone()
    }

    pub fn put_count(&self) -> usize {
        self.count(|call| matches!(call, StoreCall::Put { .. }))
    }

    pub fn sink_count(&self) -> usize {
        self.count(|call| matches!(call, StoreCall::OpenSink(_)))
    }

    fn count(&self, pred: impl Fn(&StoreCall) -> bool) -> usize {
        self.inner.calls.lock().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: StoreCall) {
        self.inner.calls.lock().push(call);
    }

    fn check_failing(&self, path: &str) -> StoreResult<()> {
        if self.inner.failing.lock().contains(path) {
            return Err(StoreError::Status {
                method: "PUT",
                path: path.to_string(),
                status: 500,
            });
        }
        Ok(())
    }
}

impl Inner {
    fn store(&self, path: &str, data: Bytes, overwrite: bool) -> StoreResult<()> {
        let mut entries = self.entries.lock();
        if !overwrite && entries.contains_key(path) {
            return Err(StoreError::AlreadyExists(path.to_string()));
        }
        entries.insert(path.to_string(), Entry::File(data));
        Ok(())
    }
}

#[async_trait::async_trait]
impl RemoteStore for MemoryStore {
    async fn stat(&self, path: &str) -> StoreResult<Option<EntryType>> {
        self.record(StoreCall::Stat(path.to_string()));

        let key = path.trim_end_matches('/');
        let entries = self.inner.entries.lock();
        match entries.get(key) {
            Some(Entry::File(_)) => return Ok(Some(EntryType::File)),
            Some(Entry::Directory) => return Ok(Some(EntryType::Directory)),
            None => {}
        }

        // Directories are implied by the files beneath them.
        let prefix = format!("{key}/");
        let implied = entries.keys().any(|k| k.starts_with(&prefix));
        Ok(implied.then_some(EntryType::Directory))
    }

    async fn create_directory(&self, path: &str) -> StoreResult<()> {
        self.record(StoreCall::CreateDirectory(path.to_string()));
        self.inner
            .entries
            .lock()
            .insert(path.trim_end_matches('/').to_string(), Entry::Directory);
        Ok(())
    }

    async fn put_file_contents(
        &self,
        path: &str,
        data: Bytes,
        options: PutOptions,
    ) -> StoreResult<()> {
        self.record(StoreCall::Put {
            path: path.to_string(),
            overwrite: options.overwrite,
        });
        self.check_failing(path)?;
        self.inner.store(path, data, options.overwrite)
    }

    async fn create_write_sink(&self, path: &str) -> StoreResult<Box<dyn WriteSink>> {
        self.record(StoreCall::OpenSink(path.to_string()));
        self.check_failing(path)?;
        Ok(Box::new(MemorySink {
            path: path.to_string(),
            buffer: BytesMut::new(),
            inner: Arc::clone(&self.inner),
        }))
    }
}

struct MemorySink {
    path: String,
    buffer: BytesMut,
    inner: Arc<Inner>,
}

#[async_trait::async_trait]
impl WriteSink for MemorySink {
    async fn write(&mut self, chunk: Bytes) -> StoreResult<()> {
        self.buffer.extend_from_slice(&chunk);
        Ok(())
    }

    async fn finish(self: Box<Self>) -> StoreResult<()> {
        let MemorySink {
            path,
            buffer,
            inner,
        } = *self;
        inner.store(&path, buffer.freeze(), true)
    }

    async fn abort(self: Box<Self>, reason: String) {
        tracing::debug!(path = %self.path, %reason, "Memory sink aborted");
    }
}
