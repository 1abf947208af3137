//! In-memory object store with scripted failures.

use super::{
    one_level, BackendKind, ListEntry, MetadataField, ObjectMetadata, ObjectStore, ProviderError,
    StoreError,
};
use std::collections::{BTreeMap, VecDeque};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

const CHUNK: usize = 4096;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
    updated_ms: Option<i64>,
}

/// A scripted failure for the next download or upload.
///
/// The call moves `after_bytes` bytes (from the object into the sink, or from
/// the source) before failing with a provider error carrying `status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub status: Option<u16>,
    pub after_bytes: usize,
}

impl Fault {
    pub fn status(status: u16) -> Self {
        Self {
            status: Some(status),
            after_bytes: 0,
        }
    }

    /// Transport-style failure (no status) after `after_bytes` bytes.
    pub fn dropped_after(after_bytes: usize) -> Self {
        Self {
            status: None,
            after_bytes,
        }
    }
}

/// Object store held in memory, reporting errors as the given backend would.
///
/// Queued [`Fault`]s are consumed in order by download and upload calls,
/// which makes retry behavior reproducible without a network.
#[derive(Debug)]
pub struct MemoryStore {
    kind: BackendKind,
    objects: Mutex<BTreeMap<String, StoredObject>>,
    faults: Mutex<VecDeque<Fault>>,
    transfers: AtomicU32,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryStore {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            objects: Mutex::new(BTreeMap::new()),
            faults: Mutex::new(VecDeque::new()),
            transfers: AtomicU32::new(0),
        }
    }

    pub fn insert(&self, key: &str, data: impl Into<Vec<u8>>) {
        self.insert_with_updated(key, data, Some(chrono::Utc::now().timestamp_millis()));
    }

    pub fn insert_with_updated(&self, key: &str, data: impl Into<Vec<u8>>, updated_ms: Option<i64>) {
        lock(&self.objects).insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                content_type: super::content_type_for(key).to_string(),
                updated_ms,
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        lock(&self.objects).get(key).map(|o| o.data.clone())
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        lock(&self.objects).get(key).map(|o| o.content_type.clone())
    }

    pub fn push_fault(&self, fault: Fault) {
        lock(&self.faults).push_back(fault);
    }

    /// Number of download and upload calls made so far.
    pub fn transfer_calls(&self) -> u32 {
        self.transfers.load(Ordering::SeqCst)
    }

    fn next_fault(&self) -> Option<Fault> {
        self.transfers.fetch_add(1, Ordering::SeqCst);
        lock(&self.faults).pop_front()
    }

    fn fault_error(&self, fault: &Fault, key: &str) -> ProviderError {
        let message = match fault.status {
            Some(s) => format!("injected HTTP {} for {}", s, key),
            None => format!("connection dropped after {} bytes of {}", fault.after_bytes, key),
        };
        ProviderError::new(self.kind, fault.status, message)
    }

    fn not_found(&self, key: &str) -> ProviderError {
        ProviderError::new(self.kind, Some(404), format!("no such object: {}", key))
            .with_code("NoSuchKey")
    }
}

impl ObjectStore for MemoryStore {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn metadata(
        &self,
        key: &str,
        _fields: &[MetadataField],
    ) -> Result<Option<ObjectMetadata>, StoreError> {
        Ok(lock(&self.objects).get(key).map(|o| ObjectMetadata {
            size: Some(o.data.len() as u64),
            updated_ms: o.updated_ms,
            content_type: Some(o.content_type.clone()),
        }))
    }

    fn list(&self, prefix: &str) -> Result<Vec<ListEntry>, StoreError> {
        let objects = lock(&self.objects);
        Ok(one_level(prefix, objects.keys().map(String::as_str)))
    }

    fn download(&self, key: &str, sink: &mut dyn Write) -> Result<(), StoreError> {
        let fault = self.next_fault();
        let data = match lock(&self.objects).get(key) {
            Some(o) => o.data.clone(),
            None => return Err(self.not_found(key).into()),
        };
        let limit = fault.as_ref().map_or(data.len(), |f| f.after_bytes.min(data.len()));
        for chunk in data[..limit].chunks(CHUNK) {
            sink.write_all(chunk)?;
        }
        if let Some(fault) = fault {
            return Err(self.fault_error(&fault, key).into());
        }
        Ok(())
    }

    fn upload(
        &self,
        key: &str,
        content_type: &str,
        source: &mut dyn Read,
        size: u64,
    ) -> Result<(), StoreError> {
        let fault = self.next_fault();
        let limit = fault.as_ref().map_or(size, |f| f.after_bytes as u64);
        let mut data = Vec::with_capacity(size as usize);
        source.take(limit).read_to_end(&mut data)?;
        if let Some(fault) = fault {
            return Err(self.fault_error(&fault, key).into());
        }
        lock(&self.objects).insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
                updated_ms: Some(chrono::Utc::now().timestamp_millis()),
            },
        );
        Ok(())
    }
}
