//! Byte-budgeted cache of produced documents
//!
//! Every tool output is stored here under a fresh key so later calls can chain
//! on it (`{"cache_key": ...}`) without a round trip through the filesystem.

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// A serialized document and the name it was produced under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedDocument {
    pub data: Vec<u8>,
    /// Suggested file name, e.g. `report_part_02.pdf`
    pub name: String,
}

impl CachedDocument {
    pub fn new(data: Vec<u8>, name: impl Into<String>) -> Self {
        Self {
            data,
            name: name.into(),
        }
    }

    fn weight(&self) -> usize {
        self.data.len()
    }
}

struct CacheInner {
    lru: LruCache<String, CachedDocument>,
    total_bytes: usize,
}

/// LRU cache limited both by entry count and total document bytes
pub struct DocumentCache {
    inner: Mutex<CacheInner>,
    max_bytes: usize,
}

impl DocumentCache {
    pub fn new(capacity: usize, max_bytes: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                lru: LruCache::new(capacity),
                total_bytes: 0,
            }),
            max_bytes,
        }
    }

    /// Store a document, evicting least recently used entries to fit.
    ///
    /// Returns `false` when the document alone exceeds the byte budget; it is
    /// then not stored.
    pub fn put(&self, key: String, document: CachedDocument) -> bool {
        let new_size = document.weight();
        if new_size > self.max_bytes {
            tracing::debug!(key, size = new_size, "document larger than cache budget");
            return false;
        }

        let mut inner = self.inner.lock();

        if let Some(old) = inner.lru.pop(&key) {
            inner.total_bytes = inner.total_bytes.saturating_sub(old.weight());
        }

        while inner.total_bytes + new_size > self.max_bytes {
            match inner.lru.pop_lru() {
                Some((evicted, doc)) => {
                    tracing::debug!(key = evicted, "evicted cached document");
                    inner.total_bytes = inner.total_bytes.saturating_sub(doc.weight());
                }
                None => break,
            }
        }

        // Count-based eviction inside `push` must be reflected in the byte total
        if let Some((evicted, doc)) = inner.lru.push(key.clone(), document) {
            if evicted != key {
                inner.total_bytes = inner.total_bytes.saturating_sub(doc.weight());
            }
        }
        inner.total_bytes += new_size;
        true
    }

    /// Store a document under a new unique key and return the key
    pub fn insert(&self, document: CachedDocument) -> Option<String> {
        let key = self.generate_unique_key();
        self.put(key.clone(), document).then_some(key)
    }

    pub fn get(&self, key: &str) -> Option<CachedDocument> {
        self.inner.lock().lru.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().lru.contains(key)
    }

    pub fn remove(&self, key: &str) -> Option<CachedDocument> {
        let mut inner = self.inner.lock();
        let doc = inner.lru.pop(key)?;
        inner.total_bytes = inner.total_bytes.saturating_sub(doc.weight());
        Some(doc)
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.lru.clear();
        inner.total_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().lru.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.inner.lock().total_bytes
    }

    fn generate_unique_key(&self) -> String {
        let inner = self.inner.lock();
        loop {
            let key = uuid::Uuid::new_v4().to_string();
            if !inner.lru.contains(&key) {
                return key;
            }
        }
    }
}
