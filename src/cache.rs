use crate::error::Result;
use log::debug;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

/// SHA-256 digest of an uploaded byte stream, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn of(bytes: &[u8]) -> Self {
        Self(format!("{:x}", Sha256::digest(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Content-addressed memoization of parsed tables.
///
/// Entries live as long as the cache and are never evicted. Keys are derived
/// from exact content only, so a changed upload always misses. Failed
/// computations are not stored.
pub struct TableCache<T> {
    entries: Mutex<HashMap<ContentHash, Arc<T>>>,
}

impl<T> Default for TableCache<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> TableCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<ContentHash, Arc<T>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, hash: &ContentHash) -> Option<Arc<T>> {
        self.entries().get(hash).cloned()
    }

    pub fn get_or_compute<F>(&self, hash: &ContentHash, compute: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(hit) = self.get(hash) {
            debug!("Table cache hit for {}", hash);
            return Ok(hit);
        }

        debug!("Table cache miss for {}", hash);
        let value = Arc::new(compute()?);
        let mut entries = self.entries();
        Ok(entries.entry(hash.clone()).or_insert(value).clone())
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.entries().contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }
}
