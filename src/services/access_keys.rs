//! Shared fallback API keys, rotated round-robin

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct KeyRingInner {
    keys: RwLock<Vec<String>>,
    cursor: AtomicUsize,
}

/// Fallback keys used when a request carries no user access token.
///
/// Cloning shares the same ring, so the store can refresh keys that the data
/// source is handing out.
#[derive(Debug, Clone, Default)]
pub struct AccessKeyRing {
    inner: Arc<KeyRingInner>,
}

impl AccessKeyRing {
    pub fn new(keys: Vec<String>) -> Self {
        let ring = Self::default();
        ring.replace(keys);
        ring
    }

    /// Swap in a new key list. Blank keys are dropped.
    pub fn replace(&self, keys: Vec<String>) {
        let keys: Vec<String> = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        let mut guard = self.inner.keys.write().unwrap_or_else(|e| e.into_inner());
        *guard = keys;
        self.inner.cursor.store(0, Ordering::Relaxed);
    }

    /// Next key in rotation, `None` when the ring is empty
    pub fn next(&self) -> Option<String> {
        let guard = self.inner.keys.read().unwrap_or_else(|e| e.into_inner());
        if guard.is_empty() {
            return None;
        }
        let idx = self.inner.cursor.fetch_add(1, Ordering::Relaxed) % guard.len();
        Some(guard[idx].clone())
    }

    pub fn len(&self) -> usize {
        self.inner
            .keys
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
