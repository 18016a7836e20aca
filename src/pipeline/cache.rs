//! Section cache: skip the external call for a section seen recently.
//!
//! The cache is injected into [`crate::pipeline::transform::TransformClient`]
//! as an `Arc<dyn SectionCache>`, so each [`crate::Converter`] owns its own
//! instance and tests can swap in [`NoCache`] or a shared [`TtlCache`].

use base64::Engine;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::prompts::InstructionKind;

/// Cache key for one (instruction kind, section text) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// SHA-256 over the kind tag, the text length in chars and the first
/// `prefix_chars` chars of the text, URL-safe base64 without padding.
pub fn fingerprint(kind: InstructionKind, text: &str, prefix_chars: usize) -> Fingerprint {
    let char_len = text.chars().count();
    let prefix_end = text
        .char_indices()
        .nth(prefix_chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len());

    let mut hasher = Sha256::new();
    hasher.update(kind.tag().as_bytes());
    hasher.update([0u8]);
    hasher.update((char_len as u64).to_le_bytes());
    hasher.update(text[..prefix_end].as_bytes());
    let digest: [u8; 32] = hasher.finalize().into();
    Fingerprint(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest))
}

/// Storage for transformed sections.
pub trait SectionCache: Send + Sync {
    /// The cached output, if present and still live.
    fn get(&self, key: &Fingerprint) -> Option<String>;
    fn insert(&self, key: Fingerprint, value: String);
}

/// Cache that never stores anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl SectionCache for NoCache {
    fn get(&self, _key: &Fingerprint) -> Option<String> {
        None
    }

    fn insert(&self, _key: Fingerprint, _value: String) {}
}

/// In-memory cache with a time-to-live and a capacity bound.
///
/// When full, expired entries are dropped first; if that frees nothing the
/// oldest entry is evicted. Uses tokio's clock so paused-time tests can
/// advance past the TTL.
pub struct TtlCache {
    entries: Mutex<HashMap<Fingerprint, (Instant, String)>>,
    ttl: Duration,
    capacity: usize,
}

impl TtlCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Number of stored entries, live or not.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Fingerprint, (Instant, String)>> {
        // A poisoned lock only means another thread panicked mid-insert;
        // the map itself is still usable.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(600), 1024)
    }
}

impl SectionCache for TtlCache {
    fn get(&self, key: &Fingerprint) -> Option<String> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some((stored, value)) if stored.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn insert(&self, key: Fingerprint, value: String) {
        let mut entries = self.lock();
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            let ttl = self.ttl;
            entries.retain(|_, (stored, _)| stored.elapsed() < ttl);
            if entries.len() >= self.capacity {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, (stored, _))| *stored)
                    .map(|(k, _)| k.clone());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                }
            }
        }
        entries.insert(key, (Instant::now(), value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_deterministic() {
        let a = fingerprint(InstructionKind::Convert, "hello", 1024);
        let b = fingerprint(InstructionKind::Convert, "hello", 1024);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 43);
    }

    #[test]
    fn fingerprint_differs_by_kind() {
        let a = fingerprint(InstructionKind::Convert, "hello", 1024);
        let b = fingerprint(InstructionKind::Refine, "hello", 1024);
        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_differs_by_length_beyond_prefix() {
        let a = fingerprint(InstructionKind::Convert, "same prefix, tail one", 4);
        let b = fingerprint(InstructionKind::Convert, "same prefix, tail number two", 4);
        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_prefix_respects_char_boundaries() {
        let a = fingerprint(InstructionKind::Convert, "ééééé", 2);
        let b = fingerprint(InstructionKind::Convert, "ééxxx", 2);
        assert_eq!(a, b);
    }

    #[test]
    fn no_cache_stores_nothing() {
        let cache = NoCache;
        let key = fingerprint(InstructionKind::Convert, "x", 10);
        cache.insert(key.clone(), "y".into());
        assert_eq!(cache.get(&key), None);
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_cache_expires_entries() {
        let cache = TtlCache::new(Duration::from_secs(600), 10);
        let key = fingerprint(InstructionKind::Convert, "x", 10);
        cache.insert(key.clone(), "cached".into());
        assert_eq!(cache.get(&key).as_deref(), Some("cached"));

        tokio::time::advance(Duration::from_secs(601)).await;
        assert_eq!(cache.get(&key), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_cache_evicts_oldest_when_full() {
        let cache = TtlCache::new(Duration::from_secs(600), 2);
        let k1 = fingerprint(InstructionKind::Convert, "one", 10);
        let k2 = fingerprint(InstructionKind::Convert, "two", 10);
        let k3 = fingerprint(InstructionKind::Convert, "three", 10);

        cache.insert(k1.clone(), "1".into());
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.insert(k2.clone(), "2".into());
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.insert(k3.clone(), "3".into());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&k1), None);
        assert_eq!(cache.get(&k3).as_deref(), Some("3"));
    }
}
