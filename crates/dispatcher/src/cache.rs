//! PayloadCache - memoized frame encoding
//!
//! Keyed on the fully rendered message, so an entry can never be stale.
//! Optionally bounded: once the entry count exceeds the capacity, the oldest
//! inserted entries are evicted first.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use observability::record_cache_lookup;
use parking_lot::Mutex;

use crate::codec::{Encoder, FrameEncoder};

/// Concurrent rendered-message -> frame cache
pub struct PayloadCache {
    encoder: Arc<dyn Encoder>,
    entries: DashMap<Arc<str>, Bytes>,
    /// Insertion order, only tracked when bounded
    order: Mutex<VecDeque<Arc<str>>>,
    capacity: Option<usize>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PayloadCache {
    /// Cache using the default [`FrameEncoder`]
    pub fn new(capacity: Option<usize>) -> Self {
        Self::with_encoder(Arc::new(FrameEncoder), capacity)
    }

    /// Cache using a custom encoder
    pub fn with_encoder(encoder: Arc<dyn Encoder>, capacity: Option<usize>) -> Self {
        Self {
            encoder,
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            capacity: capacity.map(|c| c.max(1)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the cached frame for `message`, encoding it on first use
    pub fn get_or_encode(&self, message: &str) -> Bytes {
        if let Some(entry) = self.entries.get(message) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            record_cache_lookup(true);
            return entry.value().clone();
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        record_cache_lookup(false);

        let encoded = self.encoder.encode(message);
        let key: Arc<str> = Arc::from(message);
        match self.entries.entry(Arc::clone(&key)) {
            // lost a race with another encoder of the same message
            Entry::Occupied(existing) => return existing.get().clone(),
            Entry::Vacant(slot) => {
                slot.insert(encoded.clone());
            }
        }

        self.track(key);
        encoded
    }

    fn track(&self, key: Arc<str>) {
        let Some(capacity) = self.capacity else {
            return;
        };
        let mut order = self.order.lock();
        order.push_back(key);
        while order.len() > capacity {
            if let Some(oldest) = order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    /// Remove every entry
    pub fn clear(&self) {
        let mut order = self.order.lock();
        order.clear();
        self.entries.clear();
    }

    /// Number of cached frames
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured bound (None = unbounded)
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Lookups answered from the cache
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that had to encode
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

impl Default for PayloadCache {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_frame;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    /// Encoder that counts its invocations
    #[derive(Default)]
    struct CountingEncoder {
        calls: AtomicUsize,
    }

    impl Encoder for CountingEncoder {
        fn encode(&self, message: &str) -> Bytes {
            self.calls.fetch_add(1, Ordering::SeqCst);
            encode_frame(message)
        }
    }

    #[test]
    fn test_second_lookup_does_not_encode() {
        let encoder = Arc::new(CountingEncoder::default());
        let cache = PayloadCache::with_encoder(encoder.clone(), None);

        let first = cache.get_or_encode("DeepCraft");
        let second = cache.get_or_encode("DeepCraft");

        assert_eq!(first, second);
        assert_eq!(first, encode_frame("DeepCraft"));
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_distinct_messages_get_distinct_entries() {
        let cache = PayloadCache::new(None);
        cache.get_or_encode("A");
        cache.get_or_encode("B");
        cache.get_or_encode("A");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_clear_forces_reencode() {
        let encoder = Arc::new(CountingEncoder::default());
        let cache = PayloadCache::with_encoder(encoder.clone(), None);

        cache.get_or_encode("A");
        cache.clear();
        assert!(cache.is_empty());

        cache.get_or_encode("A");
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_bounded_cache_evicts_oldest() {
        let encoder = Arc::new(CountingEncoder::default());
        let cache = PayloadCache::with_encoder(encoder.clone(), Some(2));

        cache.get_or_encode("A");
        cache.get_or_encode("B");
        cache.get_or_encode("C");
        assert_eq!(cache.len(), 2);

        // B and C survive, A was evicted
        cache.get_or_encode("B");
        cache.get_or_encode("C");
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 3);
        cache.get_or_encode("A");
        assert_eq!(encoder.calls.load(Ordering::SeqCst), 4);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_concurrent_lookups_agree() {
        let cache = Arc::new(PayloadCache::new(Some(64)));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..200 {
                        let message = format!("msg-{}", (i + t) % 16);
                        assert_eq!(cache.get_or_encode(&message), encode_frame(&message));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 16);
    }
}
