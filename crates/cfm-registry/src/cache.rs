//! In-memory memoization of remote lookups.

use std::{
    collections::{HashMap, VecDeque},
    hash::Hash,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use tracing::trace;

struct Slot<V> {
    value: Arc<V>,
    inserted: Instant,
}

struct Inner<K, V> {
    entries: HashMap<K, Slot<V>>,
    /// Keys in insertion order, oldest first.
    order: VecDeque<K>,
}

/// A bounded map whose entries expire `ttl` after insertion.
///
/// When full, the oldest entry is evicted. A zero `ttl` disables caching, `Duration::MAX`
/// keeps entries until they are evicted or invalidated.
pub struct TtlCache<K, V> {
    capacity: usize,
    ttl: Duration,
    inner: Mutex<Inner<K, V>>,
}

impl<K: Eq + Hash + Clone, V> TtlCache<K, V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, slot: &Slot<V>) -> bool {
        slot.inserted.elapsed() >= self.ttl
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let mut inner = self.lock();
        match inner.entries.get(key) {
            Some(slot) if !self.is_expired(slot) => Some(Arc::clone(&slot.value)),
            Some(_) => {
                inner.entries.remove(key);
                inner.order.retain(|k| k != key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: K, value: V) -> Arc<V> {
        let value = Arc::new(value);
        let mut inner = self.lock();

        if inner.entries.contains_key(&key) {
            inner.order.retain(|k| k != &key);
        } else {
            if inner.entries.len() >= self.capacity {
                let ttl = self.ttl;
                inner.entries.retain(|_, slot| slot.inserted.elapsed() < ttl);
                let Inner { entries, order } = &mut *inner;
                order.retain(|k| entries.contains_key(k));
            }
            while inner.entries.len() >= self.capacity {
                let Some(oldest) = inner.order.pop_front() else {
                    break;
                };
                trace!("evicting oldest cache entry");
                inner.entries.remove(&oldest);
            }
        }

        inner.order.push_back(key.clone());
        inner.entries.insert(
            key,
            Slot {
                value: Arc::clone(&value),
                inserted: Instant::now(),
            },
        );
        value
    }

    /// Returns the cached value or computes and caches it.
    ///
    /// The lock is not held while `f` runs, so concurrent misses may compute the value twice.
    /// Errors are returned without being cached.
    pub fn get_or_try_insert_with<E, F>(&self, key: K, f: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = f()?;
        Ok(self.insert(key, value))
    }

    /// Drops `key`, returning whether it was present.
    pub fn invalidate(&self, key: &K) -> bool {
        let mut inner = self.lock();
        inner.order.retain(|k| k != key);
        inner.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    /// Number of stored entries, expired ones included until they are touched.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
