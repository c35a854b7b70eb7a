//! Concurrent associative container.
//!
//! All operations, reads included, are serialized under a single mutex, so every operation
//! is linearizable. Snapshot accessors ([`ConcurrentMap::key_set`], [`ConcurrentMap::values`])
//! copy the data out under the lock; the copies are not affected by later mutations.
use std::{
    borrow::Borrow,
    collections::{hash_map::Entry, HashMap, HashSet},
    fmt,
    hash::Hash,
    sync::{Mutex, MutexGuard, PoisonError},
};


/// Hash map safe for concurrent use through a shared reference.
/// Share it between threads with an `Arc`.
///
/// Keys have no ordering. A "missing" key can be modelled with `Option<K>` as the key type:
/// `None` is then an ordinary key.
pub struct ConcurrentMap<K, V> {
    inner: Mutex<HashMap<K, V>>,
}

impl<K, V> Default for ConcurrentMap<K, V> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for ConcurrentMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.inner().iter()).finish()
    }
}

impl<K: Eq + Hash, V> FromIterator<(K, V)> for ConcurrentMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            inner: Mutex::new(iter.into_iter().collect()),
        }
    }
}

impl<K, V> ConcurrentMap<K, V> {
    /// Constructs an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, HashMap<K, V>> {
        // A panic inside the critical section (in a `compute_if_absent` supplier)
        // happens before the map is modified, so the map is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.inner().len()
    }

    /// Checks if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.inner().is_empty()
    }

    /// Removes all the entries.
    pub fn clear(&self) {
        self.inner().clear();
    }

    /// Consumes the map, returning the underlying `HashMap`.
    pub fn into_inner(self) -> HashMap<K, V> {
        self.inner
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K: Eq + Hash, V> ConcurrentMap<K, V> {
    /// Constructs an empty map with space for at least `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(HashMap::with_capacity(capacity)),
        }
    }

    /// Inserts `v` under `k`, returning the replaced value.
    pub fn put(&self, k: K, v: V) -> Option<V> {
        self.inner().insert(k, v)
    }

    /// Returns the value under `k`.
    pub fn get<Q>(&self, k: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        V: Clone,
    {
        self.inner().get(k).cloned()
    }

    /// Returns the value under `k`, or `default` if there is none.
    /// `default` is not inserted.
    pub fn get_or_default<Q>(&self, k: &Q, default: V) -> V
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        V: Clone,
    {
        self.get(k).unwrap_or(default)
    }

    /// Returns the value under `k`, inserting `supplier(&k)` first if there is none.
    ///
    /// The lock is held across the lookup, the `supplier` call and the insertion:
    /// threads racing on the same absent key call `supplier` exactly once in total
    /// and all of them get the inserted value. Consequently `supplier` must not
    /// access this map.
    pub fn compute_if_absent(&self, k: K, supplier: impl FnOnce(&K) -> V) -> V
    where
        V: Clone,
    {
        match self.inner().entry(k) {
            Entry::Occupied(e) => e.get().clone(),
            Entry::Vacant(e) => {
                let v = supplier(e.key());
                e.insert(v).clone()
            }
        }
    }

    /// Checks if there is a value under `k`.
    pub fn contains_key<Q>(&self, k: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.inner().contains_key(k)
    }

    /// Removes the value under `k`, returning it.
    pub fn remove<Q>(&self, k: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.inner().remove(k)
    }

    /// Snapshot of the keys.
    pub fn key_set(&self) -> HashSet<K>
    where
        K: Clone,
    {
        self.inner().keys().cloned().collect()
    }

    /// Snapshot of the values, in no particular order.
    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.inner().values().cloned().collect()
    }
}
