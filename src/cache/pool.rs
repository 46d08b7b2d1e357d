//! Bounded resource pool ordered by priority, then recency.
//!
//! Both the tile cache (decoded files) and the renderer (GPU textures) keep
//! their resident sets here. Eviction removes the entry with the lowest
//! priority first and, among equals, the one touched longest ago.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug)]
struct PoolEntry<V> {
    value: V,
    priority: u32,
    serial: u64,
}

#[derive(Debug)]
pub struct BoundedPool<K, V> {
    entries: HashMap<K, PoolEntry<V>>,
    next_serial: u64,
}

impl<K, V> Default for BoundedPool<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            next_serial: 0,
        }
    }
}

impl<K: Eq + Hash + Clone, V> BoundedPool<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    fn bump(&mut self) -> u64 {
        self.next_serial += 1;
        self.next_serial
    }

    /// Insert as most recently used. Returns the value it replaced.
    pub fn insert(&mut self, key: K, value: V, priority: u32) -> Option<V> {
        let serial = self.bump();
        self.entries
            .insert(
                key,
                PoolEntry {
                    value,
                    priority,
                    serial,
                },
            )
            .map(|old| old.value)
    }

    /// Look up and mark as most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let serial = self.bump();
        self.entries.get_mut(key).map(|entry| {
            entry.serial = serial;
            &entry.value
        })
    }

    /// Look up without touching recency.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|entry| &entry.value)
    }

    pub fn touch(&mut self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn priority(&self, key: &K) -> Option<u32> {
        self.entries.get(key).map(|entry| entry.priority)
    }

    pub fn set_priority(&mut self, key: &K, priority: u32) -> bool {
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.priority = priority;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|entry| entry.value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    /// Keys from most to least valuable.
    pub fn eviction_order(&self) -> Vec<K> {
        let mut ranked: Vec<(&K, u32, u64)> = self
            .entries
            .iter()
            .map(|(k, e)| (k, e.priority, e.serial))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(b.2.cmp(&a.2)));
        ranked.into_iter().map(|(k, _, _)| k.clone()).collect()
    }

    /// The entry eviction would take next, with its priority.
    pub fn least_valuable(&self) -> Option<(K, u32)> {
        self.entries
            .iter()
            .min_by(|a, b| a.1.priority.cmp(&b.1.priority).then(a.1.serial.cmp(&b.1.serial)))
            .map(|(k, e)| (k.clone(), e.priority))
    }

    /// Evict least valuable entries until at most `cap` remain.
    pub fn evict_to(&mut self, cap: usize) -> Vec<(K, V)> {
        let mut evicted = Vec::new();
        while self.entries.len() > cap {
            let Some((key, _)) = self.least_valuable() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&key) {
                evicted.push((key, entry.value));
            }
        }
        evicted
    }

    /// Remove everything.
    pub fn drain(&mut self) -> Vec<(K, V)> {
        self.entries.drain().map(|(k, e)| (k, e.value)).collect()
    }
}
