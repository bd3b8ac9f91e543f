use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Minimal entry-count LRU map. Not synchronized; owners wrap it in a lock.
#[derive(Debug)]
pub struct LruMap<K, V> {
    cap: usize,
    map: HashMap<K, V>,
    // front = most-recent, back = least-recent
    order: VecDeque<K>,
}

impl<K, V> LruMap<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            map: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Read without moving the entry
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    /// Read and mark as most recently used
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if !self.map.contains_key(key) {
            return None;
        }
        self.touch(key);
        self.map.get(key)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        if !self.map.contains_key(key) {
            return None;
        }
        self.touch(key);
        self.map.get_mut(key)
    }

    /// Insert or replace; returns the entry evicted to stay within capacity
    pub fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.map.insert(key.clone(), value).is_some() {
            self.touch(&key);
            return None;
        }

        self.order.push_front(key);
        if self.map.len() > self.cap {
            if let Some(oldest) = self.order.pop_back() {
                if let Some(value) = self.map.remove(&oldest) {
                    return Some((oldest, value));
                }
            }
        }
        None
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let value = self.map.remove(key)?;
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        Some(value)
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.map.values()
    }

    fn touch(&mut self, key: &K) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if pos == 0 {
                return;
            }
            if let Some(k) = self.order.remove(pos) {
                self.order.push_front(k);
            }
        }
    }
}
