//! Fixed-capacity LRU cache for outlink lists, keyed by a 32-byte hash.

use std::sync::Mutex;

use crate::model::LinkToken;

struct Entry {
    key: [u8; 32],
    value: Vec<LinkToken>,
}

pub struct LruCache {
    capacity: usize,
    entries: Mutex<Vec<Entry>>,
}

impl LruCache {
    pub fn new(capacity: usize) -> Self {
        LruCache {
            capacity: capacity.max(1),
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn get(&self, key: &[u8; 32]) -> Option<Vec<LinkToken>> {
        let mut guard = self.entries.lock().unwrap();
        let pos = guard.iter().position(|e| &e.key == key)?;
        let entry = guard.remove(pos);
        let value = entry.value.clone();
        guard.push(entry);
        Some(value)
    }

    pub fn put(&self, key: [u8; 32], value: Vec<LinkToken>) {
        let mut guard = self.entries.lock().unwrap();
        if let Some(pos) = guard.iter().position(|e| e.key == key) {
            guard.remove(pos);
        } else if guard.len() >= self.capacity {
            guard.remove(0);
        }
        guard.push(Entry { key, value });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used() {
        let cache = LruCache::new(2);
        let link = |u: &str| LinkToken {
            absolute_url: u.to_string(),
            same_origin: true,
        };
        cache.put([1u8; 32], vec![link("a")]);
        cache.put([2u8; 32], vec![link("b")]);
        assert!(cache.get(&[1u8; 32]).is_some());
        cache.put([3u8; 32], vec![link("c")]);
        assert!(cache.get(&[2u8; 32]).is_none());
        assert!(cache.get(&[1u8; 32]).is_some());
        assert!(cache.get(&[3u8; 32]).is_some());
    }
}
