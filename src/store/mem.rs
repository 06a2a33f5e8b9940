use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{BatchOp, KvStore};
use crate::error::Result;

/// In-memory ordered store used by repository and query-engine tests.
#[derive(Default)]
pub struct MemStore {
    data: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemStore {
    pub fn new() -> Self {
        MemStore::default()
    }
}

impl KvStore for MemStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.lock().unwrap().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.data.lock().unwrap().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn apply_batch(&self, ops: Vec<BatchOp>) -> Result<()> {
        let mut guard = self.data.lock().unwrap();
        for op in ops {
            match op {
                BatchOp::Put(k, v) => {
                    guard.insert(k, v);
                }
                BatchOp::Delete(k) => {
                    guard.remove(&k);
                }
            }
        }
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let guard = self.data.lock().unwrap();
        Ok(guard
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_scan_is_ordered_and_bounded() {
        let store = MemStore::new();
        store.put(b"a:1", b"x").unwrap();
        store.put(b"a:2", b"y").unwrap();
        store.put(b"b:1", b"z").unwrap();
        let got = store.scan_prefix(b"a:").unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].0, b"a:1");
        assert_eq!(got[1].0, b"a:2");
    }
}
