//! Chunked index repository: typed views over a `KvStore` implementing the
//! key schema (documents, postings, n-grams, LSH shingles, bigrams, visited
//! set, salts, outlink cache).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sha2::{Digest, Sha256};

use crate::dedup::{band_keys, BandKey, Signature, SIGNATURE_LEN};
use crate::error::{Result, WftsError};
use crate::model::{DocId, Document, LinkToken, Position, PostingEntry};
use crate::store::{BatchOp, KvStore};

const DOC_PREFIX: &str = "doc:";
const POSTING_PREFIX: &str = "ri:";
const NGRAM_PREFIX: &str = "ng:";
const SHINGLE_PREFIX: &str = "shingle:";
const BIGRAM_PREFIX: &str = "big:";
const VISITED_PREFIX: &str = "visited:";
const SALT_PREFIX: &str = "salt:";
const URLS_PREFIX: &str = "urls:";

const WORD_CHUNK_BATCH: usize = 500;
const MAX_POSTING_VALUE_BYTES: usize = 1024 * 1024;

fn band_key_string(k: &BandKey) -> String {
    k.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

fn extract_ngrams(word: &str, n: usize) -> Vec<String> {
    let runes: Vec<char> = word.to_lowercase().chars().collect();
    if runes.len() < n {
        return Vec::new();
    }
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for i in 0..=runes.len() - n {
        let ng: String = runes[i..i + n].iter().collect();
        if seen.insert(ng.clone()) {
            out.push(ng);
        }
    }
    out
}

#[derive(Default)]
struct NgramChunks {
    buffer: HashMap<String, Vec<String>>,
    counts: HashMap<String, u32>,
}

#[derive(Default)]
struct ShingleChunks {
    buffer: HashMap<String, Vec<Signature>>,
    counts: HashMap<String, u32>,
}

pub struct Repository<S: KvStore> {
    store: Arc<S>,
    chunk_size: usize,
    ngrams: Mutex<NgramChunks>,
    shingles: Mutex<ShingleChunks>,
}

impl<S: KvStore> Repository<S> {
    pub fn new(store: Arc<S>, chunk_size: usize) -> Result<Self> {
        let repo = Repository {
            store,
            chunk_size,
            ngrams: Mutex::new(NgramChunks::default()),
            shingles: Mutex::new(ShingleChunks::default()),
        };
        repo.recover_chunk_counts()?;
        Ok(repo)
    }

    fn recover_chunk_counts(&self) -> Result<()> {
        let mut ngrams = self.ngrams.lock().unwrap();
        for (key, _) in self.store.scan_prefix(NGRAM_PREFIX.as_bytes())? {
            let key = String::from_utf8_lossy(&key).to_string();
            let rest = key.trim_start_matches(NGRAM_PREFIX);
            if let Some((ngram, chunk)) = rest.rsplit_once(':') {
                if let Ok(n) = chunk.parse::<u32>() {
                    let entry = ngrams.counts.entry(ngram.to_string()).or_insert(0);
                    *entry = (*entry).max(n);
                }
            }
        }
        drop(ngrams);

        let mut shingles = self.shingles.lock().unwrap();
        for (key, _) in self.store.scan_prefix(SHINGLE_PREFIX.as_bytes())? {
            let key = String::from_utf8_lossy(&key).to_string();
            let rest = key.trim_start_matches(SHINGLE_PREFIX);
            if let Some((band, chunk)) = rest.rsplit_once(':') {
                if let Ok(n) = chunk.parse::<u32>() {
                    let entry = shingles.counts.entry(band.to_string()).or_insert(0);
                    *entry = (*entry).max(n);
                }
            }
        }
        Ok(())
    }

    // ---- n-grams ----

    pub fn index_ngrams(&self, words: &[String], n: usize) -> Result<()> {
        for word in words {
            for ng in extract_ngrams(word, n) {
                let to_flush = {
                    let mut guard = self.ngrams.lock().unwrap();
                    let buf = guard.buffer.entry(ng.clone()).or_default();
                    buf.push(word.clone());
                    if buf.len() >= self.chunk_size {
                        let flushed = std::mem::take(buf);
                        let count = guard.counts.entry(ng.clone()).or_insert(0);
                        *count += 1;
                        Some((*count, flushed))
                    } else {
                        None
                    }
                };
                if let Some((chunk_id, words)) = to_flush {
                    self.flush_chunk(NGRAM_PREFIX, &ng, chunk_id, &words)?;
                }
            }
        }
        Ok(())
    }

    pub fn get_words_by_ngram(&self, word: &str, n: usize) -> Result<Vec<String>> {
        let mut seen = std::collections::HashSet::new();
        let mut result = Vec::new();
        for ngram in extract_ngrams(word, n) {
            {
                let guard = self.ngrams.lock().unwrap();
                if let Some(buf) = guard.buffer.get(&ngram) {
                    for w in buf {
                        if seen.insert(w.clone()) {
                            result.push(w.clone());
                        }
                    }
                }
            }
            let prefix = format!("{NGRAM_PREFIX}{ngram}:");
            for (_, val) in self.store.scan_prefix(prefix.as_bytes())? {
                let words: Vec<String> = serde_json::from_slice(&val)?;
                for w in words {
                    if seen.insert(w.clone()) {
                        result.push(w);
                    }
                }
            }
        }
        Ok(result)
    }

    // ---- LSH shingles ----

    pub fn index_doc_shingles(&self, sig: Signature) -> Result<()> {
        for key in band_keys(&sig) {
            let key_str = band_key_string(&key);
            let to_flush = {
                let mut guard = self.shingles.lock().unwrap();
                let buf = guard.buffer.entry(key_str.clone()).or_default();
                buf.push(sig);
                if buf.len() >= self.chunk_size {
                    let flushed = std::mem::take(buf);
                    let count = guard.counts.entry(key_str.clone()).or_insert(0);
                    *count += 1;
                    Some((*count, flushed))
                } else {
                    None
                }
            };
            if let Some((chunk_id, sigs)) = to_flush {
                let encodable: Vec<Vec<u64>> = sigs.iter().map(|s| s.to_vec()).collect();
                self.flush_chunk(SHINGLE_PREFIX, &key_str, chunk_id, &encodable)?;
            }
        }
        Ok(())
    }

    pub fn get_similar_signatures(&self, sig: Signature) -> Result<Vec<Signature>> {
        let mut seen = std::collections::HashSet::new();
        let mut result = Vec::new();
        for key in band_keys(&sig) {
            let key_str = band_key_string(&key);
            {
                let guard = self.shingles.lock().unwrap();
                if let Some(buf) = guard.buffer.get(&key_str) {
                    for s in buf {
                        if seen.insert(*s) {
                            result.push(*s);
                        }
                    }
                }
            }
            let prefix = format!("{SHINGLE_PREFIX}{key_str}:");
            for (_, val) in self.store.scan_prefix(prefix.as_bytes())? {
                let sigs: Vec<Vec<u64>> = serde_json::from_slice(&val)?;
                for s in sigs {
                    if s.len() != SIGNATURE_LEN {
                        continue;
                    }
                    let mut arr = [0u64; SIGNATURE_LEN];
                    arr.copy_from_slice(&s);
                    if seen.insert(arr) {
                        result.push(arr);
                    }
                }
            }
        }
        Ok(result)
    }

    fn flush_chunk<T: serde::Serialize>(
        &self,
        prefix: &str,
        data: &str,
        chunk_id: u32,
        value: &T,
    ) -> Result<()> {
        let key = format!("{prefix}{data}:{chunk_id:04}");
        let val = serde_json::to_vec(value)?;
        self.store.put(key.as_bytes(), &val)
    }

    /// Drains every in-memory chunk buffer to disk. Call on shutdown.
    pub fn flush_all(&self) -> Result<()> {
        let drained: Vec<(String, u32, Vec<String>)> = {
            let mut guard = self.ngrams.lock().unwrap();
            let mut out = Vec::new();
            for (ng, buf) in guard.buffer.iter_mut() {
                if buf.is_empty() {
                    continue;
                }
                let count = guard.counts.entry(ng.clone()).or_insert(0);
                *count += 1;
                out.push((ng.clone(), *count, std::mem::take(buf)));
            }
            guard.buffer.clear();
            out
        };
        for (ng, chunk_id, words) in drained {
            self.flush_chunk(NGRAM_PREFIX, &ng, chunk_id, &words)?;
        }

        let drained: Vec<(String, u32, Vec<Signature>)> = {
            let mut guard = self.shingles.lock().unwrap();
            let mut out = Vec::new();
            for (key, buf) in guard.buffer.iter_mut() {
                if buf.is_empty() {
                    continue;
                }
                let count = guard.counts.entry(key.clone()).or_insert(0);
                *count += 1;
                out.push((key.clone(), *count, std::mem::take(buf)));
            }
            guard.buffer.clear();
            out
        };
        for (key, chunk_id, sigs) in drained {
            let encodable: Vec<Vec<u64>> = sigs.iter().map(|s| s.to_vec()).collect();
            self.flush_chunk(SHINGLE_PREFIX, &key, chunk_id, &encodable)?;
        }
        Ok(())
    }

    // ---- bigrams ----

    pub fn update_bi_freq(&self, bigrams: &HashMap<(u64, u64), u32>) -> Result<()> {
        for (&(left, right), &delta) in bigrams {
            let key = format!("{BIGRAM_PREFIX}{left}:{right}");
            let current = match self.store.get(key.as_bytes())? {
                Some(v) => u32::from_be_bytes(v.try_into().unwrap_or([0; 4])),
                None => 0,
            };
            self.store.put(key.as_bytes(), &(current + delta).to_be_bytes())?;
        }
        Ok(())
    }

    pub fn get_freq(&self, left: u64, right: u64) -> Result<u32> {
        let key = format!("{BIGRAM_PREFIX}{left}:{right}");
        match self.store.get(key.as_bytes())? {
            Some(v) => Ok(u32::from_be_bytes(v.try_into().unwrap_or([0; 4]))),
            None => Ok(0),
        }
    }

    // ---- salts ----

    pub fn save_salt_arrays(&self, a: &[u64; SIGNATURE_LEN], b: &[u64; SIGNATURE_LEN]) -> Result<()> {
        let mut bytes = Vec::with_capacity(SIGNATURE_LEN * 16);
        for v in a {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        for v in b {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        self.store.put(SALT_PREFIX.as_bytes(), &bytes)
    }

    pub fn load_salt_arrays(&self) -> Result<Option<([u64; SIGNATURE_LEN], [u64; SIGNATURE_LEN])>> {
        let Some(bytes) = self.store.get(SALT_PREFIX.as_bytes())? else {
            return Ok(None);
        };
        if bytes.len() != SIGNATURE_LEN * 16 {
            return Err(WftsError::KvSerialization("invalid salt record length".into()));
        }
        let mut a = [0u64; SIGNATURE_LEN];
        let mut b = [0u64; SIGNATURE_LEN];
        for i in 0..SIGNATURE_LEN {
            a[i] = u64::from_le_bytes(bytes[i * 8..i * 8 + 8].try_into().unwrap());
            b[i] = u64::from_le_bytes(bytes[SIGNATURE_LEN * 8 + i * 8..SIGNATURE_LEN * 8 + i * 8 + 8].try_into().unwrap());
        }
        Ok(Some((a, b)))
    }

    // ---- documents ----

    pub fn save_document(&self, doc: &Document) -> Result<()> {
        let key = format!("{DOC_PREFIX}{}", hex::encode(doc.id));
        let val = serde_json::to_vec(doc)?;
        self.store.put(key.as_bytes(), &val)
    }

    pub fn get_document_by_id(&self, id: DocId) -> Result<Document> {
        let key = format!("{DOC_PREFIX}{}", hex::encode(id));
        match self.store.get(key.as_bytes())? {
            Some(v) => Ok(serde_json::from_slice(&v)?),
            None => Err(WftsError::KvNotFound),
        }
    }

    pub fn get_all_documents(&self) -> Result<Vec<Document>> {
        let mut out = Vec::new();
        for (_, v) in self.store.scan_prefix(DOC_PREFIX.as_bytes())? {
            out.push(serde_json::from_slice(&v)?);
        }
        Ok(out)
    }

    pub fn get_documents_count(&self) -> Result<usize> {
        Ok(self.store.scan_prefix(DOC_PREFIX.as_bytes())?.len())
    }

    // ---- postings ----

    pub fn index_document_words(
        &self,
        doc_id: DocId,
        counts: &HashMap<String, u32>,
        positions: &HashMap<String, Vec<Position>>,
    ) -> Result<()> {
        let entries: Vec<(&String, &u32)> = counts.iter().collect();
        for chunk in entries.chunks(WORD_CHUNK_BATCH) {
            let mut ops = Vec::with_capacity(chunk.len());
            for (word, &freq) in chunk {
                let key = format!("{POSTING_PREFIX}{word}_{}", hex::encode(doc_id));
                let mut entry = PostingEntry {
                    count: freq,
                    positions: positions.get(*word).cloned().unwrap_or_default(),
                };
                if entry.positions.len() > crate::model::MAX_POSITIONS_PER_POSTING {
                    entry.positions.truncate(crate::model::MAX_POSITIONS_PER_POSTING);
                }
                let val = serde_json::to_vec(&entry)?;
                if val.len() > MAX_POSTING_VALUE_BYTES {
                    continue;
                }
                ops.push(BatchOp::Put(key.into_bytes(), val));
            }
            self.store.apply_batch(ops)?;
        }
        Ok(())
    }

    pub fn get_documents_by_word(&self, word: &str) -> Result<HashMap<DocId, PostingEntry>> {
        let prefix = format!("{POSTING_PREFIX}{word}_");
        let mut out = HashMap::new();
        for (key, val) in self.store.scan_prefix(prefix.as_bytes())? {
            let key_str = String::from_utf8_lossy(&key).to_string();
            let hex_part = &key_str[prefix.len()..];
            let decoded = hex::decode(hex_part).map_err(|e| WftsError::KvSerialization(e.to_string()))?;
            if decoded.len() != 32 {
                continue;
            }
            let mut id = [0u8; 32];
            id.copy_from_slice(&decoded);
            let entry: PostingEntry = serde_json::from_slice(&val)?;
            out.insert(id, entry);
        }
        Ok(out)
    }

    // ---- visited set ----

    pub fn load_visited_urls(&self) -> Result<HashMap<String, u32>> {
        let mut out = HashMap::new();
        for (key, val) in self.store.scan_prefix(VISITED_PREFIX.as_bytes())? {
            let url = String::from_utf8_lossy(&key[VISITED_PREFIX.len()..]).to_string();
            let depth: u32 = String::from_utf8_lossy(&val)
                .parse()
                .map_err(|_| WftsError::KvSerialization("invalid visited depth".into()))?;
            out.insert(url, depth);
        }
        Ok(out)
    }

    pub fn save_visited_urls(&self, visited: &HashMap<String, u32>) -> Result<()> {
        let ops = visited
            .iter()
            .map(|(url, depth)| {
                BatchOp::Put(
                    format!("{VISITED_PREFIX}{url}").into_bytes(),
                    depth.to_string().into_bytes(),
                )
            })
            .collect();
        self.store.apply_batch(ops)
    }

    // ---- outlink cache ----

    pub fn save_urls_to_bank(&self, hash: [u8; 32], links: &[LinkToken]) -> Result<()> {
        let key = format!("{URLS_PREFIX}{}", hex::encode(hash));
        let val = serde_json::to_vec(links)?;
        self.store.put(key.as_bytes(), &val)
    }

    pub fn get_urls_by_hash(&self, hash: [u8; 32]) -> Result<Option<Vec<LinkToken>>> {
        let key = format!("{URLS_PREFIX}{}", hex::encode(hash));
        match self.store.get(key.as_bytes())? {
            Some(v) => Ok(Some(serde_json::from_slice(&v)?)),
            None => Ok(None),
        }
    }
}

pub fn sha256_of(s: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    fn repo() -> Repository<MemStore> {
        Repository::new(Arc::new(MemStore::new()), 3).unwrap()
    }

    #[test]
    fn ngram_roundtrip_via_buffer_and_chunk() {
        let r = repo();
        let words = vec!["hello".to_string(), "help".to_string(), "held".to_string()];
        r.index_ngrams(&words, 3).unwrap();
        let found = r.get_words_by_ngram("hello", 3).unwrap();
        assert!(found.contains(&"hello".to_string()));
        assert!(found.contains(&"help".to_string()));
    }

    #[test]
    fn document_roundtrip() {
        let r = repo();
        let doc = Document {
            id: [7u8; 32],
            url: "https://example.com".to_string(),
            token_count: 42,
        };
        r.save_document(&doc).unwrap();
        let got = r.get_document_by_id(doc.id).unwrap();
        assert_eq!(got, doc);
        assert_eq!(r.get_documents_count().unwrap(), 1);
    }

    #[test]
    fn posting_roundtrip_preserves_count_and_positions() {
        let r = repo();
        let doc_id = [1u8; 32];
        let mut counts = HashMap::new();
        counts.insert("cat".to_string(), 2u32);
        let mut positions = HashMap::new();
        positions.insert(
            "cat".to_string(),
            vec![
                Position::new(0, crate::model::PassageKind::Body),
                Position::new(5, crate::model::PassageKind::Body),
            ],
        );
        r.index_document_words(doc_id, &counts, &positions).unwrap();
        let got = r.get_documents_by_word("cat").unwrap();
        let entry = got.get(&doc_id).unwrap();
        assert_eq!(entry.count, 2);
        assert_eq!(entry.positions.len(), 2);
    }

    #[test]
    fn bigram_counts_accumulate() {
        let r = repo();
        let mut bigrams = HashMap::new();
        bigrams.insert((1u64, 2u64), 3u32);
        r.update_bi_freq(&bigrams).unwrap();
        r.update_bi_freq(&bigrams).unwrap();
        assert_eq!(r.get_freq(1, 2).unwrap(), 6);
    }

    #[test]
    fn salts_roundtrip() {
        let r = repo();
        assert!(r.load_salt_arrays().unwrap().is_none());
        let a = [3u64; SIGNATURE_LEN];
        let b = [4u64; SIGNATURE_LEN];
        r.save_salt_arrays(&a, &b).unwrap();
        let (got_a, got_b) = r.load_salt_arrays().unwrap().unwrap();
        assert_eq!(got_a, a);
        assert_eq!(got_b, b);
    }
}
