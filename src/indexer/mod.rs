//! Offline indexing pipeline: turns a fetched page's passages into stemmed
//! postings, MinHash/LSH near-duplicate detection and bigram statistics.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::crawler::PageIndexer;
use crate::dedup::{is_duplicate, MinHasher};
use crate::error::{Result, WftsError};
use crate::model::{Document, Passage, Position, TokenKind};
use crate::repository::{self, Repository};
use crate::store::KvStore;
use crate::text::Analyzer;

const MAX_STEM_LEN: usize = 64;
const MIN_TOKENS_FOR_DEDUP: usize = 4;

pub struct Indexer<S: KvStore> {
    repo: Arc<Repository<S>>,
    analyzer: Analyzer,
    minhash: MinHasher,
    ngram_count: usize,
    write_lock: Mutex<()>,
}

impl<S: KvStore> Indexer<S> {
    /// Loads existing MinHash salts, or generates and persists fresh ones if
    /// the index is empty. An index with documents but no salts is corrupt.
    pub fn new(repo: Arc<Repository<S>>, ngram_count: usize) -> Result<Self> {
        let minhash = match repo.load_salt_arrays()? {
            Some((a, b)) => MinHasher::from_salts(a, b),
            None => {
                if repo.get_documents_count()? != 0 {
                    return Err(WftsError::ConfigInvalid(
                        "index is not empty but salt arrays are missing".to_string(),
                    ));
                }
                let fresh = MinHasher::fresh();
                let (a, b) = fresh.salts();
                repo.save_salt_arrays(a, b)?;
                fresh
            }
        };

        Ok(Indexer {
            repo,
            analyzer: Analyzer::new(),
            minhash,
            ngram_count,
            write_lock: Mutex::new(()),
        })
    }

    /// Average token count across all indexed documents, used as the BM25
    /// length-normalization baseline.
    pub fn average_doc_len(&self) -> Result<f64> {
        let docs = self.repo.get_all_documents()?;
        let total: u64 = docs.iter().map(|d| d.token_count as u64).sum();
        Ok(total as f64 / (docs.len() as f64 + 1.0))
    }

    fn index_page_inner(&self, url: &str, passages: &[Passage]) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap();

        let mut stem_counts: HashMap<String, u32> = HashMap::new();
        let mut positions: HashMap<String, Vec<Position>> = HashMap::new();
        let mut all_word_tokens: Vec<String> = Vec::new();
        let mut ordinal: u32 = 0;

        for passage in passages {
            let (orig, stemmed) = self.analyzer.tokenize_and_stem(&passage.text);
            if stemmed.is_empty() {
                continue;
            }
            all_word_tokens.extend(orig);
            for t in stemmed {
                if t.kind == TokenKind::Number || t.value.len() > MAX_STEM_LEN {
                    continue;
                }
                *stem_counts.entry(t.value.clone()).or_insert(0) += 1;
                positions
                    .entry(t.value)
                    .or_default()
                    .push(Position::new(ordinal, passage.kind));
                ordinal += 1;
            }
        }

        let doc_id = repository::sha256_of(url);
        let doc = Document {
            id: doc_id,
            url: url.to_string(),
            token_count: ordinal,
        };

        if all_word_tokens.len() > MIN_TOKENS_FOR_DEDUP {
            let signature = self.minhash.create_signature(&all_word_tokens);
            let candidates = self.repo.get_similar_signatures(signature)?;
            if is_duplicate(&signature, &candidates) {
                log::debug!("duplicate page detected for {url}");
                return Err(WftsError::DuplicatePage);
            }
            self.repo.index_doc_shingles(signature)?;
        }

        let mut bigrams: HashMap<(u64, u64), u32> = HashMap::new();
        for w in 1..all_word_tokens.len() {
            let left = MinHasher::hash64(&all_word_tokens[w - 1]);
            let right = MinHasher::hash64(&all_word_tokens[w]);
            *bigrams.entry((left, right)).or_insert(0) += 1;
        }
        self.repo.update_bi_freq(&bigrams)?;
        self.repo.save_document(&doc)?;
        self.repo.index_ngrams(&all_word_tokens, self.ngram_count)?;
        self.repo
            .index_document_words(doc_id, &stem_counts, &positions)?;

        Ok(())
    }
}

impl<S: KvStore> PageIndexer for Indexer<S> {
    fn index_page(&self, url: &str, passages: &[Passage]) -> Result<()> {
        self.index_page_inner(url, passages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PassageKind;
    use crate::store::MemStore;

    fn passage(text: &str, kind: PassageKind) -> Passage {
        Passage {
            text: text.to_string(),
            kind,
        }
    }

    #[test]
    fn indexes_a_fresh_page_and_persists_document() {
        let repo = Arc::new(Repository::new(Arc::new(MemStore::new()), 20).unwrap());
        let indexer = Indexer::new(repo.clone(), 3).unwrap();
        let passages = vec![
            passage("Rust Programming Guide", PassageKind::Header),
            passage("This page explains ownership and borrowing in Rust", PassageKind::Body),
        ];
        indexer.index_page("https://example.com/rust", &passages).unwrap();
        assert_eq!(repo.get_documents_count().unwrap(), 1);
        let got = repo.get_documents_by_word("guide").unwrap();
        assert_eq!(got.len(), 1);
    }

    #[test]
    fn rejects_nonempty_index_with_missing_salts() {
        let store = Arc::new(MemStore::new());
        let repo = Arc::new(Repository::new(store, 20).unwrap());
        repo.save_document(&Document {
            id: [9u8; 32],
            url: "https://example.com/seed".to_string(),
            token_count: 3,
        })
        .unwrap();

        let err = Indexer::new(repo, 3).unwrap_err();
        assert!(matches!(err, WftsError::ConfigInvalid(_)));
    }

    #[test]
    fn duplicate_page_is_rejected_on_second_index() {
        let repo = Arc::new(Repository::new(Arc::new(MemStore::new()), 20).unwrap());
        let indexer = Indexer::new(repo, 3).unwrap();
        let text = "the quick brown fox jumps over the lazy dog again and again";
        let passages = vec![passage(text, PassageKind::Body)];
        indexer.index_page("https://example.com/a", &passages).unwrap();
        let err = indexer.index_page("https://example.com/b", &passages).unwrap_err();
        assert!(matches!(err, WftsError::DuplicatePage));
    }
}
