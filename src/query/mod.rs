//! Online query analysis: tokenizes and stems a query, resolves each term
//! against the posting index, and falls back to noisy-channel spelling
//! correction (with an optional two-word split) when a term has no hits.

pub mod spellcheck;

use std::collections::HashMap;
use std::sync::Arc;

use crate::dedup::MinHasher;
use crate::error::{Result, WftsError};
use crate::model::{DocId, PostingEntry, TokenKind};
use crate::repository::Repository;
use crate::store::KvStore;
use crate::text::Analyzer;

use spellcheck::Candidate;

/// One resolved query term and the documents it matched (after any spelling
/// correction was applied).
pub struct ResolvedTerm {
    pub stem: String,
    pub postings: HashMap<DocId, PostingEntry>,
}

pub struct QueryEngine<S: KvStore> {
    repo: Arc<Repository<S>>,
    analyzer: Analyzer,
    ngram_count: usize,
    max_typo: usize,
}

impl<S: KvStore> QueryEngine<S> {
    pub fn new(repo: Arc<Repository<S>>, ngram_count: usize, max_typo: usize) -> Self {
        QueryEngine {
            repo,
            analyzer: Analyzer::new(),
            ngram_count,
            max_typo,
        }
    }

    pub fn resolve(&self, text: &str) -> Result<Vec<ResolvedTerm>> {
        let (words, stemmed) = self.analyzer.tokenize_and_stem(text);
        if stemmed.is_empty() {
            return Err(WftsError::EmptyTokens);
        }

        let len_words = words.len();
        let mut word_pos = 0usize;
        let mut resolved = Vec::with_capacity(stemmed.len());

        for tok in stemmed {
            let docs = self.repo.get_documents_by_word(&tok.value)?;

            if !docs.is_empty() || tok.kind != TokenKind::Word {
                resolved.push(ResolvedTerm {
                    stem: tok.value,
                    postings: docs,
                });
                if tok.kind == TokenKind::Word {
                    word_pos += 1;
                }
                continue;
            }

            let original = &words[word_pos];
            for term in self.correct(original, word_pos, len_words, &words)? {
                resolved.push(term);
            }
            word_pos += 1;
        }

        Ok(resolved)
    }

    /// Resolves a single out-of-vocabulary word via n-gram candidate
    /// generation, bigram-context scoring and (when the candidate set is
    /// small) a two-word split fallback.
    fn correct(
        &self,
        original: &str,
        word_pos: usize,
        len_words: usize,
        words: &[String],
    ) -> Result<Vec<ResolvedTerm>> {
        let candidate_words = self.repo.get_words_by_ngram(original, self.ngram_count)?;

        if spellcheck::should_try_split(candidate_words.len()) {
            if let Some(split) = self.try_split(original)? {
                return Ok(split);
            }
        }

        let left_hash = (word_pos > 0).then(|| MinHasher::hash64(&words[word_pos - 1]));
        let right_hash = (word_pos + 1 < len_words).then(|| MinHasher::hash64(&words[word_pos + 1]));

        let mut scored = Vec::with_capacity(candidate_words.len());
        for word in &candidate_words {
            let hash = MinHasher::hash64(word);
            let left_freq = match left_hash {
                Some(l) => self.repo.get_freq(l, hash)?,
                None => 0,
            };
            let right_freq = match right_hash {
                Some(r) => self.repo.get_freq(hash, r)?,
                None => 0,
            };
            scored.push(Candidate {
                word: word.clone(),
                left_freq,
                right_freq,
            });
        }

        let replacement = spellcheck::best_replacement(original, &scored, self.max_typo);
        let (_, re_stemmed) = self.analyzer.tokenize_and_stem(&replacement);
        let Some(best) = re_stemmed.into_iter().next() else {
            return Ok(Vec::new());
        };
        let postings = self.repo.get_documents_by_word(&best.value)?;
        Ok(vec![ResolvedTerm {
            stem: best.value,
            postings,
        }])
    }

    /// Tries every interior split of `original` into two words, keeping the
    /// first split whose halves both stem to known postings.
    fn try_split(&self, original: &str) -> Result<Option<Vec<ResolvedTerm>>> {
        for (left, right) in spellcheck::split_candidates(original) {
            let (_, left_stemmed) = self.analyzer.tokenize_and_stem(&left);
            let (_, right_stemmed) = self.analyzer.tokenize_and_stem(&right);
            let (Some(left_tok), Some(right_tok)) =
                (left_stemmed.into_iter().next(), right_stemmed.into_iter().next())
            else {
                continue;
            };

            let left_docs = self.repo.get_documents_by_word(&left_tok.value)?;
            let right_docs = self.repo.get_documents_by_word(&right_tok.value)?;
            if left_docs.is_empty() || right_docs.is_empty() {
                continue;
            }

            return Ok(Some(vec![
                ResolvedTerm {
                    stem: left_tok.value,
                    postings: left_docs,
                },
                ResolvedTerm {
                    stem: right_tok.value,
                    postings: right_docs,
                },
            ]));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::PageIndexer;
    use crate::indexer::Indexer;
    use crate::model::{Passage, PassageKind};
    use crate::store::MemStore;

    fn seeded_engine() -> QueryEngine<MemStore> {
        let repo = Arc::new(Repository::new(Arc::new(MemStore::new()), 20).unwrap());
        let indexer = Indexer::new(repo.clone(), 3).unwrap();
        indexer
            .index_page(
                "https://example.com/a",
                &[Passage {
                    text: "the quick brown fox jumps over the lazy dog".to_string(),
                    kind: PassageKind::Body,
                }],
            )
            .unwrap();
        QueryEngine::new(repo, 3, 2)
    }

    #[test]
    fn resolves_known_word_directly() {
        let engine = seeded_engine();
        let resolved = engine.resolve("fox").unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].postings.len(), 1);
    }

    #[test]
    fn empty_query_is_rejected() {
        let engine = seeded_engine();
        assert!(matches!(engine.resolve("the and"), Err(WftsError::EmptyTokens)));
    }

    #[test]
    fn corrects_a_single_typo() {
        let engine = seeded_engine();
        // "jumpss" shares enough trigrams with the indexed "jumps" to be
        // found via n-gram candidate generation, then re-stems to "jump".
        let resolved = engine.resolve("jumpss").unwrap();
        assert!(resolved.iter().any(|t| t.stem == "jump"));
    }
}
