//! BM25 + proximity ranking over a resolved query's per-term postings, with
//! a secondary URL/header-boosted stable sort of the truncated top-k.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::model::{DocId, Document, PassageKind, PostingEntry};
use crate::query::ResolvedTerm;

pub const K1: f64 = 1.2;
pub const B: f64 = 0.75;

#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub id: DocId,
    pub url: String,
    pub bm25: f64,
    pub tf_idf: f64,
    /// Raw minimum span (in token positions) covering one occurrence of
    /// every query term, walked forward term-by-term. `u32::MAX` when the
    /// terms never co-occur in a coherent span.
    pub proximity: u32,
    pub url_match: bool,
    pub log_len_word_in_url: f64,
    pub header_match: bool,
}

/// Inverse document frequency, smoothed so a term present in every document
/// still contributes a small positive weight instead of zero.
pub fn idf(total_docs: usize, doc_freq: usize) -> f64 {
    ((total_docs as f64) / (doc_freq as f64 + 1.0)).ln() + 1.0
}

/// `tf` is the term frequency already normalized by document length
/// (`term_count / doc.token_count`).
fn bm25_term(tf: f64, idf: f64, doc_len: u32, avg_len: f64) -> f64 {
    let denom = tf + K1 * (1.0 - B + B * (doc_len as f64 / avg_len.max(1.0)));
    if denom == 0.0 {
        return 0.0;
    }
    idf * (tf * (K1 + 1.0) / denom)
}

/// Boyer-Moore substring search (bad-character rule only): returns true if
/// `needle` occurs anywhere in `haystack`.
pub fn contains_boyer_moore(haystack: &str, needle: &str) -> bool {
    let h: Vec<u8> = haystack.to_lowercase().into_bytes();
    let n: Vec<u8> = needle.to_lowercase().into_bytes();
    if n.is_empty() {
        return true;
    }
    if n.len() > h.len() {
        return false;
    }

    let mut last = [None; 256];
    for (i, &b) in n.iter().enumerate() {
        last[b as usize] = Some(i);
    }

    let m = n.len();
    let mut shift = 0usize;
    while shift <= h.len() - m {
        let mut j = m - 1;
        loop {
            if h[shift + j] != n[j] {
                let last_occ = last[h[shift + j] as usize];
                let advance = match last_occ {
                    Some(l) if l < j => j - l,
                    _ => j + 1,
                };
                shift += advance.max(1);
                break;
            }
            if j == 0 {
                return true;
            }
            j -= 1;
        }
    }
    false
}

/// Sums the character length of every query word found (via Boyer-Moore) in
/// `url`, case-insensitively; a word contributes its full length once if it
/// occurs at all. Returns `(any_found, log(1 + total_matched_length))`.
fn boyer_moore_url_score(url: &str, query_words: &[&str]) -> (bool, f64) {
    let total: usize = query_words
        .iter()
        .filter(|w| !w.is_empty() && contains_boyer_moore(url, w))
        .map(|w| w.chars().count())
        .sum();
    (total > 0, (1.0 + total as f64).ln())
}

/// The minimum span of token positions covering one occurrence of every
/// term in `term_positions[0..]`, walked forward: starting from each
/// position of the first term, advance to the next position of each
/// subsequent term, and take the span from start to the last position
/// reached. Returns `u32::MAX` if any later term has no positions at all
/// (matching the source ranking model's all-or-nothing treatment of a
/// missing term).
pub fn proximity_score(term_positions: &[&[u32]]) -> u32 {
    if term_positions.is_empty() || term_positions[0].is_empty() {
        return u32::MAX;
    }

    let mut min_span = u32::MAX;
    for &start in term_positions[0] {
        let mut last = start;
        let mut valid = true;
        let mut bail = false;
        for positions in &term_positions[1..] {
            if positions.is_empty() {
                bail = true;
                break;
            }
            let idx = positions.partition_point(|&p| p <= last);
            if idx >= positions.len() {
                valid = false;
                break;
            }
            last = positions[idx];
        }
        if bail {
            return min_span;
        }
        if valid {
            min_span = min_span.min(last - start);
        }
    }
    min_span
}

/// Scores and ranks `terms` against the full document catalog. Candidates
/// are first sorted by (bm25, tf_idf, proximity) descending and truncated to
/// `limit`, then that top-k is stably re-sorted by (url-match length,
/// header match) — the BM25 score itself is never boosted by either signal.
pub fn rank(
    terms: &[ResolvedTerm],
    documents: &HashMap<DocId, Document>,
    avg_doc_len: f64,
    query_text: &str,
    limit: usize,
) -> Vec<ScoredDocument> {
    let total_docs = documents.len().max(1);
    let query_words: Vec<&str> = query_text.split_whitespace().collect();

    let mut candidate_ids: Vec<DocId> = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for term in terms {
        for id in term.postings.keys() {
            if seen.insert(*id) {
                candidate_ids.push(*id);
            }
        }
    }

    let mut scored: Vec<ScoredDocument> = candidate_ids
        .par_iter()
        .filter_map(|id| {
            let doc = documents.get(id)?;
            Some(score_document(*id, doc, terms, total_docs, avg_doc_len, &query_words))
        })
        .collect();

    scored.sort_by(|a, b| {
        b.bm25
            .partial_cmp(&a.bm25)
            .unwrap()
            .then_with(|| b.tf_idf.partial_cmp(&a.tf_idf).unwrap())
            .then_with(|| b.proximity.cmp(&a.proximity))
    });
    scored.truncate(limit);

    scored.sort_by(|a, b| {
        b.log_len_word_in_url
            .partial_cmp(&a.log_len_word_in_url)
            .unwrap()
            .then_with(|| b.header_match.cmp(&a.header_match))
    });

    scored
}

fn score_document(
    id: DocId,
    doc: &Document,
    terms: &[ResolvedTerm],
    total_docs: usize,
    avg_doc_len: f64,
    query_words: &[&str],
) -> ScoredDocument {
    let mut bm25 = 0.0;
    let mut tf_idf = 0.0;
    let mut header_match = false;
    let mut position_lists: Vec<Vec<u32>> = Vec::with_capacity(terms.len());

    for term in terms {
        let doc_freq = term.postings.len();
        let weight = idf(total_docs, doc_freq);

        match term.postings.get(&id) {
            Some(entry) => {
                let tf = if doc.token_count > 0 {
                    entry.count as f64 / doc.token_count as f64
                } else {
                    0.0
                };
                bm25 += bm25_term(tf, weight, doc.token_count, avg_doc_len);
                tf_idf += tf * weight;
                if entry.positions.iter().any(|p| p.kind() == PassageKind::Header) {
                    header_match = true;
                }
                position_lists.push(entry.positions.iter().map(|p| p.index).collect());
            }
            None => position_lists.push(Vec::new()),
        }
    }

    let refs: Vec<&[u32]> = position_lists.iter().map(|v| v.as_slice()).collect();
    let proximity = proximity_score(&refs);
    let (url_match, log_len_word_in_url) = boyer_moore_url_score(&doc.url, query_words);

    ScoredDocument {
        id,
        url: doc.url.clone(),
        bm25,
        tf_idf,
        proximity,
        url_match,
        log_len_word_in_url,
        header_match,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Position;

    #[test]
    fn boyer_moore_finds_substring_case_insensitively() {
        assert!(contains_boyer_moore("https://Example.com/RUST-guide", "rust"));
        assert!(!contains_boyer_moore("https://example.com/go-guide", "rust"));
    }

    #[test]
    fn proximity_reports_smaller_raw_span_for_adjacent_terms() {
        let close = vec![vec![10u32], vec![11u32]];
        let far = vec![vec![10u32], vec![500u32]];
        let close_refs: Vec<&[u32]> = close.iter().map(|v| v.as_slice()).collect();
        let far_refs: Vec<&[u32]> = far.iter().map(|v| v.as_slice()).collect();
        assert!(proximity_score(&close_refs) < proximity_score(&far_refs));
    }

    #[test]
    fn single_term_proximity_is_zero() {
        let only = vec![vec![42u32]];
        let refs: Vec<&[u32]> = only.iter().map(|v| v.as_slice()).collect();
        assert_eq!(proximity_score(&refs), 0);
    }

    #[test]
    fn idf_is_positive_even_for_ubiquitous_terms() {
        assert!(idf(1000, 1000) > 0.0);
    }

    #[test]
    fn header_hits_rank_above_body_only_hits() {
        let mut header_postings = HashMap::new();
        header_postings.insert(
            [1u8; 32],
            PostingEntry {
                count: 1,
                positions: vec![Position::new(0, PassageKind::Header)],
            },
        );
        let mut body_postings = HashMap::new();
        body_postings.insert(
            [2u8; 32],
            PostingEntry {
                count: 1,
                positions: vec![Position::new(0, PassageKind::Body)],
            },
        );

        let mut documents = HashMap::new();
        documents.insert(
            [1u8; 32],
            Document {
                id: [1u8; 32],
                url: "https://example.com/a".to_string(),
                token_count: 10,
            },
        );
        documents.insert(
            [2u8; 32],
            Document {
                id: [2u8; 32],
                url: "https://example.com/b".to_string(),
                token_count: 10,
            },
        );

        let terms = vec![ResolvedTerm {
            stem: "rust".to_string(),
            postings: {
                let mut m = header_postings.clone();
                m.extend(body_postings.clone());
                m
            },
        }];

        // Both documents tie on bm25/tf_idf/proximity (identical tf, idf,
        // doc length) and neither url matches the query, so the secondary
        // header-match sort is what decides the order.
        let ranked = rank(&terms, &documents, 10.0, "rust", 10);
        assert_eq!(ranked[0].id, [1u8; 32]);
    }

    #[test]
    fn url_match_breaks_ties_via_secondary_sort() {
        let mut postings = HashMap::new();
        postings.insert(
            [1u8; 32],
            PostingEntry {
                count: 1,
                positions: vec![Position::new(0, PassageKind::Body)],
            },
        );
        postings.insert(
            [2u8; 32],
            PostingEntry {
                count: 1,
                positions: vec![Position::new(0, PassageKind::Body)],
            },
        );

        let mut documents = HashMap::new();
        documents.insert(
            [1u8; 32],
            Document {
                id: [1u8; 32],
                url: "https://example.com/guide-to-rust".to_string(),
                token_count: 10,
            },
        );
        documents.insert(
            [2u8; 32],
            Document {
                id: [2u8; 32],
                url: "https://example.com/other".to_string(),
                token_count: 10,
            },
        );

        let terms = vec![ResolvedTerm {
            stem: "rust".to_string(),
            postings,
        }];

        let ranked = rank(&terms, &documents, 10.0, "rust", 10);
        assert_eq!(ranked[0].id, [1u8; 32]);
        assert!(ranked[0].url_match);
    }
}
