//! Optional external reranker: groups the top-k ranked candidates into
//! column-major blocks, posts each block's feature vectors to `POST /rank`,
//! and swaps the best-scoring candidate of each block into its front slot.
//! Any failure degrades to the ranking order already computed locally.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::DocId;
use crate::ranking::ScoredDocument;

const RERANK_TIMEOUT: Duration = Duration::from_secs(10);
/// Column width of the grouping scheme: candidates at indices `{col, col +
/// WIDTH, col + 2*WIDTH, ...}` are ranked against each other as one request.
const RERANK_WIDTH: usize = 10;

#[derive(Serialize)]
struct RankCandidate<'a> {
    id: String,
    url: &'a str,
    bm25: f64,
    tf_idf: f64,
    proximity: u32,
}

#[derive(Serialize)]
struct RankRequest<'a> {
    documents: Vec<RankCandidate<'a>>,
}

#[derive(Deserialize)]
struct RankResponse {
    rel: Vec<f64>,
}

pub struct Reranker {
    client: reqwest::Client,
    base_url: String,
}

impl Reranker {
    pub fn new(base_url: String) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(RERANK_TIMEOUT).build()?;
        Ok(Reranker { client, base_url })
    }

    /// Returns the document ids of `candidates`, with the best-scoring
    /// element of each column-major block swapped into its front slot.
    /// Stops and returns whatever has been reordered so far the first time a
    /// request fails, matching the graceful-degradation requirement.
    pub async fn rerank(&self, candidates: &[ScoredDocument]) -> Vec<DocId> {
        let mut order: Vec<DocId> = candidates.iter().map(|c| c.id).collect();
        let n = order.len();
        let width = RERANK_WIDTH.min(n.max(1));

        for col in 0..width {
            let indices: Vec<usize> = (0..)
                .map(|j| j * width + col)
                .take_while(|&idx| idx < n)
                .collect();
            if indices.len() <= 1 {
                continue;
            }

            match self.rank_block(candidates, &indices).await {
                Some(best_row) => order.swap(col, indices[best_row]),
                None => {
                    log::warn!("reranker request failed, keeping local order from here on");
                    break;
                }
            }
        }

        order
    }

    /// Posts one column's feature vectors and returns the index (into
    /// `indices`) of the highest-relevance candidate.
    async fn rank_block(&self, candidates: &[ScoredDocument], indices: &[usize]) -> Option<usize> {
        let documents: Vec<RankCandidate> = indices
            .iter()
            .map(|&idx| {
                let c = &candidates[idx];
                RankCandidate {
                    id: hex::encode(c.id),
                    url: &c.url,
                    bm25: c.bm25,
                    tf_idf: c.tf_idf,
                    proximity: c.proximity,
                }
            })
            .collect();
        let body = RankRequest { documents };

        let resp = self
            .client
            .post(format!("{}/rank", self.base_url))
            .json(&body)
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let parsed: RankResponse = resp.json().await.ok()?;
        if parsed.rel.len() != indices.len() {
            return None;
        }

        parsed
            .rel
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(row, _)| row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_client_with_bounded_timeout() {
        let reranker = Reranker::new("https://rank.example.com".to_string());
        assert!(reranker.is_ok());
    }
}
