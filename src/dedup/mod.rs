//! MinHash signatures and banded LSH near-duplicate detection.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const SIGNATURE_LEN: usize = 128;
pub const BAND_SIZE: usize = 4;
pub const NUM_BANDS: usize = SIGNATURE_LEN / BAND_SIZE;
pub const SHINGLE_SIZE: usize = 4;
const PRIME: u64 = (1u64 << 61) - 1;
/// A signature counts as a near-duplicate once more than 80% of its 128
/// components agree with a stored candidate (i.e. >102, the 103rd component
/// tips it over).
pub const DUP_THRESHOLD: f64 = 0.8;

pub type Signature = [u64; SIGNATURE_LEN];
pub type BandKey = [u64; BAND_SIZE];

pub struct MinHasher {
    a: [u64; SIGNATURE_LEN],
    b: [u64; SIGNATURE_LEN],
}

impl MinHasher {
    pub fn from_salts(a: [u64; SIGNATURE_LEN], b: [u64; SIGNATURE_LEN]) -> Self {
        MinHasher { a, b }
    }

    /// Deterministic salts, generated once per fresh index from a seeded PRNG.
    pub fn fresh() -> Self {
        let mut rng = StdRng::seed_from_u64(1);
        let mut a = [0u64; SIGNATURE_LEN];
        let mut b = [0u64; SIGNATURE_LEN];
        for i in 0..SIGNATURE_LEN {
            a[i] = rng.gen_range(1..PRIME);
            b[i] = rng.gen_range(0..PRIME);
        }
        MinHasher { a, b }
    }

    pub fn salts(&self) -> (&[u64; SIGNATURE_LEN], &[u64; SIGNATURE_LEN]) {
        (&self.a, &self.b)
    }

    pub fn hash64(s: &str) -> u64 {
        // FNV-1a
        let mut h: u64 = 0xcbf29ce484222325;
        for b in s.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        h
    }

    pub fn create_signature(&self, raw_tokens: &[String]) -> Signature {
        let mut sign = [u64::MAX; SIGNATURE_LEN];
        for shingle in word_ngrams(raw_tokens) {
            let hash = Self::hash64(&shingle);
            for i in 0..SIGNATURE_LEN {
                let x = ((self.a[i] as u128 * hash as u128 + self.b[i] as u128) % PRIME as u128) as u64;
                if x < sign[i] {
                    sign[i] = x;
                }
            }
        }
        sign
    }
}

fn word_ngrams(tokens: &[String]) -> Vec<String> {
    if tokens.len() < SHINGLE_SIZE {
        return Vec::new();
    }
    (0..=tokens.len() - SHINGLE_SIZE)
        .map(|i| tokens[i..i + SHINGLE_SIZE].concat())
        .collect()
}

pub fn band_keys(sig: &Signature) -> Vec<BandKey> {
    (0..NUM_BANDS)
        .map(|b| {
            let start = b * BAND_SIZE;
            let mut key = [0u64; BAND_SIZE];
            key.copy_from_slice(&sig[start..start + BAND_SIZE]);
            key
        })
        .collect()
}

/// Maximum fraction of matching components across all candidates.
pub fn best_similarity(sig: &Signature, candidates: &[Signature]) -> f64 {
    let mut best = 0.0f64;
    for cand in candidates {
        let agree = sig.iter().zip(cand.iter()).filter(|(x, y)| x == y).count();
        let sim = agree as f64 / SIGNATURE_LEN as f64;
        if sim > best {
            best = sim;
        }
    }
    best
}

pub fn is_duplicate(sig: &Signature, candidates: &[Signature]) -> bool {
    best_similarity(sig, candidates) > DUP_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn identical_token_streams_are_fully_similar() {
        let mh = MinHasher::fresh();
        let words = toks(&["the", "quick", "brown", "fox", "jumps"]);
        let sig1 = mh.create_signature(&words);
        let sig2 = mh.create_signature(&words);
        assert_eq!(best_similarity(&sig1, &[sig2]), 1.0);
    }

    #[test]
    fn short_token_streams_produce_no_shingles() {
        let words = toks(&["a", "b", "c"]);
        assert!(word_ngrams(&words).is_empty());
    }

    #[test]
    fn duplicate_threshold_is_strictly_above_80_percent() {
        let mut sig = [0u64; SIGNATURE_LEN];
        let mut cand = [0u64; SIGNATURE_LEN];
        for i in 0..SIGNATURE_LEN {
            sig[i] = i as u64;
            cand[i] = if i < 103 { i as u64 } else { 9999 };
        }
        assert!(is_duplicate(&sig, &[cand]));
        for i in 0..SIGNATURE_LEN {
            cand[i] = if i < 102 { i as u64 } else { 9999 };
        }
        assert!(!is_duplicate(&sig, &[cand]));
    }

    #[test]
    fn band_keys_cover_all_32_bands() {
        let sig = [0u64; SIGNATURE_LEN];
        assert_eq!(band_keys(&sig).len(), NUM_BANDS);
    }
}
