//! Text analysis: entity-aware tokenization plus English stemming.

mod stemmer;
mod tokenizer;

pub use stemmer::{is_stop_word, stem};
pub use tokenizer::Tokenizer;

use crate::model::{Token, TokenKind};

pub struct Analyzer {
    tokenizer: Tokenizer,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        Analyzer {
            tokenizer: Tokenizer::new(),
        }
    }

    /// Returns (original WORD-token values, classified tokens with WORD
    /// values replaced by their stem). Stop words and zero-length stems are
    /// dropped entirely; non-WORD, non-UNKNOWN, non-WHITESPACE tokens pass
    /// through unchanged.
    pub fn tokenize_and_stem(&self, text: &str) -> (Vec<String>, Vec<Token>) {
        let tokens = self.tokenizer.entity_tokenize(text);
        let mut words = Vec::new();
        let mut stemmed = Vec::new();

        for t in tokens {
            if t.kind == TokenKind::Word && !t.value.is_empty() {
                let s = stem(&t.value);
                if !s.is_empty() {
                    words.push(t.value.clone());
                    stemmed.push(Token {
                        value: s,
                        kind: TokenKind::Word,
                        start: t.start,
                        end: t.end,
                    });
                }
            } else if t.kind != TokenKind::Unknown && t.kind != TokenKind::Whitespace {
                stemmed.push(t);
            }
        }

        (words, stemmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_and_stem_drops_stop_words() {
        let a = Analyzer::new();
        let (words, stemmed) = a.tokenize_and_stem("the cats are jumping");
        assert_eq!(words, vec!["cats", "jumping"]);
        let values: Vec<&str> = stemmed.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(values, vec!["cat", "jump"]);
    }
}
