//! Entity-aware tokenizer: EMAIL/IPV4/URL are matched first (in that
//! priority), overlaps resolved greedily left-to-right, and the remaining
//! text is classified by Unicode code-point class.

use lazy_static::lazy_static;
use regex::Regex;

use crate::model::{Token, TokenKind};

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap();
    static ref IPV4_RE: Regex = {
        let octet = r"(25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)";
        Regex::new(&format!(r"\b{octet}\.{octet}\.{octet}\.{octet}\b")).unwrap()
    };
    static ref URL_RE: Regex =
        Regex::new(r"https?://[a-zA-Z0-9.-]+(?:\.[a-zA-Z]{2,})+/?[^\s]*").unwrap();
}

struct Candidate {
    start: usize,
    end: usize,
    kind: TokenKind,
}

pub struct Tokenizer;

impl Tokenizer {
    pub fn new() -> Self {
        Tokenizer
    }

    pub fn entity_tokenize(&self, input: &str) -> Vec<Token> {
        let mut candidates = Vec::new();
        for m in EMAIL_RE.find_iter(input) {
            candidates.push(Candidate {
                start: m.start(),
                end: m.end(),
                kind: TokenKind::Email,
            });
        }
        for m in IPV4_RE.find_iter(input) {
            candidates.push(Candidate {
                start: m.start(),
                end: m.end(),
                kind: TokenKind::Ipv4,
            });
        }
        for m in URL_RE.find_iter(input) {
            candidates.push(Candidate {
                start: m.start(),
                end: m.end(),
                kind: TokenKind::Url,
            });
        }

        // start ascending, longer span first among equal starts.
        candidates.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then_with(|| (b.end - b.start).cmp(&(a.end - a.start)))
        });

        let mut selected: Vec<Candidate> = Vec::new();
        let mut last_end: isize = -1;
        for c in candidates {
            if c.start as isize >= last_end {
                last_end = c.end as isize;
                selected.push(c);
            }
        }

        let mut out = Vec::new();
        let mut cursor = 0usize;
        for c in selected {
            if c.start > cursor {
                out.extend(self.fragment_tokenize(&input[cursor..c.start], cursor));
            }
            out.push(Token {
                value: input[c.start..c.end].to_string(),
                kind: c.kind,
                start: c.start,
                end: c.end,
            });
            cursor = c.end;
        }
        if cursor < input.len() {
            out.extend(self.fragment_tokenize(&input[cursor..], cursor));
        }
        out
    }

    fn fragment_tokenize(&self, fragment: &str, global_start: usize) -> Vec<Token> {
        let lowered = fragment.to_lowercase();
        let mut out = Vec::new();
        let mut buf = String::new();
        let mut buf_kind = TokenKind::Unknown;
        let mut buf_start = 0usize;

        let mut byte_pos = 0usize;
        for ch in lowered.chars() {
            let kind = classify(ch);
            if buf.is_empty() {
                buf.push(ch);
                buf_kind = kind;
                buf_start = byte_pos;
            } else if kind == buf_kind {
                buf.push(ch);
            } else {
                if !buf.is_empty() && buf_kind != TokenKind::Whitespace {
                    out.push(Token {
                        value: buf.clone(),
                        kind: buf_kind,
                        start: global_start + buf_start,
                        end: global_start + byte_pos,
                    });
                }
                buf.clear();
                buf.push(ch);
                buf_kind = kind;
                buf_start = byte_pos;
            }
            byte_pos += ch.len_utf8();
        }
        if !buf.is_empty() && buf_kind != TokenKind::Whitespace {
            out.push(Token {
                value: buf,
                kind: buf_kind,
                start: global_start + buf_start,
                end: global_start + byte_pos,
            });
        }
        out
    }
}

fn classify(c: char) -> TokenKind {
    if c.is_alphabetic() {
        TokenKind::Word
    } else if c.is_numeric() {
        TokenKind::Number
    } else if c.is_whitespace() {
        TokenKind::Whitespace
    } else if c.is_ascii_punctuation() || is_symbol(c) {
        TokenKind::Symbol
    } else {
        TokenKind::Unknown
    }
}

fn is_symbol(c: char) -> bool {
    matches!(
        c,
        '+' | '<' | '=' | '>' | '|' | '~' | '^' | '$' | '\u{00a4}'..='\u{00a6}'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_email_ipv4_url() {
        let t = Tokenizer::new();
        let toks = t.entity_tokenize("contact a@b.com or 192.168.0.1 via https://example.com/x");
        let kinds: Vec<TokenKind> = toks.iter().map(|t| t.kind).collect();
        assert!(kinds.contains(&TokenKind::Email));
        assert!(kinds.contains(&TokenKind::Ipv4));
        assert!(kinds.contains(&TokenKind::Url));
    }

    #[test]
    fn drops_whitespace_and_lowercases() {
        let t = Tokenizer::new();
        let toks = t.entity_tokenize("Hello   World");
        assert!(toks.iter().all(|t| t.kind != TokenKind::Whitespace));
        assert_eq!(toks[0].value, "hello");
    }

    #[test]
    fn splits_number_and_word_runs() {
        let t = Tokenizer::new();
        let toks = t.entity_tokenize("abc123");
        assert_eq!(toks.len(), 2);
        assert_eq!(toks[0].kind, TokenKind::Word);
        assert_eq!(toks[1].kind, TokenKind::Number);
    }
}
