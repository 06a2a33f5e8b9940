//! Streaming HTML content extraction: a two-stack discipline separates
//! header text, body text and garbage (script/style/nav/ad-ish) subtrees,
//! and collects outbound anchors as candidate outlinks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
};
use url::Url;

use crate::model::{Passage, PassageKind};

use super::robots::RobotsTxt;
use super::url_norm::{is_same_origin, make_absolute_url, normalize_url};

const CHECK_CONTEXT_EVERY: u64 = 10;
const GARBAGE_TAGS: &[&str] = &["script", "style", "iframe", "aside", "nav", "footer"];

pub struct ExtractedLink {
    pub url: Url,
    pub same_origin: bool,
    /// true if this link was already visited at a depth shallower than or
    /// equal to the current crawl depth (so it should only contribute
    /// outlinks, not be re-enqueued for fetching).
    pub already_sufficiently_visited: bool,
}

pub struct ExtractResult {
    pub passages: Vec<Passage>,
    pub links: Vec<ExtractedLink>,
    pub raw_text: String,
}

struct Sink<'a> {
    base_url: Url,
    robots: Option<&'a RobotsTxt>,
    current_depth: usize,
    visited: &'a std::collections::HashMap<String, u32>,
    heading_stack: Vec<u8>,
    garbage_stack: Vec<String>,
    passages: Vec<Passage>,
    links: Vec<ExtractedLink>,
    raw_text: String,
    token_count: u64,
    cancelled: Arc<AtomicBool>,
    stop: bool,
}

impl<'a> Sink<'a> {
    fn push_text(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.raw_text.push_str(text);
        let kind = if self.heading_stack.is_empty() {
            PassageKind::Body
        } else {
            PassageKind::Header
        };
        self.passages.push(Passage {
            text: text.to_string(),
            kind,
        });
    }

    fn handle_anchor(&mut self, tag: &Tag) {
        let href = tag
            .attrs
            .iter()
            .find(|a| a.name.local.as_ref().eq_ignore_ascii_case("href"))
            .map(|a| a.value.to_string());
        let Some(href) = href else { return };
        let Some(resolved) = make_absolute_url(&href, &self.base_url) else {
            return;
        };
        let Some(normalized) = normalize_url(resolved.as_str()) else {
            return;
        };
        if let Some(robots) = self.robots {
            if !robots.is_allowed(super::client::USER_AGENT, resolved.path()) {
                return;
            }
        }
        let same = is_same_origin(&resolved, &self.base_url);
        let already = self
            .visited
            .get(&normalized)
            .map(|&depth| depth as usize <= self.current_depth)
            .unwrap_or(false);
        self.links.push(ExtractedLink {
            url: resolved,
            same_origin: same,
            already_sufficiently_visited: already,
        });
    }

    fn is_garbage_div(tag: &Tag) -> bool {
        tag.attrs.iter().any(|a| {
            let key = a.name.local.as_ref();
            if key.eq_ignore_ascii_case("class") || key.eq_ignore_ascii_case("id") {
                let v = a.value.to_lowercase();
                v.contains("ad") || v.contains("banner") || v.contains("promo")
            } else {
                false
            }
        })
    }
}

impl<'a> TokenSink for Sink<'a> {
    type Handle = ();

    fn process_token(&mut self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        if self.stop {
            return TokenSinkResult::Continue;
        }
        self.token_count += 1;
        if self.token_count % CHECK_CONTEXT_EVERY == 0 && self.cancelled.load(Ordering::SeqCst) {
            self.stop = true;
            return TokenSinkResult::Continue;
        }

        match token {
            Token::TagToken(tag) => {
                let name = tag.name.local.as_ref().to_lowercase();
                match tag.kind {
                    TagKind::StartTag => {
                        if !self.garbage_stack.is_empty() {
                            return TokenSinkResult::Continue;
                        }
                        match name.as_str() {
                            "h1" | "h2" => {
                                self.heading_stack.push(name.as_bytes()[1]);
                            }
                            "div" if Self::is_garbage_div(&tag) => {
                                self.garbage_stack.push(name);
                            }
                            "a" => self.handle_anchor(&tag),
                            _ if GARBAGE_TAGS.contains(&name.as_str()) => {
                                self.garbage_stack.push(name);
                            }
                            _ => {}
                        }
                    }
                    TagKind::EndTag => {
                        if name.starts_with('h') && name.len() > 1 {
                            if let Some(&top) = self.heading_stack.last() {
                                if top == name.as_bytes()[1] {
                                    self.heading_stack.pop();
                                }
                            }
                        }
                        if self.garbage_stack.last().map(|t| t == &name).unwrap_or(false) {
                            self.garbage_stack.pop();
                        }
                    }
                }
            }
            Token::CharacterTokens(text) => {
                if self.garbage_stack.is_empty() {
                    self.push_text(&text);
                }
            }
            _ => {}
        }

        TokenSinkResult::Continue
    }
}

/// Parses `html` in a single streaming pass, tracking cancellation every 10
/// tokens.
pub fn extract(
    html: &str,
    base_url: &Url,
    robots: Option<&RobotsTxt>,
    current_depth: usize,
    visited: &std::collections::HashMap<String, u32>,
    cancelled: Arc<AtomicBool>,
) -> ExtractResult {
    let sink = Sink {
        base_url: base_url.clone(),
        robots,
        current_depth,
        visited,
        heading_stack: Vec::new(),
        garbage_stack: Vec::new(),
        passages: Vec::new(),
        links: Vec::new(),
        raw_text: String::new(),
        token_count: 0,
        cancelled,
        stop: false,
    };

    let mut tokenizer = Tokenizer::new(sink, TokenizerOpts::default());
    let mut queue = BufferQueue::new();
    queue.push_back(StrTendril::from(html));
    let _ = tokenizer.feed(&mut queue);
    tokenizer.end();

    let sink = tokenizer.sink;
    ExtractResult {
        passages: sink.passages,
        links: sink.links,
        raw_text: sink.raw_text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separates_header_and_body_passages() {
        let html = "<h1>Title Here</h1><p>Body text here</p>";
        let base = Url::parse("https://example.com").unwrap();
        let visited = std::collections::HashMap::new();
        let result = extract(html, &base, None, 0, &visited, Arc::new(AtomicBool::new(false)));
        assert!(result.passages.iter().any(|p| p.kind == PassageKind::Header));
        assert!(result.passages.iter().any(|p| p.kind == PassageKind::Body));
    }

    #[test]
    fn drops_script_and_nav_text() {
        let html = "<nav>skip this</nav><p>keep this</p>";
        let base = Url::parse("https://example.com").unwrap();
        let visited = std::collections::HashMap::new();
        let result = extract(html, &base, None, 0, &visited, Arc::new(AtomicBool::new(false)));
        assert!(!result.raw_text.contains("skip this"));
        assert!(result.raw_text.contains("keep this"));
    }

    #[test]
    fn collects_same_origin_outlink() {
        let html = r#"<a href="/about">About</a>"#;
        let base = Url::parse("https://example.com").unwrap();
        let visited = std::collections::HashMap::new();
        let result = extract(html, &base, None, 0, &visited, Arc::new(AtomicBool::new(false)));
        assert_eq!(result.links.len(), 1);
        assert!(result.links[0].same_origin);
    }
}
