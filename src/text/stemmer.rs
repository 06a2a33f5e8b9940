//! Porter-style English stemmer: phase 1a unconditionally, phases 1b/2/3
//! guarded by measure > 0, phase 4 guarded by measure > 1.

use std::collections::HashSet;

use lazy_static::lazy_static;

lazy_static! {
    static ref STOP_WORDS: HashSet<&'static str> = [
        "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is",
        "it", "its", "of", "on", "that", "the", "to", "was", "were", "will", "with", "this",
        "but", "they", "have", "had", "what", "when", "where", "who", "which", "why", "how",
        "all", "any", "both", "each", "few", "more", "most", "other", "some", "such", "no",
        "nor", "not", "only", "own", "same", "so", "than", "too", "very",
    ]
    .into_iter()
    .collect();
}

const STEP1A: &[(&str, &str)] = &[("sses", "ss"), ("ies", "i"), ("ss", "ss"), ("s", "")];

const STEP1B: &[(&str, &str)] = &[("eed", "ee"), ("ed", ""), ("ing", "")];

const STEP2: &[(&str, &str)] = &[
    ("ational", "ate"),
    ("tional", "tion"),
    ("enci", "ence"),
    ("anci", "ance"),
    ("izer", "ize"),
    ("abli", "able"),
    ("alli", "al"),
    ("entli", "ent"),
    ("eli", "e"),
    ("ousli", "ous"),
    ("ization", "ize"),
    ("ation", "ate"),
    ("ator", "ate"),
    ("alism", "al"),
    ("iveness", "ive"),
    ("fulness", "ful"),
    ("ousness", "ous"),
    ("aliti", "al"),
    ("iviti", "ive"),
    ("biliti", "ble"),
];

const STEP3: &[(&str, &str)] = &[
    ("icate", "ic"),
    ("ative", ""),
    ("alize", "al"),
    ("iciti", "ic"),
    ("ical", "ic"),
    ("ful", ""),
    ("ness", ""),
];

const STEP4: &[(&str, &str)] = &[
    ("al", ""),
    ("ance", ""),
    ("ence", ""),
    ("er", ""),
    ("ic", ""),
    ("able", ""),
    ("ible", ""),
    ("ant", ""),
    ("ement", ""),
    ("ment", ""),
    ("ent", ""),
    ("ion", ""),
    ("ou", ""),
    ("ism", ""),
    ("ate", ""),
    ("iti", ""),
    ("ous", ""),
    ("ive", ""),
    ("ize", ""),
];

pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.contains(word.to_lowercase().as_str())
}

/// Counts VC transitions, the Porter "measure" of a word's consonant/vowel run.
fn measure(word: &str) -> usize {
    let is_vowel = |c: u8| matches!(c, b'a' | b'e' | b'i' | b'o' | b'u');
    let mut m = 0;
    let mut has_vowel = false;
    for &b in word.as_bytes() {
        if is_vowel(b) {
            has_vowel = true;
        } else if has_vowel {
            m += 1;
            has_vowel = false;
        }
    }
    m
}

fn trim_rule_suffix(word: &str, rules: &[(&str, &str)], threshold: usize) -> String {
    for (suffix, replacement) in rules {
        if let Some(stem) = word.strip_suffix(suffix) {
            if measure(stem) > threshold {
                return format!("{stem}{replacement}");
            }
        }
    }
    word.to_string()
}

/// Stems a single lowercase word. Stop words and words of length <= 2 are
/// returned unchanged except stop words, which stem to the empty string.
pub fn stem(word: &str) -> String {
    if is_stop_word(word) {
        return String::new();
    }
    if word.len() <= 2 {
        return word.to_string();
    }

    let mut w = word.to_string();
    for (suffix, replacement) in STEP1A {
        if let Some(stripped) = w.strip_suffix(suffix) {
            w = format!("{stripped}{replacement}");
            break;
        }
    }

    w = trim_rule_suffix(&w, STEP1B, 0);
    w = trim_rule_suffix(&w, STEP2, 0);
    w = trim_rule_suffix(&w, STEP3, 0);
    trim_rule_suffix(&w, STEP4, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stems_common_suffixes() {
        assert_eq!(stem("caresses"), "caress");
        assert_eq!(stem("ponies"), "poni");
        assert_eq!(stem("jumped"), "jump");
        assert_eq!(stem("jumping"), "jump");
        assert_eq!(stem("relational"), "relate");
    }

    #[test]
    fn stop_words_stem_to_empty() {
        assert_eq!(stem("the"), "");
        assert_eq!(stem("and"), "");
    }

    #[test]
    fn short_words_pass_through() {
        assert_eq!(stem("go"), "go");
    }

    #[test]
    fn measure_counts_vc_transitions() {
        assert_eq!(measure("tree"), 0);
        assert_eq!(measure("trouble"), 2);
    }
}
