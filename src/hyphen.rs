//! Soft-hyphen insertion.
//!
//! Eligible words get U+00AD break opportunities from the Knuth-Liang
//! pattern dictionary for the book's language. The soft hyphens are
//! invisible unless the line breaker actually wraps at one. Running the
//! hyphenator twice is a no-op: words that already contain a soft hyphen
//! are left untouched.

use hyphenation::{Hyphenator as _, Language, Load, Standard};

use crate::book::{TextBlock, TextRun};

pub const SOFT_HYPHEN: char = '\u{00AD}';

/// Words shorter than this are never hyphenated.
const MIN_WORD_CHARS: usize = 6;

pub struct Hyphenator {
    dict: Option<Standard>,
}

impl Hyphenator {
    /// Build a hyphenator for a BCP-47 language tag.
    ///
    /// Tries the full tag, then the primary subtag. Unknown languages
    /// yield a hyphenator with no dictionary, which passes text through
    /// unmodified; callers surface that as a warning, not an error.
    pub fn for_language(tag: &str) -> Self {
        let dict = language_for_tag(tag).and_then(|lang| Standard::from_embedded(lang).ok());
        Self { dict }
    }

    /// A hyphenator that never inserts break points.
    pub fn disabled() -> Self {
        Self { dict: None }
    }

    pub fn is_available(&self) -> bool {
        self.dict.is_some()
    }

    /// Return a copy of `block` with soft hyphens inserted into eligible
    /// words. Headings are hyphenated like body text; the layout engine
    /// decides whether to use the break points.
    pub fn hyphenate_block(&self, block: &TextBlock) -> TextBlock {
        let Some(dict) = &self.dict else {
            return block.clone();
        };
        TextBlock {
            kind: block.kind,
            runs: block
                .runs
                .iter()
                .map(|run| TextRun {
                    text: hyphenate_text(dict, &run.text),
                    bold: run.bold,
                    italic: run.italic,
                })
                .collect(),
        }
    }
}

fn hyphenate_text(dict: &Standard, text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    let mut word = String::new();
    for ch in text.chars() {
        if ch.is_whitespace() {
            flush_word(dict, &mut word, &mut out);
            out.push(ch);
        } else {
            word.push(ch);
        }
    }
    flush_word(dict, &mut word, &mut out);
    out
}

fn flush_word(dict: &Standard, word: &mut String, out: &mut String) {
    if word.is_empty() {
        return;
    }
    out.push_str(&hyphenate_word(dict, word));
    word.clear();
}

fn hyphenate_word(dict: &Standard, word: &str) -> String {
    // Idempotence: never re-break an already hyphenated word.
    if word.contains(SOFT_HYPHEN) {
        return word.to_string();
    }
    // Peel punctuation so patterns only see the alphabetic core.
    let core_start = word
        .char_indices()
        .find(|(_, c)| c.is_alphanumeric())
        .map(|(i, _)| i)
        .unwrap_or(word.len());
    let core_end = word
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_alphanumeric())
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(core_start);
    let core = &word[core_start..core_end];
    if core.chars().count() < MIN_WORD_CHARS || core.chars().any(|c| c.is_numeric()) {
        return word.to_string();
    }

    let breaks = dict.hyphenate(core).breaks;
    if breaks.is_empty() {
        return word.to_string();
    }

    let mut result = String::with_capacity(word.len() + breaks.len() * 2);
    result.push_str(&word[..core_start]);
    let mut prev = 0;
    for &offset in &breaks {
        result.push_str(&core[prev..offset]);
        result.push(SOFT_HYPHEN);
        prev = offset;
    }
    result.push_str(&core[prev..]);
    result.push_str(&word[core_end..]);
    result
}

fn language_for_tag(tag: &str) -> Option<Language> {
    let tag = tag.trim().to_ascii_lowercase();
    let full = match tag.as_str() {
        "en-gb" => Some(Language::EnglishGB),
        "en-us" => Some(Language::EnglishUS),
        "de-ch" => Some(Language::GermanSwiss),
        "pt-br" | "pt-pt" => Some(Language::Portuguese),
        _ => None,
    };
    if full.is_some() {
        return full;
    }
    let primary = tag.split(['-', '_']).next().unwrap_or("");
    match primary {
        "en" => Some(Language::EnglishUS),
        "de" => Some(Language::German1996),
        "fr" => Some(Language::French),
        "es" => Some(Language::Spanish),
        "it" => Some(Language::Italian),
        "pt" => Some(Language::Portuguese),
        "nl" => Some(Language::Dutch),
        "sv" => Some(Language::Swedish),
        "da" => Some(Language::Danish),
        "fi" => Some(Language::Finnish),
        "nb" | "no" => Some(Language::NorwegianBokmal),
        "nn" => Some(Language::NorwegianNynorsk),
        "pl" => Some(Language::Polish),
        "cs" => Some(Language::Czech),
        "sk" => Some(Language::Slovak),
        "sl" => Some(Language::Slovenian),
        "hu" => Some(Language::Hungarian),
        "tr" => Some(Language::Turkish),
        "ru" => Some(Language::Russian),
        "uk" => Some(Language::Ukrainian),
        "ca" => Some(Language::Catalan),
        _ => None,
    }
}
