// Corpus preparation: cleaning, unit segmentation and the printable byte mapping
// used to store byte symbols as JSON keys.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// GPT-2 byte to visible unicode mapping. Printable bytes map to themselves, the
// rest are shifted past U+0100 so every byte has a single visible char.
pub(crate) fn bytes_char() -> HashMap<u8, char> {
    let mut bs: Vec<u8> = vec![];
    bs.extend(b'!'..=b'~');
    bs.extend(b'\xA1'..=b'\xAC');
    bs.extend(b'\xAE'..=b'\xFF');

    let mut cs: Vec<u32> = bs.iter().map(|i| *i as u32).collect();

    let mut n = 0;
    for b in 0..=255u8 {
        if !bs.contains(&b) {
            bs.push(b);
            cs.push(256 + n);
            n += 1;
        }
    }

    bs.into_iter()
        .zip(cs)
        .filter_map(|(f, t)| std::char::from_u32(t).map(|ch| (f, ch)))
        .collect()
}

static BYTES_CHAR: LazyLock<HashMap<u8, char>> = LazyLock::new(bytes_char);

static CHAR_BYTES: LazyLock<HashMap<char, u8>> =
    LazyLock::new(|| BYTES_CHAR.iter().map(|(&b, &c)| (c, b)).collect());

// Both patterns are static; failing to compile them is a programming error.
static SEPARATOR_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-=—_]{3,}$").unwrap());

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Printable key for a single byte symbol.
pub fn byte_to_key(byte: u8) -> String {
    BYTES_CHAR
        .get(&byte)
        .map(|c| c.to_string())
        .unwrap_or_else(|| char::REPLACEMENT_CHARACTER.to_string())
}

/// Inverse of [`byte_to_key`]. `None` for anything that is not exactly one mapped char.
pub fn key_to_byte(key: &str) -> Option<u8> {
    let mut chars = key.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => CHAR_BYTES.get(&c).copied(),
        _ => None,
    }
}

/// How the corpus is cut into training units. Pairs never span two units.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Segmentation {
    /// The whole corpus is a single stream.
    #[default]
    Corpus,
    /// Every non-empty line (trimmed) is a unit.
    Lines,
}

impl Segmentation {
    /// Splits `text` into units, keeping at most `max_units` of them.
    pub fn split<'a>(&self, text: &'a str, max_units: Option<usize>) -> Vec<&'a str> {
        let units: Box<dyn Iterator<Item = &'a str> + 'a> = match self {
            Segmentation::Corpus => Box::new(std::iter::once(text).filter(|t| !t.is_empty())),
            Segmentation::Lines => Box::new(
                text.lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty()),
            ),
        };
        match max_units {
            Some(limit) => units.take(limit).collect(),
            None => units.collect(),
        }
    }
}

/// Normalises line endings, drops separator rules such as `-----`, squeezes
/// whitespace runs inside a line and collapses consecutive blank lines.
pub fn clean_corpus(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut out: Vec<String> = Vec::new();
    let mut previous_blank = false;
    for line in normalized.split('\n') {
        let raw = line.trim();
        if raw.is_empty() {
            if !previous_blank {
                out.push(String::new());
            }
            previous_blank = true;
            continue;
        }
        if SEPARATOR_LINE.is_match(raw) {
            continue;
        }
        out.push(WHITESPACE_RUN.replace_all(raw, " ").into_owned());
        previous_blank = false;
    }

    let joined = out.join("\n");
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_keys_are_a_bijection() {
        let mut seen = std::collections::HashSet::new();
        for b in 0..=255u8 {
            let key = byte_to_key(b);
            assert_eq!(key.chars().count(), 1);
            assert!(seen.insert(key.clone()));
            assert_eq!(key_to_byte(&key), Some(b));
        }
        assert_eq!(byte_to_key(b'a'), "a");
        assert_eq!(byte_to_key(b' '), "Ġ");
        assert_eq!(key_to_byte("ab"), None);
        assert_eq!(key_to_byte(""), None);
    }

    #[test]
    fn lines_segmentation_skips_blank_lines() {
        let units = Segmentation::Lines.split("  one \n\n two\nthree  \n", None);
        assert_eq!(units, vec!["one", "two", "three"]);
        let units = Segmentation::Lines.split("a\nb\nc", Some(2));
        assert_eq!(units, vec!["a", "b"]);
    }

    #[test]
    fn corpus_segmentation_keeps_text_intact() {
        assert_eq!(Segmentation::Corpus.split(" a b\n", None), vec![" a b\n"]);
        assert!(Segmentation::Corpus.split("", None).is_empty());
    }

    #[test]
    fn cleaning_removes_noise() {
        let dirty = "Title\r\n-----\r\n\r\n\r\nfirst   line\there\n\n\n  last  ";
        assert_eq!(clean_corpus(dirty), "Title\n\nfirst line here\n\nlast\n");
        assert_eq!(clean_corpus(" \n \n"), "");
    }
}
