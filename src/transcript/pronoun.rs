//! Uppercasing of the standalone pronoun "i" and its contractions.

use once_cell::sync::Lazy;
use regex::Regex;

static PRONOUN_I_CONTRACTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bi['’](?:m|d|ll|ve|re|s)\b").expect("contraction pattern"));

static PRONOUN_I_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bi\b").expect("pronoun pattern"));

pub(crate) fn capitalize_pronoun_i_contractions(text: &str) -> String {
    PRONOUN_I_CONTRACTION
        .replace_all(text, |caps: &regex::Captures<'_>| {
            // "i" is a single byte; keep the apostrophe and suffix untouched.
            format!("I{}", &caps[0][1..])
        })
        .into_owned()
}

pub(crate) fn capitalize_standalone_pronoun_i(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for m in PRONOUN_I_WORD.find_iter(text) {
        out.push_str(&text[last..m.start()]);
        if should_skip_capitalization(text, m.start(), m.end()) {
            out.push_str(m.as_str());
        } else {
            out.push('I');
        }
        last = m.end();
    }

    out.push_str(&text[last..]);
    out
}

/// Leaves "i" alone inside abbreviation-like contexts such as `i.e.` where a
/// period sits immediately before or after the match.
fn should_skip_capitalization(text: &str, start: usize, end: usize) -> bool {
    let bytes = text.as_bytes();

    if end + 1 < text.len() && bytes[end] == b'.' {
        if let Some(next) = text[end + 1..].chars().next() {
            if next.is_alphabetic() {
                return true;
            }
        }
    }

    if start > 1 && bytes[start - 1] == b'.' && end < text.len() && bytes[end] == b'.' {
        if let Some(prev) = text[..start - 1].chars().next_back() {
            if prev.is_alphabetic() {
                return true;
            }
        }
    }

    false
}
