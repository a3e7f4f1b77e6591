//! Period classification: decides whether a `.` ends a sentence.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AbbreviationClass {
    /// Never terminal: titles, units, reference markers.
    NonTerminal,
    /// Terminal only when the following context strongly suggests it.
    Ambiguous,
}

fn abbreviation_class(token: &str) -> Option<AbbreviationClass> {
    match token {
        // Latin/editorial abbreviations.
        "e.g" | "i.e" | "cf" => Some(AbbreviationClass::NonTerminal),
        "etc" | "vs" => Some(AbbreviationClass::Ambiguous),
        // Titles/honorifics.
        "dr" | "mr" | "mrs" | "ms" | "prof" | "sr" | "jr" => Some(AbbreviationClass::NonTerminal),
        // Reference markers.
        "ch" | "eq" | "fig" | "ref" | "sec" => Some(AbbreviationClass::NonTerminal),
        // Units/time abbreviations frequently used in dictation.
        "hr" | "hrs" | "lb" | "lbs" | "min" | "mins" | "oz" | "tbsp" | "tsp" => {
            Some(AbbreviationClass::NonTerminal)
        }
        _ => None,
    }
}

/// Abbreviations that should stay lowercase even at sentence starts.
pub(crate) fn is_lowercase_sentence_abbreviation(token: &str) -> bool {
    matches!(token, "e.g" | "etc" | "i.e" | "vs")
}

/// Lowercase words that strongly indicate a sentence boundary after ambiguous
/// abbreviations/initialisms in ASR text. Intentionally narrow to avoid false
/// positives like `etc. and` or `u.s. and`.
fn is_lowercase_boundary_promoter(word: &str) -> bool {
    matches!(
        word,
        "finally" | "however" | "meanwhile" | "next" | "then" | "therefore"
    )
}

fn is_lowercase_pronoun_boundary_promoter(word: &str) -> bool {
    matches!(word, "he" | "i" | "it" | "she" | "they" | "we" | "you")
}

fn is_locative_preposition(word: &str) -> bool {
    matches!(
        word,
        "across"
            | "around"
            | "at"
            | "from"
            | "in"
            | "inside"
            | "near"
            | "outside"
            | "through"
            | "throughout"
            | "to"
            | "within"
    )
}

fn is_article_word(word: &str) -> bool {
    matches!(word, "a" | "an" | "the")
}

/// Closing punctuation that may sit between a terminator and the next word.
pub(crate) fn is_sentence_prefix_char(c: char) -> bool {
    matches!(c, ')' | ']' | '}' | '\'' | '"' | '’' | '”')
}

pub(crate) fn is_sentence_boundary_period(chars: &[char], idx: usize) -> bool {
    if idx >= chars.len() || chars[idx] != '.' {
        return false;
    }

    if is_decimal_period(chars, idx) {
        return false;
    }
    if is_embedded_period_token(chars, idx) {
        return false;
    }

    let token = token_before_period(chars, idx).to_lowercase();
    if token.is_empty() {
        return true;
    }

    match abbreviation_class(&token) {
        Some(AbbreviationClass::NonTerminal) => return false,
        Some(AbbreviationClass::Ambiguous) => {
            return should_treat_abbreviation_as_boundary(chars, idx, &token);
        }
        None => {}
    }

    if looks_like_initialism_token(&token) {
        return should_treat_abbreviation_as_boundary(chars, idx, &token);
    }

    true
}

fn is_decimal_period(chars: &[char], idx: usize) -> bool {
    if idx == 0 || idx + 1 >= chars.len() {
        return false;
    }
    chars[idx - 1].is_ascii_digit() && chars[idx + 1].is_ascii_digit()
}

fn is_embedded_period_token(chars: &[char], idx: usize) -> bool {
    match chars.get(idx + 1) {
        Some(&next) => next.is_alphanumeric() || next == '.',
        None => false,
    }
}

fn should_treat_abbreviation_as_boundary(chars: &[char], idx: usize, token: &str) -> bool {
    let next_word_start = match next_sentence_word_start(chars, idx + 1) {
        Some(start) => start,
        None => return true,
    };
    if chars[next_word_start].is_uppercase() {
        return true;
    }

    let next_word = word_from_index(chars, next_word_start).to_lowercase();
    if is_lowercase_boundary_promoter(&next_word) {
        return true;
    }
    if !is_lowercase_pronoun_boundary_promoter(&next_word) {
        return false;
    }
    if looks_like_initialism_token(token) && is_likely_locative_initialism_continuation(chars, idx)
    {
        return false;
    }
    true
}

fn word_from_index(chars: &[char], idx: usize) -> String {
    chars[idx..]
        .iter()
        .take_while(|c| c.is_alphabetic())
        .collect()
}

/// The start of the next word after `start`, skipping whitespace and closing
/// punctuation. `None` when a non-letter blocks the scan or input ends.
fn next_sentence_word_start(chars: &[char], start: usize) -> Option<usize> {
    for (offset, &c) in chars[start.min(chars.len())..].iter().enumerate() {
        if c.is_whitespace() || is_sentence_prefix_char(c) {
            continue;
        }
        if c.is_alphabetic() {
            return Some(start + offset);
        }
        return None;
    }
    None
}

/// `u.s. navy` after `in the` reads as a location, not a sentence break.
fn is_likely_locative_initialism_continuation(chars: &[char], idx: usize) -> bool {
    let token_start = match token_start_before(chars, idx) {
        Some(start) => start,
        None => return false,
    };

    let (prev_word, prev_start) = match previous_word_before_index(chars, token_start) {
        Some(found) => found,
        None => return false,
    };
    if is_locative_preposition(&prev_word) {
        return is_sentence_leading_word(chars, prev_start);
    }

    if !is_article_word(&prev_word) || prev_start == 0 {
        return false;
    }

    let (preposition, preposition_start) = match previous_word_before_index(chars, prev_start) {
        Some(found) => found,
        None => return false,
    };
    if !is_locative_preposition(&preposition) {
        return false;
    }
    is_sentence_leading_word(chars, preposition_start)
}

fn token_start_before(chars: &[char], idx: usize) -> Option<usize> {
    if idx == 0 || idx >= chars.len() {
        return None;
    }

    let mut start = idx;
    while start > 0 {
        let c = chars[start - 1];
        if c.is_alphabetic() || c == '.' {
            start -= 1;
            continue;
        }
        break;
    }
    Some(start)
}

fn previous_word_before_index(chars: &[char], idx: usize) -> Option<(String, usize)> {
    if idx == 0 || idx > chars.len() {
        return None;
    }

    let mut i = idx;
    while i > 0 && !chars[i - 1].is_alphabetic() {
        i -= 1;
    }
    if i == 0 {
        return None;
    }

    let end = i;
    while i > 0 && chars[i - 1].is_alphabetic() {
        i -= 1;
    }
    let word: String = chars[i..end].iter().collect();
    Some((word.to_lowercase(), i))
}

fn is_sentence_leading_word(chars: &[char], word_start: usize) -> bool {
    if word_start == 0 {
        return true;
    }

    let mut i = word_start;
    while i > 0 {
        let c = chars[i - 1];
        if c.is_whitespace() || is_sentence_prefix_char(c) {
            i -= 1;
            continue;
        }
        break;
    }

    if i == 0 {
        return true;
    }
    matches!(chars[i - 1], '.' | '!' | '?')
}

fn token_before_period(chars: &[char], idx: usize) -> String {
    if idx == 0 || idx >= chars.len() {
        return String::new();
    }

    let mut start = idx;
    while start > 0 {
        let c = chars[start - 1];
        if c.is_alphabetic() || c == '.' {
            start -= 1;
            continue;
        }
        break;
    }

    let token: String = chars[start..idx].iter().collect();
    token.trim_matches('.').to_string()
}

/// `X.Y(.Z)*` tokens with single-letter parts, e.g. `u.s` or `p.m`.
fn looks_like_initialism_token(token: &str) -> bool {
    if !token.contains('.') {
        return false;
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() < 2 {
        return false;
    }

    parts.iter().all(|part| {
        let mut chars = part.chars();
        matches!((chars.next(), chars.next()), (Some(c), None) if c.is_alphabetic())
    })
}
