//! Sentence-start capitalization over normalized transcript text.

use super::boundary::{
    is_lowercase_sentence_abbreviation, is_sentence_boundary_period, is_sentence_prefix_char,
};

pub(crate) fn capitalize_sentence_starts(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());

    let mut capitalize_start = true;
    let mut pending_boundary = false;
    let mut saw_whitespace_after_boundary = false;

    for (i, &orig) in chars.iter().enumerate() {
        let mut c = orig;

        if capitalize_start && c.is_alphabetic() {
            if should_capitalize_word_at(&chars, i) {
                c = upper(c);
            }
            capitalize_start = false;
            pending_boundary = false;
            saw_whitespace_after_boundary = false;
        } else if pending_boundary {
            if c.is_whitespace() {
                saw_whitespace_after_boundary = true;
            } else if c.is_alphabetic() {
                if saw_whitespace_after_boundary && should_capitalize_word_at(&chars, i) {
                    c = upper(c);
                }
                pending_boundary = false;
                saw_whitespace_after_boundary = false;
            } else if c.is_numeric() {
                pending_boundary = false;
                saw_whitespace_after_boundary = false;
            } else if is_sentence_prefix_char(c) {
                // Keep waiting for a letter. This supports punctuation like: . "quote"
            } else if !saw_whitespace_after_boundary {
                pending_boundary = false;
                saw_whitespace_after_boundary = false;
            }
        }

        out.push(c);

        match orig {
            '.' => {
                pending_boundary = is_sentence_boundary_period(&chars, i);
                saw_whitespace_after_boundary = false;
            }
            '!' | '?' => {
                pending_boundary = true;
                saw_whitespace_after_boundary = false;
            }
            _ => {}
        }
    }

    out
}

fn upper(c: char) -> char {
    c.to_uppercase().next().unwrap_or(c)
}

fn should_capitalize_word_at(chars: &[char], idx: usize) -> bool {
    let token = word_token_from_index(chars, idx)
        .trim_matches('.')
        .to_lowercase();
    if token.is_empty() {
        return true;
    }
    !is_lowercase_sentence_abbreviation(&token)
}

fn word_token_from_index(chars: &[char], idx: usize) -> String {
    chars[idx.min(chars.len())..]
        .iter()
        .take_while(|&&c| c.is_alphabetic() || c == '.')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capitalizes_first_word() {
        assert_eq!(capitalize_sentence_starts("hello there"), "Hello there");
    }

    #[test]
    fn capitalizes_after_each_boundary() {
        assert_eq!(
            capitalize_sentence_starts("one. two! three? four"),
            "One. Two! Three? Four"
        );
    }

    #[test]
    fn keeps_leading_abbreviation_lowercase() {
        assert_eq!(
            capitalize_sentence_starts("e.g. apples are fine"),
            "e.g. apples are fine"
        );
    }

    #[test]
    fn supports_quoted_sentence_starts() {
        assert_eq!(
            capitalize_sentence_starts("he said. \"quote me\""),
            "He said. \"Quote me\""
        );
    }

    #[test]
    fn digits_absorb_the_boundary() {
        assert_eq!(
            capitalize_sentence_starts("stop. 42 was the answer"),
            "Stop. 42 was the answer"
        );
    }
}
