//! Transcript assembly: joins recognized segments and normalizes the text.

mod boundary;
mod pronoun;
mod sentence_case;

/// Controls transcript assembly formatting behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    pub trailing_space: bool,
    pub capitalize_sentences: bool,
}

/// Joins final ASR segments and applies configured normalization.
pub fn assemble(final_segments: &[String], opts: Options) -> String {
    if final_segments.is_empty() {
        return String::new();
    }

    let joined = final_segments.join(" ");
    let normalized = joined.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return String::new();
    }

    let mut text = normalized;
    if opts.capitalize_sentences {
        text = capitalize_sentences(&text);
    }

    if opts.trailing_space {
        text.push(' ');
    }
    text
}

fn capitalize_sentences(text: &str) -> String {
    let text = sentence_case::capitalize_sentence_starts(text);
    let text = pronoun::capitalize_pronoun_i_contractions(&text);
    pronoun::capitalize_standalone_pronoun_i(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn joins_and_collapses_whitespace() {
        let out = assemble(&segs(&["  hello ", "\tworld\n"]), Options::default());
        assert_eq!(out, "hello world");
    }

    #[test]
    fn empty_segments_produce_empty_transcript() {
        assert_eq!(assemble(&[], Options::default()), "");
        assert_eq!(assemble(&segs(&["   ", "\n"]), Options::default()), "");
    }

    #[test]
    fn sentence_case_with_trailing_space() {
        let out = assemble(
            &segs(&[" hello", "world.", "\nfrom", "sotto"]),
            Options {
                trailing_space: true,
                capitalize_sentences: true,
            },
        );
        assert_eq!(out, "Hello world. From sotto ");
    }

    #[test]
    fn capitalizes_after_exclamation_and_question() {
        let out = assemble(
            &segs(&["great! now what? keep going."]),
            Options {
                trailing_space: false,
                capitalize_sentences: true,
            },
        );
        assert_eq!(out, "Great! Now what? Keep going.");
    }

    #[test]
    fn pronoun_i_is_uppercased() {
        let out = assemble(
            &segs(&["i think i'll stay, i said."]),
            Options {
                trailing_space: false,
                capitalize_sentences: true,
            },
        );
        assert_eq!(out, "I think I'll stay, I said.");
    }

    #[test]
    fn known_abbreviations_do_not_break_sentences() {
        let out = assemble(
            &segs(&["see fig. three for details. next point."]),
            Options {
                trailing_space: false,
                capitalize_sentences: true,
            },
        );
        assert_eq!(out, "See fig. three for details. Next point.");
    }

    #[test]
    fn decimals_are_not_boundaries() {
        let out = assemble(
            &segs(&["the value is 3.5 percent. done."]),
            Options {
                trailing_space: false,
                capitalize_sentences: true,
            },
        );
        assert_eq!(out, "The value is 3.5 percent. Done.");
    }

    #[test]
    fn assemble_is_idempotent() {
        let opts = Options {
            trailing_space: true,
            capitalize_sentences: true,
        };
        let cases: &[&[&str]] = &[
            &[" hello", "world.", "from", "sotto"],
            &["i.e. we keep going. then i stopped"],
            &["met dr. smith at 3.5 km. she waved"],
            &["u.s. policy. however it changed"],
        ];
        for case in cases {
            let segments = segs(case);
            let once = assemble(&segments, opts);
            let twice = assemble(&[once.clone()], opts);
            assert_eq!(once, twice, "normalizing twice changed {case:?}");
        }
    }
}
