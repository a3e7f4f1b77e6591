//! JSONC parsing: comment/trailing-comma stripping plus an overlay decode.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use super::{parse_argv, CommandConfig, Config, VocabSet, Warning};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Overlay {
    riva: Option<RivaOverlay>,
    audio: Option<AudioOverlay>,
    paste: Option<PasteOverlay>,
    asr: Option<AsrOverlay>,
    transcript: Option<TranscriptOverlay>,
    indicator: Option<IndicatorOverlay>,
    clipboard_cmd: Option<String>,
    paste_cmd: Option<String>,
    vocab: Option<VocabOverlay>,
    debug: Option<DebugOverlay>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RivaOverlay {
    grpc: Option<String>,
    http: Option<String>,
    health_path: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AudioOverlay {
    input: Option<String>,
    fallback: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PasteOverlay {
    enable: Option<bool>,
    shortcut: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AsrOverlay {
    automatic_punctuation: Option<bool>,
    language_code: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TranscriptOverlay {
    trailing_space: Option<bool>,
    capitalize_sentences: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct IndicatorOverlay {
    enable: Option<bool>,
    backend: Option<String>,
    desktop_app_name: Option<String>,
    sound_enable: Option<bool>,
    height: Option<i32>,
    error_timeout_ms: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct VocabOverlay {
    global: Option<StringList>,
    max_phrases: Option<usize>,
    sets: Option<BTreeMap<String, VocabSetOverlay>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct VocabSetOverlay {
    boost: Option<f64>,
    #[serde(default)]
    phrases: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DebugOverlay {
    audio_dump: Option<bool>,
    grpc_dump: Option<bool>,
}

/// A string array, or a comma-delimited string for hand-written configs.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringList {
    List(Vec<String>),
    CommaDelimited(String),
}

impl StringList {
    fn into_vec(self) -> Vec<String> {
        match self {
            StringList::List(items) => items,
            StringList::CommaDelimited(joined) => joined
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Decodes JSONC `content` layered over `base`.
pub(super) fn parse(content: &str, base: Config) -> Result<(Config, Vec<Warning>)> {
    let normalized = normalize(content)?;
    let overlay: Overlay =
        serde_json::from_str(&normalized).context("decode JSONC config")?;

    let mut cfg = base;
    let warnings = apply(overlay, &mut cfg)?;
    Ok((cfg, warnings))
}

fn apply(overlay: Overlay, cfg: &mut Config) -> Result<Vec<Warning>> {
    let warnings = Vec::new();

    if let Some(riva) = overlay.riva {
        if let Some(grpc) = riva.grpc {
            cfg.riva_grpc = grpc;
        }
        if let Some(http) = riva.http {
            cfg.riva_http = http;
        }
        if let Some(health_path) = riva.health_path {
            cfg.riva_health_path = health_path;
        }
    }

    if let Some(audio) = overlay.audio {
        if let Some(input) = audio.input {
            cfg.audio.input = input;
        }
        if let Some(fallback) = audio.fallback {
            cfg.audio.fallback = fallback;
        }
    }

    if let Some(paste) = overlay.paste {
        if let Some(enable) = paste.enable {
            cfg.paste.enable = enable;
        }
        if let Some(shortcut) = paste.shortcut {
            cfg.paste.shortcut = shortcut.trim().to_string();
        }
    }

    if let Some(asr) = overlay.asr {
        if let Some(automatic_punctuation) = asr.automatic_punctuation {
            cfg.asr.automatic_punctuation = automatic_punctuation;
        }
        if let Some(language_code) = asr.language_code {
            cfg.asr.language_code = language_code;
        }
        if let Some(model) = asr.model {
            cfg.asr.model = model;
        }
    }

    if let Some(transcript) = overlay.transcript {
        if let Some(trailing_space) = transcript.trailing_space {
            cfg.transcript.trailing_space = trailing_space;
        }
        if let Some(capitalize_sentences) = transcript.capitalize_sentences {
            cfg.transcript.capitalize_sentences = capitalize_sentences;
        }
    }

    if let Some(indicator) = overlay.indicator {
        if let Some(enable) = indicator.enable {
            cfg.indicator.enable = enable;
        }
        if let Some(backend) = indicator.backend {
            cfg.indicator.backend = backend.trim().to_string();
        }
        if let Some(desktop_app_name) = indicator.desktop_app_name {
            cfg.indicator.desktop_app_name = desktop_app_name.trim().to_string();
        }
        if let Some(sound_enable) = indicator.sound_enable {
            cfg.indicator.sound_enable = sound_enable;
        }
        if let Some(height) = indicator.height {
            cfg.indicator.height = height;
        }
        if let Some(error_timeout_ms) = indicator.error_timeout_ms {
            cfg.indicator.error_timeout_ms = error_timeout_ms;
        }
    }

    if let Some(raw) = overlay.clipboard_cmd {
        let argv = parse_argv(&raw).context("invalid clipboard_cmd")?;
        cfg.clipboard = CommandConfig { raw, argv };
    }

    if let Some(raw) = overlay.paste_cmd {
        let argv = parse_argv(&raw).context("invalid paste_cmd")?;
        cfg.paste_cmd = CommandConfig { raw, argv };
    }

    if let Some(vocab) = overlay.vocab {
        if let Some(global) = vocab.global {
            cfg.vocab.global_sets = global
                .into_vec()
                .into_iter()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect();
        }
        if let Some(max_phrases) = vocab.max_phrases {
            cfg.vocab.max_phrases = max_phrases;
        }
        if let Some(sets) = vocab.sets {
            for (name, set) in sets {
                let name = name.trim().to_string();
                if name.is_empty() {
                    bail!("vocab.sets contains an empty set name");
                }
                cfg.vocab.sets.insert(
                    name.clone(),
                    VocabSet {
                        name,
                        boost: set.boost.unwrap_or_default(),
                        phrases: set.phrases,
                    },
                );
            }
        }
    }

    if let Some(debug) = overlay.debug {
        if let Some(audio_dump) = debug.audio_dump {
            cfg.debug.audio_dump = audio_dump;
        }
        if let Some(grpc_dump) = debug.grpc_dump {
            cfg.debug.grpc_dump = grpc_dump;
        }
    }

    Ok(warnings)
}

/// Strips comments and trailing commas while preserving line structure, so
/// decode errors still point at the author's line and column.
fn normalize(content: &str) -> Result<String> {
    let without_comments = strip_comments(content)?;
    Ok(strip_trailing_commas(&without_comments))
}

fn strip_comments(content: &str) -> Result<String> {
    let bytes = content.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());

    let mut in_string = false;
    let mut escape = false;
    let mut line_comment = false;
    let mut block_comment = false;

    let mut i = 0;
    while i < bytes.len() {
        let ch = bytes[i];

        if line_comment {
            if ch == b'\n' || ch == b'\r' {
                line_comment = false;
                out.push(ch);
            } else {
                out.push(b' ');
            }
            i += 1;
            continue;
        }

        if block_comment {
            if ch == b'*' && bytes.get(i + 1) == Some(&b'/') {
                block_comment = false;
                out.extend_from_slice(b"  ");
                i += 2;
                continue;
            }
            if ch == b'\n' || ch == b'\r' || ch == b'\t' {
                out.push(ch);
            } else {
                out.push(b' ');
            }
            i += 1;
            continue;
        }

        if in_string {
            out.push(ch);
            if escape {
                escape = false;
            } else if ch == b'\\' {
                escape = true;
            } else if ch == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }

        if ch == b'"' {
            in_string = true;
            out.push(ch);
            i += 1;
            continue;
        }

        if ch == b'/' {
            match bytes.get(i + 1) {
                Some(&b'/') => {
                    line_comment = true;
                    out.extend_from_slice(b"  ");
                    i += 2;
                    continue;
                }
                Some(&b'*') => {
                    block_comment = true;
                    out.extend_from_slice(b"  ");
                    i += 2;
                    continue;
                }
                _ => {}
            }
        }

        out.push(ch);
        i += 1;
    }

    if block_comment {
        bail!("unterminated block comment in JSONC");
    }

    // Comments were replaced byte-for-byte with spaces; multi-byte UTF-8 only
    // ever passes through untouched.
    String::from_utf8(out).context("normalize JSONC content")
}

fn strip_trailing_commas(content: &str) -> String {
    let bytes = content.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());

    let mut in_string = false;
    let mut escape = false;

    for (i, &ch) in bytes.iter().enumerate() {
        if in_string {
            out.push(ch);
            if escape {
                escape = false;
            } else if ch == b'\\' {
                escape = true;
            } else if ch == b'"' {
                in_string = false;
            }
            continue;
        }

        if ch == b'"' {
            in_string = true;
            out.push(ch);
            continue;
        }

        if ch == b',' {
            let mut j = i + 1;
            while j < bytes.len() && matches!(bytes[j], b' ' | b'\n' | b'\r' | b'\t') {
                j += 1;
            }
            if j < bytes.len() && (bytes[j] == b'}' || bytes[j] == b']') {
                continue;
            }
        }

        out.push(ch);
    }

    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(content: &str) -> Result<(Config, Vec<Warning>)> {
        parse(content, Config::default())
    }

    #[test]
    fn overlay_overrides_only_named_fields() {
        let (cfg, _) = parse_str(
            r#"{
                "riva": { "grpc": "10.0.0.5:50051" },
                "audio": { "input": "usb" }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.riva_grpc, "10.0.0.5:50051");
        assert_eq!(cfg.riva_http, "127.0.0.1:9000");
        assert_eq!(cfg.audio.input, "usb");
        assert_eq!(cfg.audio.fallback, "default");
    }

    #[test]
    fn comments_and_trailing_commas_are_tolerated() {
        let (cfg, _) = parse_str(
            r#"{
                // recognizer endpoint
                "riva": {
                    "grpc": "localhost:50051", /* inline */
                },
                "transcript": { "trailing_space": false, },
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.riva_grpc, "localhost:50051");
        assert!(!cfg.transcript.trailing_space);
    }

    #[test]
    fn slashes_inside_strings_are_preserved() {
        let (cfg, _) = parse_str(r#"{ "riva": { "health_path": "/v1/health//ready" } }"#).unwrap();
        assert_eq!(cfg.riva_health_path, "/v1/health//ready");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = parse_str(r#"{ "rivaa": {} }"#).unwrap_err();
        assert!(err.to_string().contains("decode JSONC config"));
    }

    #[test]
    fn unterminated_block_comment_is_an_error() {
        assert!(parse_str("{ /* open").is_err());
    }

    #[test]
    fn clipboard_cmd_is_parsed_into_argv() {
        let (cfg, _) =
            parse_str(r#"{ "clipboard_cmd": "xclip -selection 'clip board'" }"#).unwrap();
        assert_eq!(cfg.clipboard.argv, vec!["xclip", "-selection", "clip board"]);
    }

    #[test]
    fn vocab_global_accepts_comma_delimited_string() {
        let (cfg, _) = parse_str(
            r#"{ "vocab": { "global": "dev, infra", "sets": {
                "dev": { "boost": 4.0, "phrases": ["kubernetes"] },
                "infra": { "phrases": ["terraform"] }
            } } }"#,
        )
        .unwrap();
        assert_eq!(cfg.vocab.global_sets, vec!["dev", "infra"]);
        assert_eq!(cfg.vocab.sets["dev"].boost, 4.0);
        assert_eq!(cfg.vocab.sets["infra"].phrases, vec!["terraform"]);
    }

    #[test]
    fn empty_vocab_set_name_is_an_error() {
        let err = parse_str(r#"{ "vocab": { "sets": { "  ": { "phrases": [] } } } }"#).unwrap_err();
        assert!(err.to_string().contains("empty set name"));
    }

    #[test]
    fn debug_flags_overlay() {
        let (cfg, _) =
            parse_str(r#"{ "debug": { "audio_dump": true, "grpc_dump": true } }"#).unwrap();
        assert!(cfg.debug.audio_dump);
        assert!(cfg.debug.grpc_dump);
    }
}
