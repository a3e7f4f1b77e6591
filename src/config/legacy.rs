//! Legacy `key = value` config parsing, kept for existing installs.

use anyhow::{bail, Context, Result};

use super::{parse_argv, CommandConfig, Config, Warning};

pub(super) const LEGACY_FORMAT_WARNING: &str =
    "legacy key=value config format is deprecated; migrate to JSONC";

/// Parses the pre-JSONC line format: one `key = value` per line, `#`
/// comments, dotted keys addressing nested sections.
pub(super) fn parse_legacy(content: &str, base: Config) -> Result<(Config, Vec<Warning>)> {
    let mut cfg = base;
    let mut warnings = Vec::new();

    for (index, raw_line) in content.lines().enumerate() {
        let line_no = (index + 1) as u32;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let (key, value) = match line.split_once('=') {
            Some(split) => split,
            None => {
                warnings.push(Warning {
                    line: Some(line_no),
                    message: format!("ignoring malformed line {line:?} (expected key = value)"),
                });
                continue;
            }
        };
        let key = key.trim().to_lowercase();
        let value = unquote(value.trim());

        match key.as_str() {
            "riva_grpc" => cfg.riva_grpc = value.to_string(),
            "riva_http" => cfg.riva_http = value.to_string(),
            "riva_health_path" => cfg.riva_health_path = value.to_string(),
            "audio.input" => cfg.audio.input = value.to_string(),
            "audio.fallback" => cfg.audio.fallback = value.to_string(),
            "paste.enable" => cfg.paste.enable = parse_bool(value, line_no, &key)?,
            "paste.shortcut" => cfg.paste.shortcut = value.to_string(),
            "asr.automatic_punctuation" => {
                cfg.asr.automatic_punctuation = parse_bool(value, line_no, &key)?
            }
            "asr.language_code" => cfg.asr.language_code = value.to_string(),
            "asr.model" => cfg.asr.model = value.to_string(),
            "transcript.trailing_space" => {
                cfg.transcript.trailing_space = parse_bool(value, line_no, &key)?
            }
            "transcript.capitalize_sentences" => {
                cfg.transcript.capitalize_sentences = parse_bool(value, line_no, &key)?
            }
            "indicator.enable" => cfg.indicator.enable = parse_bool(value, line_no, &key)?,
            "indicator.backend" => cfg.indicator.backend = value.to_string(),
            "indicator.desktop_app_name" => {
                cfg.indicator.desktop_app_name = value.to_string()
            }
            "indicator.sound_enable" => {
                cfg.indicator.sound_enable = parse_bool(value, line_no, &key)?
            }
            "indicator.height" => cfg.indicator.height = parse_int(value, line_no, &key)?,
            "indicator.error_timeout_ms" => {
                cfg.indicator.error_timeout_ms = parse_int(value, line_no, &key)?
            }
            "clipboard_cmd" => {
                let argv = parse_argv(value)
                    .with_context(|| format!("line {line_no}: invalid clipboard_cmd"))?;
                cfg.clipboard = CommandConfig {
                    raw: value.to_string(),
                    argv,
                };
            }
            "paste_cmd" => {
                let argv = parse_argv(value)
                    .with_context(|| format!("line {line_no}: invalid paste_cmd"))?;
                cfg.paste_cmd = CommandConfig {
                    raw: value.to_string(),
                    argv,
                };
            }
            "debug.audio_dump" => cfg.debug.audio_dump = parse_bool(value, line_no, &key)?,
            "debug.grpc_dump" => cfg.debug.grpc_dump = parse_bool(value, line_no, &key)?,
            unknown => warnings.push(Warning {
                line: Some(line_no),
                message: format!("unknown key {unknown:?}"),
            }),
        }
    }

    Ok((cfg, warnings))
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn parse_bool(value: &str, line_no: u32, key: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => bail!("line {line_no}: {key} expects a boolean, got {value:?}"),
    }
}

fn parse_int(value: &str, line_no: u32, key: &str) -> Result<i32> {
    value
        .parse::<i32>()
        .with_context(|| format!("line {line_no}: {key} expects an integer, got {value:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> (Config, Vec<Warning>) {
        parse_legacy(content, Config::default()).unwrap()
    }

    #[test]
    fn parses_flat_and_dotted_keys() {
        let (cfg, warnings) = parse(
            "riva_grpc = 127.0.0.1:50051\n\
             paste.enable = false\n\
             audio.input = elgato\n",
        );
        assert_eq!(cfg.riva_grpc, "127.0.0.1:50051");
        assert!(!cfg.paste.enable);
        assert_eq!(cfg.audio.input, "elgato");
        assert!(warnings.is_empty());
    }

    #[test]
    fn quoted_values_are_unwrapped() {
        let (cfg, _) = parse("paste.shortcut = \"SUPER,V\"\n");
        assert_eq!(cfg.paste.shortcut, "SUPER,V");
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let (cfg, warnings) = parse("# endpoints\n\nriva_http = 127.0.0.1:9000\n");
        assert_eq!(cfg.riva_http, "127.0.0.1:9000");
        assert!(warnings.is_empty());
    }

    #[test]
    fn unknown_keys_warn_with_line_numbers() {
        let (_, warnings) = parse("riva_grpc = x\nshout = loud\n");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].line, Some(2));
        assert!(warnings[0].message.contains("shout"));
    }

    #[test]
    fn malformed_lines_warn_and_are_skipped() {
        let (cfg, warnings) = parse("just some words\nriva_grpc = ok\n");
        assert_eq!(cfg.riva_grpc, "ok");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].line, Some(1));
    }

    #[test]
    fn bad_boolean_is_an_error() {
        let err = parse_legacy("paste.enable = maybe\n", Config::default()).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn bad_integer_is_an_error() {
        let err = parse_legacy("indicator.height = tall\n", Config::default()).unwrap_err();
        assert!(err.to_string().contains("indicator.height"));
    }

    #[test]
    fn command_values_are_argv_parsed() {
        let (cfg, _) = parse("clipboard_cmd = xclip -selection clipboard\n");
        assert_eq!(cfg.clipboard.argv, vec!["xclip", "-selection", "clipboard"]);
    }
}
