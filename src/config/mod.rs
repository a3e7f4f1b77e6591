//! Configuration resolution, parsing, validation, and defaults.

mod argv;
mod jsonc;
mod legacy;
mod vocab;

pub use argv::parse_argv;
pub use vocab::{build_speech_phrases, validate};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// The fully materialized runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub riva_grpc: String,
    pub riva_http: String,
    pub riva_health_path: String,
    pub audio: AudioConfig,
    pub paste: PasteConfig,
    pub asr: AsrConfig,
    pub transcript: TranscriptConfig,
    pub indicator: IndicatorConfig,
    pub clipboard: CommandConfig,
    pub paste_cmd: CommandConfig,
    pub vocab: VocabConfig,
    pub debug: DebugConfig,
}

/// Preferred and fallback input-source selection.
#[derive(Debug, Clone, Default)]
pub struct AudioConfig {
    pub input: String,
    pub fallback: String,
}

/// Post-commit paste behavior.
#[derive(Debug, Clone, Default)]
pub struct PasteConfig {
    pub enable: bool,
    pub shortcut: String,
}

/// Request-level hints passed to the recognizer.
#[derive(Debug, Clone, Default)]
pub struct AsrConfig {
    pub automatic_punctuation: bool,
    pub language_code: String,
    pub model: String,
}

/// Transcript assembly formatting.
#[derive(Debug, Clone, Copy, Default)]
pub struct TranscriptConfig {
    pub trailing_space: bool,
    pub capitalize_sentences: bool,
}

/// Visual indicator and audio cue behavior.
#[derive(Debug, Clone, Default)]
pub struct IndicatorConfig {
    pub enable: bool,
    pub backend: String,
    pub desktop_app_name: String,
    pub sound_enable: bool,
    pub height: i32,
    pub error_timeout_ms: i32,
}

/// A raw command string and its parsed argv form.
#[derive(Debug, Clone, Default)]
pub struct CommandConfig {
    pub raw: String,
    pub argv: Vec<String>,
}

/// Enabled speech phrase sets and dedupe limits.
#[derive(Debug, Clone, Default)]
pub struct VocabConfig {
    pub global_sets: Vec<String>,
    pub sets: std::collections::BTreeMap<String, VocabSet>,
    pub max_phrases: usize,
}

/// One named phrase group with a shared boost value.
#[derive(Debug, Clone, Default)]
pub struct VocabSet {
    pub name: String,
    pub boost: f64,
    pub phrases: Vec<String>,
}

/// Optional debug artifact output.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugConfig {
    pub audio_dump: bool,
    pub grpc_dump: bool,
}

/// A non-fatal parse/validation message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub line: Option<u32>,
    pub message: String,
}

impl Warning {
    pub fn new(message: impl Into<String>) -> Self {
        Warning {
            line: None,
            message: message.into(),
        }
    }
}

impl Default for Config {
    /// The canonical runtime configuration used when no file is present.
    fn default() -> Self {
        Config {
            riva_grpc: "127.0.0.1:50051".to_string(),
            riva_http: "127.0.0.1:9000".to_string(),
            riva_health_path: "/v1/health/ready".to_string(),
            audio: AudioConfig {
                input: "default".to_string(),
                fallback: "default".to_string(),
            },
            paste: PasteConfig {
                enable: true,
                shortcut: "CTRL,V".to_string(),
            },
            asr: AsrConfig {
                automatic_punctuation: true,
                language_code: "en-US".to_string(),
                model: String::new(),
            },
            transcript: TranscriptConfig {
                trailing_space: true,
                capitalize_sentences: true,
            },
            indicator: IndicatorConfig {
                enable: true,
                backend: "hypr".to_string(),
                desktop_app_name: "sotto-indicator".to_string(),
                sound_enable: true,
                height: 28,
                error_timeout_ms: 1600,
            },
            clipboard: CommandConfig {
                raw: "wl-copy --trim-newline".to_string(),
                argv: vec!["wl-copy".to_string(), "--trim-newline".to_string()],
            },
            paste_cmd: CommandConfig::default(),
            vocab: VocabConfig {
                global_sets: Vec::new(),
                sets: std::collections::BTreeMap::new(),
                max_phrases: 1024,
            },
            debug: DebugConfig::default(),
        }
    }
}

/// Resolved config path, parsed values, and non-fatal warnings.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub path: PathBuf,
    pub config: Config,
    pub warnings: Vec<Warning>,
    pub exists: bool,
}

/// Resolves, reads, parses, and validates the runtime configuration.
pub fn load(explicit: Option<&Path>) -> Result<Loaded> {
    let path = resolve_path(explicit)?;

    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let mut warnings = vec![Warning::new(format!(
                "config file {:?} not found; using defaults",
                path.display()
            ))];
            let config = Config::default();
            warnings.extend(validate(&config)?);
            return Ok(Loaded {
                path,
                config,
                warnings,
                exists: false,
            });
        }
        Err(err) => {
            return Err(err).with_context(|| format!("read config {}", path.display()));
        }
    };

    let (config, mut warnings) = parse(&content)
        .with_context(|| format!("parse config {}", path.display()))?;
    warnings.extend(validate(&config)?);

    Ok(Loaded {
        path,
        config,
        warnings,
        exists: true,
    })
}

/// Parses configuration content layered over the defaults.
///
/// JSONC is selected when the first non-whitespace character is `{`; anything
/// else goes through the deprecated key=value reader with a warning.
pub fn parse(content: &str) -> Result<(Config, Vec<Warning>)> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok((Config::default(), Vec::new()));
    }
    if trimmed.starts_with('{') {
        return jsonc::parse(content, Config::default());
    }

    let (cfg, mut warnings) = legacy::parse_legacy(content, Config::default())?;
    warnings.insert(0, Warning::new(legacy::LEGACY_FORMAT_WARNING));
    Ok((cfg, warnings))
}

/// Applies CLI/XDG/home fallback rules for the config file location.
pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if !path.as_os_str().is_empty() {
            return Ok(path.to_path_buf());
        }
    }

    let xdg = std::env::var("XDG_CONFIG_HOME").unwrap_or_default();
    let xdg = xdg.trim();
    if !xdg.is_empty() {
        return Ok(PathBuf::from(xdg).join("sotto").join("config.conf"));
    }

    let home = dirs::home_dir().context("unable to resolve user home for config fallback")?;
    Ok(home.join(".config").join("sotto").join("config.conf"))
}
