//! Config validation and speech-phrase planning.

use std::collections::BTreeMap;

use anyhow::{bail, Result};

use crate::asr::SpeechPhrase;

use super::{Config, Warning};

/// Enforces config invariants and returns non-fatal warnings.
pub fn validate(cfg: &Config) -> Result<Vec<Warning>> {
    if cfg.riva_grpc.trim().is_empty() {
        bail!("riva.grpc must not be empty");
    }
    if cfg.riva_http.trim().is_empty() {
        bail!("riva.http must not be empty");
    }
    let health_path = cfg.riva_health_path.trim();
    if health_path.is_empty() {
        bail!("riva.health_path must not be empty");
    }
    if !health_path.starts_with('/') {
        bail!("riva.health_path must start with '/'");
    }
    if cfg.asr.language_code.trim().is_empty() {
        bail!("asr.language_code must not be empty");
    }

    let backend = cfg.indicator.backend.trim().to_lowercase();
    if backend.is_empty() {
        bail!("indicator.backend must not be empty");
    }
    if backend != "hypr" && backend != "desktop" {
        bail!("indicator.backend must be one of: hypr, desktop");
    }
    if backend == "desktop" && cfg.indicator.desktop_app_name.trim().is_empty() {
        bail!("indicator.desktop_app_name must not be empty when indicator.backend=desktop");
    }
    if cfg.indicator.height <= 0 {
        bail!("indicator.height must be > 0");
    }
    if cfg.indicator.error_timeout_ms < 0 {
        bail!("indicator.error_timeout_ms must be >= 0");
    }
    if cfg.vocab.max_phrases == 0 {
        bail!("vocab.max_phrases must be > 0");
    }
    if cfg.clipboard.argv.is_empty() {
        bail!("clipboard_cmd must not be empty");
    }

    if cfg.paste.enable && !cfg.paste_cmd.raw.is_empty() && cfg.paste_cmd.argv.is_empty() {
        bail!("paste_cmd is configured but empty");
    }
    if cfg.paste.enable && cfg.paste_cmd.argv.is_empty() && cfg.paste.shortcut.trim().is_empty() {
        bail!("paste.shortcut must not be empty when paste.enable=true and paste_cmd is unset");
    }

    let (_, warnings) = build_speech_phrases(cfg)?;
    Ok(warnings)
}

/// Merges enabled vocab sets into deterministic ASR phrase payloads.
///
/// Duplicate phrases keep the highest boost; the result is sorted so the
/// config plan and the wire request are reproducible.
pub fn build_speech_phrases(cfg: &Config) -> Result<(Vec<SpeechPhrase>, Vec<Warning>)> {
    if cfg.vocab.global_sets.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }

    struct Candidate {
        boost: f64,
        from: String,
    }

    let mut warnings = Vec::new();
    let mut selected: BTreeMap<String, Candidate> = BTreeMap::new();

    for name in &cfg.vocab.global_sets {
        let set = match cfg.vocab.sets.get(name) {
            Some(set) => set,
            None => bail!("vocab.global references unknown set {name:?}"),
        };
        for phrase in &set.phrases {
            let phrase = phrase.trim();
            if phrase.is_empty() {
                continue;
            }
            match selected.get(phrase) {
                Some(existing) if set.boost > existing.boost => {
                    warnings.push(Warning::new(format!(
                        "phrase {phrase:?} present in {:?} and {name:?}; using higher boost {:.2}",
                        existing.from, set.boost
                    )));
                    selected.insert(
                        phrase.to_string(),
                        Candidate {
                            boost: set.boost,
                            from: name.clone(),
                        },
                    );
                }
                Some(_) => {}
                None => {
                    selected.insert(
                        phrase.to_string(),
                        Candidate {
                            boost: set.boost,
                            from: name.clone(),
                        },
                    );
                }
            }
        }
    }

    if selected.len() > cfg.vocab.max_phrases {
        bail!(
            "vocabulary phrase count {} exceeds vocab.max_phrases={}",
            selected.len(),
            cfg.vocab.max_phrases
        );
    }

    let phrases = selected
        .into_iter()
        .map(|(phrase, candidate)| SpeechPhrase {
            phrase,
            boost: candidate.boost as f32,
        })
        .collect();
    Ok((phrases, warnings))
}
