//! Synthesized audio cues for session lifecycle events.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use tracing::debug;

const CUE_SAMPLE_RATE: u32 = 16_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cue {
    Start,
    Stop,
    Complete,
    Cancel,
}

/// One synthesized cue tone segment.
struct ToneSpec {
    frequency_hz: f32,
    duration: Duration,
    volume: f32,
}

static START_CUE: Lazy<Vec<f32>> = Lazy::new(|| {
    synthesize_cue(&[
        ToneSpec {
            frequency_hz: 880.0,
            duration: Duration::from_millis(70),
            volume: 0.18,
        },
        ToneSpec {
            frequency_hz: 1175.0,
            duration: Duration::from_millis(70),
            volume: 0.18,
        },
    ])
});

static STOP_CUE: Lazy<Vec<f32>> = Lazy::new(|| {
    synthesize_cue(&[ToneSpec {
        frequency_hz: 620.0,
        duration: Duration::from_millis(120),
        volume: 0.18,
    }])
});

static COMPLETE_CUE: Lazy<Vec<f32>> = Lazy::new(|| {
    synthesize_cue(&[
        ToneSpec {
            frequency_hz: 740.0,
            duration: Duration::from_millis(65),
            volume: 0.18,
        },
        ToneSpec {
            frequency_hz: 988.0,
            duration: Duration::from_millis(90),
            volume: 0.18,
        },
    ])
});

static CANCEL_CUE: Lazy<Vec<f32>> = Lazy::new(|| {
    synthesize_cue(&[
        ToneSpec {
            frequency_hz: 480.0,
            duration: Duration::from_millis(75),
            volume: 0.18,
        },
        ToneSpec {
            frequency_hz: 360.0,
            duration: Duration::from_millis(90),
            volume: 0.18,
        },
    ])
});

fn cue_samples(cue: Cue) -> &'static [f32] {
    match cue {
        Cue::Start => &START_CUE,
        Cue::Stop => &STOP_CUE,
        Cue::Complete => &COMPLETE_CUE,
        Cue::Cancel => &CANCEL_CUE,
    }
}

/// Plays one cue on a background thread. Playback is serialized through
/// `lock` so overlapping cues queue instead of mixing.
pub(crate) fn play(cue: Cue, lock: Arc<Mutex<()>>) {
    std::thread::spawn(move || {
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(err) = play_samples(cue_samples(cue)) {
            debug!(error = %err, "indicator audio cue failed");
        }
    });
}

fn play_samples(samples: &[f32]) -> Result<()> {
    if samples.is_empty() {
        return Ok(());
    }
    let stream = rodio::OutputStreamBuilder::open_default_stream()
        .context("open audio output stream")?;
    let sink = rodio::Sink::connect_new(stream.mixer());
    sink.append(rodio::buffer::SamplesBuffer::new(
        1,
        CUE_SAMPLE_RATE,
        samples.to_vec(),
    ));
    sink.sleep_until_end();
    Ok(())
}

/// Concatenates tone segments with short silence gaps.
fn synthesize_cue(parts: &[ToneSpec]) -> Vec<f32> {
    if parts.is_empty() {
        return Vec::new();
    }
    let gap_samples = samples_for_duration(Duration::from_millis(22));

    let mut pcm = Vec::new();
    for (i, part) in parts.iter().enumerate() {
        pcm.extend(synthesize_tone(part));
        if i < parts.len() - 1 {
            pcm.extend(std::iter::repeat(0.0).take(gap_samples));
        }
    }
    pcm
}

/// One windowed sine-wave segment with a short attack/release ramp.
fn synthesize_tone(spec: &ToneSpec) -> Vec<f32> {
    let n = samples_for_duration(spec.duration);
    if n == 0 || spec.frequency_hz <= 0.0 || spec.volume <= 0.0 {
        return Vec::new();
    }

    let max_ramp = (CUE_SAMPLE_RATE / 200) as usize; // 5ms
    let attack_release = (n / 10).clamp(1, max_ramp.max(1));

    let mut pcm = Vec::with_capacity(n);
    for i in 0..n {
        let mut envelope: f32 = 1.0;
        if i < attack_release {
            envelope = i as f32 / attack_release as f32;
        }
        let release_index = n - i - 1;
        if release_index < attack_release {
            let release = release_index as f32 / attack_release as f32;
            if release < envelope {
                envelope = release;
            }
        }
        let t = i as f32 / CUE_SAMPLE_RATE as f32;
        let sample = (2.0 * std::f32::consts::PI * spec.frequency_hz * t).sin();
        pcm.push(sample * spec.volume * envelope);
    }
    pcm
}

fn samples_for_duration(d: Duration) -> usize {
    (d.as_secs_f64() * f64::from(CUE_SAMPLE_RATE)).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tones_have_expected_length() {
        let tone = synthesize_tone(&ToneSpec {
            frequency_hz: 440.0,
            duration: Duration::from_millis(100),
            volume: 0.2,
        });
        assert_eq!(tone.len(), 1600);
    }

    #[test]
    fn tones_stay_within_volume_bounds() {
        let tone = synthesize_tone(&ToneSpec {
            frequency_hz: 880.0,
            duration: Duration::from_millis(70),
            volume: 0.18,
        });
        assert!(tone.iter().all(|s| s.abs() <= 0.18 + f32::EPSILON));
    }

    #[test]
    fn envelope_ramps_from_and_to_silence() {
        let tone = synthesize_tone(&ToneSpec {
            frequency_hz: 620.0,
            duration: Duration::from_millis(120),
            volume: 0.18,
        });
        assert_eq!(tone[0], 0.0);
        assert_eq!(*tone.last().unwrap(), 0.0);
    }

    #[test]
    fn multi_part_cues_include_a_gap() {
        let single = synthesize_cue(&[ToneSpec {
            frequency_hz: 880.0,
            duration: Duration::from_millis(70),
            volume: 0.18,
        }]);
        assert!(START_CUE.len() > single.len() * 2);
    }

    #[test]
    fn every_cue_has_samples() {
        for cue in [Cue::Start, Cue::Stop, Cue::Complete, Cue::Cancel] {
            assert!(!cue_samples(cue).is_empty());
        }
    }
}
