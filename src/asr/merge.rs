//! Merges final/interim recognizer hypotheses into stable transcript segments.

/// Normalizes transcript whitespace.
pub(crate) fn clean_segment(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Appends one committed transcript piece, merging continuation hypotheses to
/// avoid duplicate transcript growth.
///
/// The recognizer frequently re-emits a shrinking or growing prefix for the
/// same utterance; a plain append would duplicate text.
pub(crate) fn append_segment(segments: &mut Vec<String>, transcript: &str) {
    let transcript = clean_segment(transcript);
    if transcript.is_empty() {
        return;
    }

    let last = match segments.last() {
        Some(last) => clean_segment(last),
        None => {
            segments.push(transcript);
            return;
        }
    };

    if transcript == last {
        return;
    }
    if transcript.starts_with(&last) {
        *segments.last_mut().expect("segments is non-empty") = transcript;
        return;
    }
    if last.starts_with(&transcript) {
        return;
    }
    segments.push(transcript);
}

/// Returns the committed segments plus the trailing interim hypothesis, fed
/// through the same merge rule exactly once.
pub(crate) fn collect_segments(committed: &[String], last_interim: &str) -> Vec<String> {
    let mut segments = committed.to_vec();
    let interim = clean_segment(last_interim);
    if !interim.is_empty() {
        append_segment(&mut segments, &interim);
    }
    segments
}
