use crate::error::SynthesisError;
use crate::srt::{Cue, GAP_PLACEHOLDER, MAX_MP4_CUE_DURATION};

use std::time::Duration;

use log::debug;

pub struct ProcessOpts {
    /// Longest span a single cue may cover.
    pub duration_limit: Duration,
    /// Length of the video the subtitles are attached to, when known.
    pub recording_duration: Option<Duration>,
    pub placeholder: String,
}

impl Default for ProcessOpts {
    fn default() -> Self {
        Self {
            duration_limit: MAX_MP4_CUE_DURATION,
            recording_duration: None,
            placeholder: GAP_PLACEHOLDER.to_string(),
        }
    }
}

/// Rewrites an ordered, non-overlapping cue sequence so that it can be muxed
/// as an MP4 text track: silent gaps longer than the limit get a placeholder
/// cue, cues longer than the limit are split, and the last cue is clamped to
/// the recording length.
pub fn process(cues: Vec<Cue>, opts: &ProcessOpts) -> Result<Vec<Cue>, SynthesisError> {
    if opts.duration_limit.is_zero() {
        return Err(SynthesisError::NonPositiveDurationLimit);
    }

    let filled = fill_gaps(cues, opts.duration_limit, &opts.placeholder);
    let mut result = Vec::with_capacity(filled.len());
    for cue in filled {
        split_oversized(cue, opts.duration_limit, &mut result);
    }

    if let Some(recording) = opts.recording_duration {
        clamp_last(&mut result, recording)?;
    }

    Ok(result)
}

fn fill_gaps(cues: Vec<Cue>, limit: Duration, placeholder: &str) -> Vec<Cue> {
    let mut result = Vec::with_capacity(cues.len());
    let mut previous_end = Duration::ZERO;
    for cue in cues {
        if cue.show_at.saturating_sub(previous_end) > limit {
            debug!(
                "Filling silent gap {:?} - {:?} with a placeholder",
                previous_end, cue.show_at
            );
            result.push(Cue::new(placeholder, previous_end, cue.show_at));
        }
        previous_end = cue.hide_at;
        result.push(cue);
    }
    result
}

fn split_oversized(cue: Cue, limit: Duration, result: &mut Vec<Cue>) {
    let duration = cue.duration();
    if duration <= limit {
        result.push(cue);
        return;
    }

    let total = duration.as_nanos();
    let parts = total.div_ceil(limit.as_nanos());
    // Rounding up keeps every part within the limit; the last part takes
    // whatever is left and is never longer than the others.
    let part = nanos(total.div_ceil(parts));
    debug!("Splitting {:?} long cue into {} parts", duration, parts);

    let mut show_at = cue.show_at;
    for _ in 1..parts {
        let hide_at = show_at + part;
        result.push(Cue::new(cue.text.as_str(), show_at, hide_at));
        show_at = hide_at;
    }
    result.push(Cue::new(cue.text, show_at, cue.hide_at));
}

fn clamp_last(cues: &mut [Cue], recording: Duration) -> Result<(), SynthesisError> {
    let last = match cues.last_mut() {
        Some(last) if last.hide_at > recording => last,
        _ => return Ok(()),
    };
    if recording < last.show_at {
        return Err(SynthesisError::RecordingEndsBeforeLastCue {
            recording,
            cue_start: last.show_at,
        });
    }
    last.hide_at = recording;
    Ok(())
}

fn nanos(value: u128) -> Duration {
    const NANOS_PER_SEC: u128 = 1_000_000_000;
    let secs = u64::try_from(value / NANOS_PER_SEC).unwrap_or(u64::MAX);
    // The remainder is always below one second.
    Duration::new(secs, (value % NANOS_PER_SEC) as u32)
}
