use crate::chat::ChatEntry;
use crate::error::SynthesisError;
use crate::srt::Cue;

use std::time::Duration;

/// Turns a chat transcript into contiguous, non-overlapping cues.
///
/// Messages sharing a timestamp form one group. A group is shown for at most
/// `max_duration`, shortened so that it ends no later than the next group
/// starts; the last group always gets the full `max_duration`. The window of a
/// group is divided evenly between its messages in transcript order.
pub fn segment(entries: &[ChatEntry], max_duration: Duration) -> Result<Vec<Cue>, SynthesisError> {
    if max_duration.is_zero() {
        return Err(SynthesisError::NonPositiveEntryDuration);
    }

    let mut ordered: Vec<&ChatEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.timestamp);
    let groups: Vec<&[&ChatEntry]> = ordered
        .chunk_by(|a, b| a.timestamp == b.timestamp)
        .collect();

    let (last, init) = match groups.split_last() {
        Some(split) => split,
        None => return Ok(Vec::new()),
    };

    let mut cues = Vec::with_capacity(entries.len());
    for (group, next) in init.iter().zip(&groups[1..]) {
        let gap = next[0].timestamp - group[0].timestamp;
        split_group(group, max_duration.min(gap), &mut cues)?;
    }
    split_group(last, max_duration, &mut cues)?;

    Ok(cues)
}

fn split_group(
    group: &[&ChatEntry],
    allotted: Duration,
    cues: &mut Vec<Cue>,
) -> Result<(), SynthesisError> {
    let (last, init) = match group.split_last() {
        Some(split) => split,
        None => return Ok(()),
    };
    let start = last.timestamp;
    let end = start
        .checked_add(allotted)
        .ok_or(SynthesisError::TimestampOverflow(start))?;
    let part = allotted / u32::try_from(group.len()).unwrap_or(u32::MAX);
    if part.is_zero() {
        return Err(SynthesisError::WindowTooShort {
            at: start,
            messages: group.len(),
            window: allotted,
        });
    }

    // Every intermediate end stays below `end`, so plain addition is safe here.
    let mut show_at = start;
    for entry in init {
        let hide_at = show_at + part;
        cues.push(Cue::new(entry.caption(), show_at, hide_at));
        show_at = hide_at;
    }
    // The final message absorbs the division remainder.
    cues.push(Cue::new(last.caption(), show_at, end));
    Ok(())
}
