use crate::client::RecordingClient;
use crate::error::{BbbError, SynthesisError};
use crate::parser::Element;
use crate::processor::{self, ProcessOpts};
use crate::recording::seconds;
use crate::segmenter;
use crate::serialiser;
use crate::srt::{Cue, GAP_PLACEHOLDER, MAX_MP4_CUE_DURATION};

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEntry {
    pub name: String,
    pub message: String,
    pub timestamp: Duration,
}

impl ChatEntry {
    pub fn new(name: impl Into<String>, message: impl Into<String>, timestamp: Duration) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            timestamp,
        }
    }

    /// Reads the `<chattimeline>` entries of `slides_new.xml`.
    pub fn from_timeline(root: &Element) -> Result<Vec<Self>, BbbError> {
        root.children_named("chattimeline")
            .map(|line| -> Result<Self, BbbError> {
                Ok(Self::new(
                    line.required_attr("name")?,
                    line.required_attr("message")?,
                    seconds("in", line.required_attr("in")?)?,
                ))
            })
            .collect()
    }

    pub fn caption(&self) -> String {
        format!("{}: {}", self.name, self.message)
    }
}

#[derive(Debug, Clone)]
pub struct SubtitleOptions {
    /// Longest time a single chat message stays on screen.
    pub entry_duration: Duration,
    pub duration_limit: Duration,
    pub placeholder: String,
}

impl Default for SubtitleOptions {
    fn default() -> Self {
        Self {
            entry_duration: Duration::from_secs(3),
            duration_limit: MAX_MP4_CUE_DURATION,
            placeholder: GAP_PLACEHOLDER.to_string(),
        }
    }
}

/// Runs the transcript through the segmenter and the MP4 fixes.
pub fn synthesise(
    chat: &[ChatEntry],
    recording_duration: Option<Duration>,
    opts: &SubtitleOptions,
) -> Result<Vec<Cue>, SynthesisError> {
    let cues = segmenter::segment(chat, opts.entry_duration)?;
    processor::process(
        cues,
        &ProcessOpts {
            duration_limit: opts.duration_limit,
            recording_duration,
            placeholder: opts.placeholder.clone(),
        },
    )
}

/// Writes the chat to `subtitles.srt` inside `destination`.
///
/// Returns `None` when the chat is empty, in which case no file is written
/// and the video should be built without a subtitle track.
pub fn write_subtitles(
    chat: &[ChatEntry],
    destination: &Path,
    recording_duration: Option<Duration>,
    opts: &SubtitleOptions,
) -> Result<Option<PathBuf>> {
    let cues = synthesise(chat, recording_duration, opts)?;
    if cues.is_empty() {
        info!("Chat is empty, skipping subtitles");
        return Ok(None);
    }

    let filename = destination.join("subtitles.srt");
    serialiser::serialise(&cues, &filename)?;
    info!("Wrote {} subtitles", cues.len());
    Ok(Some(filename))
}

pub async fn build_chat_subtitles(
    client: &RecordingClient,
    destination: &Path,
    recording_duration: Option<Duration>,
    opts: &SubtitleOptions,
) -> Result<Option<PathBuf>> {
    let chat = client.chat().await.context("Failed to fetch the chat")?;
    debug!("Fetched {} chat messages", chat.len());
    write_subtitles(&chat, destination, recording_duration, opts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_document;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn reads_chat_timeline() {
        let root = parse_document(
            r#"<?xml version="1.0"?>
            <popcorn>
              <chattimeline in="12" direction="down" name="Alice" message="hi &amp; welcome" target="chat"/>
              <chattimeline in="12" direction="down" name="Bob" message="hello" target="chat"/>
              <chattimeline in="40" direction="down" name="Carol" message="bye" target="chat"/>
            </popcorn>"#,
        )
        .unwrap();

        let chat = ChatEntry::from_timeline(&root).unwrap();

        assert_eq!(
            chat,
            vec![
                ChatEntry::new("Alice", "hi & welcome", secs(12)),
                ChatEntry::new("Bob", "hello", secs(12)),
                ChatEntry::new("Carol", "bye", secs(40)),
            ]
        );
        assert_eq!(chat[0].caption(), "Alice: hi & welcome");
    }

    #[test]
    fn chat_line_without_message_is_rejected() {
        let root = parse_document(r#"<popcorn><chattimeline in="1" name="A"/></popcorn>"#).unwrap();

        let err = ChatEntry::from_timeline(&root).unwrap_err();

        assert_eq!(
            err.to_string(),
            "Unable to find attribute \"message\" on \"<chattimeline>\" in the xml."
        );
    }

    #[test]
    fn empty_chat_writes_no_file() {
        let dir = tempfile::tempdir().unwrap();

        let written = write_subtitles(&[], dir.path(), Some(secs(60)), &SubtitleOptions::default()).unwrap();

        assert!(written.is_none());
        assert!(!dir.path().join("subtitles.srt").exists());
    }

    #[test]
    fn chat_is_written_as_srt() {
        let dir = tempfile::tempdir().unwrap();
        let chat = vec![
            ChatEntry::new("Alice", "one", secs(10)),
            ChatEntry::new("Bob", "two", secs(10)),
            ChatEntry::new("Carol", "three", secs(10)),
            ChatEntry::new("Dave", "four", secs(20)),
        ];

        let written = write_subtitles(&chat, dir.path(), Some(secs(22)), &SubtitleOptions::default())
            .unwrap()
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(written).unwrap(),
            "1\n00:00:10,000 --> 00:00:11,000\nAlice: one\n\n\
             2\n00:00:11,000 --> 00:00:12,000\nBob: two\n\n\
             3\n00:00:12,000 --> 00:00:13,000\nCarol: three\n\n\
             4\n00:00:20,000 --> 00:00:22,000\nDave: four\n"
        );
    }

    #[test]
    fn long_silence_becomes_placeholders() {
        let chat = vec![
            ChatEntry::new("Alice", "start", secs(0)),
            ChatEntry::new("Bob", "end", secs(2400)),
        ];

        let cues = synthesise(&chat, None, &SubtitleOptions::default()).unwrap();

        let spans: Vec<(u64, u64, &str)> = cues
            .iter()
            .map(|c| (c.show_at.as_secs(), c.hide_at.as_secs(), c.text.as_str()))
            .collect();
        assert_eq!(spans.len(), 4);
        assert_eq!(spans[0], (0, 3, "Alice: start"));
        assert_eq!(cues[1].show_at, secs(3));
        assert_eq!(cues[2].hide_at, secs(2400));
        assert!(cues[1..3].iter().all(|c| c.text == GAP_PLACEHOLDER));
        assert!(cues[1..3].iter().all(|c| c.duration() <= MAX_MP4_CUE_DURATION));
        assert_eq!(spans[3], (2400, 2403, "Bob: end"));
    }

    #[test]
    fn recording_shorter_than_chat_is_a_usage_fault() {
        let chat = vec![ChatEntry::new("Alice", "late", secs(5))];

        let err = synthesise(&chat, Some(secs(4)), &SubtitleOptions::default()).unwrap_err();

        assert_eq!(
            err,
            SynthesisError::RecordingEndsBeforeLastCue {
                recording: secs(4),
                cue_start: secs(5),
            }
        );
    }

    #[test]
    fn zero_entry_duration_is_a_usage_fault() {
        let opts = SubtitleOptions {
            entry_duration: Duration::ZERO,
            ..SubtitleOptions::default()
        };

        let err = synthesise(&[], None, &opts).unwrap_err();

        assert_eq!(err, SynthesisError::NonPositiveEntryDuration);
    }
}
