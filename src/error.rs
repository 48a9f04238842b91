use std::time::Duration;

use thiserror::Error;

/// Caller-contract violations raised by the subtitle synthesis engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SynthesisError {
    #[error("the maximum chat entry duration must be positive")]
    NonPositiveEntryDuration,
    #[error("the cue duration limit must be positive")]
    NonPositiveDurationLimit,
    #[error("{messages} messages at {at:?} cannot share a window of {window:?}")]
    WindowTooShort {
        at: Duration,
        messages: usize,
        window: Duration,
    },
    #[error("a chat message at {0:?} would end past the largest representable time")]
    TimestampOverflow(Duration),
    #[error(
        "the recording ends at {recording:?}, before the last subtitle starts at {cue_start:?}"
    )]
    RecordingEndsBeforeLastCue {
        recording: Duration,
        cue_start: Duration,
    },
}

#[derive(Debug, Error)]
pub enum BbbError {
    #[error("{0}")]
    ParseError(String),
    #[error("Unable to find \"{0}\" in the xml.")]
    MissingElement(String),
    #[error("Unable to find attribute \"{attribute}\" on \"<{element}>\" in the xml.")]
    MissingAttribute { element: String, attribute: String },
    #[error("Invalid value \"{value}\" for \"{field}\" in the xml.")]
    InvalidValue { field: String, value: String },
    #[error("Unable to find a recording id in the url \"{0}\".")]
    MissingRecordingId(String),
    #[error("Unable to download webcam from remote server.")]
    MissingWebcam,
    #[error("ffmpeg exited with {0}")]
    MuxerFailed(std::process::ExitStatus),
}
