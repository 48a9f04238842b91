use std::time::Duration;

/// Largest span a 32-bit signed microsecond MP4 timestamp can encode.
pub const MAX_MP4_CUE_DURATION: Duration = Duration::from_micros(i32::MAX as u64);

/// Text shown while nobody is talking in the chat.
pub const GAP_PLACEHOLDER: &str = "\u{a0}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    pub(crate) text: String,
    pub(crate) show_at: Duration,
    pub(crate) hide_at: Duration,
}

impl Cue {
    pub fn new(text: impl Into<String>, show_at: Duration, hide_at: Duration) -> Self {
        Self {
            text: text.into(),
            show_at,
            hide_at,
        }
    }

    pub fn duration(&self) -> Duration {
        self.hide_at.saturating_sub(self.show_at)
    }
}
