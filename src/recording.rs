use crate::error::BbbError;
use crate::parser::Element;

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone, Utc};
use url::Url;

/// Recording details from `metadata.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingMetadata {
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub participants: u32,
    pub subject_name: String,
    pub subject_code: String,
    pub duration: Duration,
    pub size: u64,
    pub playback_url: String,
}

impl RecordingMetadata {
    pub fn from_xml(root: &Element) -> Result<Self, BbbError> {
        let meta = root.find("meta")?;
        let playback = root.find("playback")?;

        Ok(Self {
            name: meta.find("bbb-recording-name")?.text(),
            start_time: timestamp(root.find("start_time")?)?,
            end_time: timestamp(root.find("end_time")?)?,
            participants: number(root.find("participants")?)?,
            subject_name: meta.find("bbb-context-name")?.text(),
            subject_code: meta.find("bbb-context-label")?.text(),
            duration: Duration::from_millis(number(playback.find("duration")?)?),
            size: number(playback.find("size")?)?,
            playback_url: playback.find("link")?.text(),
        })
    }

    /// Playback length, or `None` when the server did not report one.
    pub fn known_duration(&self) -> Option<Duration> {
        Some(self.duration).filter(|d| !d.is_zero())
    }

    pub fn default_filename(&self) -> String {
        self.filename_in(&Local)
    }

    pub fn filename_in<Tz: TimeZone>(&self, tz: &Tz) -> String
    where
        Tz::Offset: Display,
    {
        let date = self.start_time.with_timezone(tz).format("%d.%m.%y");
        format!("{}. {} - {}.mp4", self.subject_name, self.name, date).replace(['/', '\\'], "-")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// A slide image listed in `shapes.svg`.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideEntry {
    pub url: Url,
    pub filename: String,
    pub start: Duration,
    pub end: Duration,
    pub size: Size,
    pub position: Point,
}

impl SlideEntry {
    pub fn from_xml(image: &Element, base: &Url) -> Result<Self, BbbError> {
        let href = image
            .attr_containing("href")
            .ok_or_else(|| BbbError::MissingAttribute {
                element: image.name.clone(),
                attribute: "href".to_string(),
            })?;
        let url = base.join(href).map_err(|_| BbbError::InvalidValue {
            field: "href".to_string(),
            value: href.to_string(),
        })?;
        Ok(Self {
            filename: slide_filename(&url),
            start: seconds("in", image.required_attr("in")?)?,
            end: seconds("out", image.required_attr("out")?)?,
            size: Size {
                width: parse("width", image.required_attr("width")?)?,
                height: parse("height", image.required_attr("height")?)?,
            },
            position: Point {
                x: parse("x", image.required_attr("x")?)?,
                y: parse("y", image.required_attr("y")?)?,
            },
            url,
        })
    }
}

/// Local name for a slide image. Every uploaded presentation numbers its
/// slides from one, so the presentation id is kept as a prefix.
fn slide_filename(url: &Url) -> String {
    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();
    let file = segments.last().copied().unwrap_or_default();
    let presentation = segments
        .iter()
        .rposition(|s| *s == "presentation")
        .and_then(|i| segments.get(i + 1))
        .filter(|id| **id != file);

    match presentation {
        Some(id) => format!("{}-{}", id, file),
        None => file.to_string(),
    }
}

/// Parses an offset in (possibly fractional) seconds.
pub(crate) fn seconds(field: &str, value: &str) -> Result<Duration, BbbError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| invalid(field, value))
}

fn parse<T: FromStr>(field: &str, value: &str) -> Result<T, BbbError> {
    value.trim().parse().map_err(|_| invalid(field, value))
}

/// Numeric element content; an empty element reads as zero.
fn number<T: FromStr>(element: &Element) -> Result<T, BbbError> {
    let text = element.text();
    let text = if text.is_empty() { "0" } else { text.as_str() };
    parse(&element.name, text)
}

fn timestamp(element: &Element) -> Result<DateTime<Utc>, BbbError> {
    let millis: i64 = number(element)?;
    DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| invalid(&element.name, &element.text()))
}

fn invalid(field: &str, value: &str) -> BbbError {
    BbbError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}
