use crate::chat::ChatEntry;
use crate::error::BbbError;
use crate::parser::{parse_document, Element};
use crate::recording::{RecordingMetadata, SlideEntry};

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::debug;
use regex::Regex;
use tokio::io::AsyncWriteExt;
use url::Url;

const VIDEO_EXTENSIONS: [&str; 2] = ["mp4", "webm"];
const RECORDING_ID_PATTERN: &str = r"\w{40}-\d+";
const PROGRESS_CHARS: &str = "█▞▚▗▝▘▖ ";

/// Client for the published assets of a single recording.
pub struct RecordingClient {
    http: reqwest::Client,
    base: Url,
    id: String,
}

impl RecordingClient {
    pub fn new(meeting_url: &str, accept_invalid_certs: bool) -> Result<Self> {
        let url = Url::parse(meeting_url)
            .with_context(|| format!("Invalid recording url: '{}'", meeting_url))?;
        let id = Regex::new(RECORDING_ID_PATTERN)?
            .find(meeting_url)
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| BbbError::MissingRecordingId(meeting_url.to_string()))?;
        let base = url.join("/")?;

        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .context("Failed to create the HTTP client")?;

        Ok(Self { http, base, id })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn presentation_url(&self, path: &str) -> Result<Url> {
        self.base
            .join(&format!("presentation/{}/{}", self.id, path))
            .with_context(|| format!("Invalid presentation path: '{}'", path))
    }

    pub async fn metadata(&self) -> Result<RecordingMetadata> {
        let root = self.get_xml(self.presentation_url("metadata.xml")?).await?;
        Ok(RecordingMetadata::from_xml(&root)?)
    }

    pub async fn chat(&self) -> Result<Vec<ChatEntry>> {
        let root = self.get_xml(self.presentation_url("slides_new.xml")?).await?;
        Ok(ChatEntry::from_timeline(&root)?)
    }

    /// Slide images of the presentation. Entries that cannot be read are
    /// skipped.
    pub async fn slides(&self) -> Result<Vec<SlideEntry>> {
        let base = self.presentation_url("")?;
        let root = self.get_xml(base.join("shapes.svg")?).await?;

        let slides = root
            .children_named("image")
            .filter_map(|image| match SlideEntry::from_xml(image, &base) {
                Ok(slide) => Some(slide),
                Err(err) => {
                    debug!("Skipping slide: {}", err);
                    None
                }
            })
            .collect();
        Ok(slides)
    }

    pub async fn webcam(&self) -> Result<Option<RemoteFile>> {
        self.first_available("video", "webcams").await
    }

    pub async fn deskshare(&self) -> Result<Option<RemoteFile>> {
        self.first_available("deskshare", "deskshare").await
    }

    async fn first_available(&self, directory: &str, stem: &str) -> Result<Option<RemoteFile>> {
        for extension in VIDEO_EXTENSIONS {
            let filename = format!("{}.{}", stem, extension);
            let url = self.presentation_url(&format!("{}/{}", directory, filename))?;
            if let Some(file) = self.open(url, filename).await? {
                debug!("Found {}", file.filename());
                return Ok(Some(file));
            }
        }
        Ok(None)
    }

    /// Starts downloading `url`, or returns `None` if the server does not
    /// have it.
    pub async fn open(&self, url: Url, filename: String) -> Result<Option<RemoteFile>> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;
        if !response.status().is_success() {
            debug!("{} answered {}", url, response.status());
            return Ok(None);
        }
        Ok(Some(RemoteFile { filename, response }))
    }

    async fn get_xml(&self, url: Url) -> Result<Element> {
        debug!("Fetching {}", url);
        let body = self
            .http
            .get(url.clone())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .with_context(|| format!("Request to {} failed", url))?
            .text()
            .await
            .with_context(|| format!("Failed to read {}", url))?;
        parse_document(&body).with_context(|| format!("Invalid document at {}", url))
    }
}

/// A remote file whose response headers have arrived.
pub struct RemoteFile {
    filename: String,
    response: reqwest::Response,
}

impl RemoteFile {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Streams the body into `directory`, keeping the remote file name.
    pub async fn copy_to(mut self, directory: &Path, progress: &MultiProgress) -> Result<PathBuf> {
        let destination = directory.join(&self.filename);
        let mut file = tokio::fs::File::create(&destination)
            .await
            .with_context(|| format!("Failed to create file: {}", destination.display()))?;

        let bar = progress.add(progress_bar(self.response.content_length(), &self.filename)?);
        while let Some(chunk) = self
            .response
            .chunk()
            .await
            .with_context(|| format!("Failed to download {}", self.filename))?
        {
            file.write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write to {}", destination.display()))?;
            bar.inc(chunk.len() as u64);
        }
        file.flush().await?;
        bar.finish_and_clear();

        debug!("Saved {}", destination.display());
        Ok(destination)
    }
}

fn progress_bar(len: Option<u64>, label: &str) -> Result<ProgressBar> {
    let bar = match len {
        Some(len) => ProgressBar::new(len).with_style(
            ProgressStyle::with_template("{msg:>14} [{bar:40.green}] {bytes}/{total_bytes} ({eta})")?
                .progress_chars(PROGRESS_CHARS),
        ),
        None => ProgressBar::new_spinner()
            .with_style(ProgressStyle::with_template("{msg:>14} {spinner} {bytes}")?),
    };
    Ok(bar.with_message(label.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORDING: &str = "0123456789abcdef0123456789abcdef01234567-1600000000000";

    #[test]
    fn extracts_id_and_server() {
        let url = format!("https://bbb.example.org:8443/playback/presentation/2.3/{}?meetingId={}", RECORDING, RECORDING);

        let client = RecordingClient::new(&url, false).unwrap();

        assert_eq!(client.id(), RECORDING);
        assert_eq!(
            client.presentation_url("metadata.xml").unwrap().as_str(),
            format!("https://bbb.example.org:8443/presentation/{}/metadata.xml", RECORDING)
        );
    }

    #[test]
    fn builds_video_urls() {
        let url = format!("https://bbb.example.org/playback/presentation/2.0/playback.html?meetingId={}", RECORDING);

        let client = RecordingClient::new(&url, true).unwrap();

        assert_eq!(
            client.presentation_url("deskshare/deskshare.webm").unwrap().as_str(),
            format!("https://bbb.example.org/presentation/{}/deskshare/deskshare.webm", RECORDING)
        );
    }

    #[test]
    fn url_without_recording_id_is_rejected() {
        let err = RecordingClient::new("https://bbb.example.org/playback/presentation/2.3/abc-1", false)
            .err()
            .unwrap();

        assert_eq!(
            err.to_string(),
            "Unable to find a recording id in the url \"https://bbb.example.org/playback/presentation/2.3/abc-1\"."
        );
    }

    #[test]
    fn unknown_length_uses_a_spinner() {
        let bar = progress_bar(None, "webcams.webm").unwrap();
        assert_eq!(bar.length(), None);

        let bar = progress_bar(Some(1024), "webcams.webm").unwrap();
        assert_eq!(bar.length(), Some(1024));
    }
}
