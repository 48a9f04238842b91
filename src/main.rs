mod chat;
mod client;
mod error;
mod muxer;
mod parser;
mod processor;
mod recording;
mod segmenter;
mod serialiser;
mod srt;

use crate::chat::SubtitleOptions;
use crate::client::RecordingClient;
use crate::error::BbbError;
use crate::muxer::MuxInputs;
use crate::recording::SlideEntry;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use indicatif::MultiProgress;
use log::{debug, info, warn, LevelFilter};

#[tokio::main]
async fn main() {
    match run().await {
        Ok(()) => (),
        Err(err) => {
            eprintln!("An error occurred: {}", err);
            for cause in err.chain().skip(1) {
                eprintln!("    {}", cause);
            }
            std::process::exit(1);
        }
    }
}

#[derive(ClapParser)]
#[command(about = "Download BigBlueButton recordings as a single video with chat subtitles")]
struct Cli {
    #[arg(value_name = "URL", help = "URL to the meeting recording.")]
    url: String,
    #[arg(
        short = 'd',
        long,
        env = "BBBDL_NO_DESKSHARE",
        help = "Do not append the deskshare video to the output file."
    )]
    no_deskshare: bool,
    #[arg(
        short = 'c',
        long,
        env = "BBBDL_NO_CHAT",
        help = "Do not append chat subtitles to the output file."
    )]
    no_chat: bool,
    #[arg(
        short = 's',
        long,
        env = "BBBDL_NO_SSL",
        help = "Ignore SSL errors when connecting to the server."
    )]
    no_ssl: bool,
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Override the output filename."
    )]
    output: Option<PathBuf>,
    #[arg(
        long,
        value_name = "DIR",
        help = "Also save the presentation slides into the given directory."
    )]
    slides: Option<PathBuf>,
    #[arg(
        long,
        value_name = "SECONDS",
        default_value = "3",
        value_parser = parse_seconds,
        help = "Longest time a chat message stays on screen."
    )]
    chat_entry_duration: Duration,
    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Print more details; repeat for even more."
    )]
    verbose: u8,
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    let secs: f64 = value.parse().map_err(|_| format!("'{}' is not a number", value))?;
    if secs.is_nan() || secs <= 0.0 {
        return Err("the duration must be positive".to_string());
    }
    let duration = Duration::try_from_secs_f64(secs).map_err(|err| err.to_string())?;
    if duration.is_zero() {
        return Err(format!("'{}' is shorter than a nanosecond", value));
    }
    Ok(duration)
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_target(false)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let client = RecordingClient::new(&cli.url, cli.no_ssl)?;
    let metadata = client
        .metadata()
        .await
        .context("Failed to read the recording metadata")?;
    info!(
        "Recording '{}' of '{}' ({:?})",
        metadata.name, metadata.subject_name, metadata.duration
    );
    debug!(
        "Recording {} [{}]: {} - {}, {} participants, {} bytes, playback at {}",
        client.id(),
        metadata.subject_code,
        metadata.start_time,
        metadata.end_time,
        metadata.participants,
        metadata.size,
        metadata.playback_url
    );

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(metadata.default_filename()));

    let webcam = client.webcam().await?.ok_or(BbbError::MissingWebcam)?;
    let deskshare = if cli.no_deskshare {
        None
    } else {
        client.deskshare().await?
    };
    if deskshare.is_none() && !cli.no_deskshare {
        info!("Recording has no deskshare video");
    }

    let temp_dir = tempfile::tempdir().context("Failed to create a temporary directory")?;
    let progress = MultiProgress::new();
    let subtitle_opts = SubtitleOptions {
        entry_duration: cli.chat_entry_duration,
        ..SubtitleOptions::default()
    };

    let (webcam, deskshare, subtitles) = tokio::try_join!(
        webcam.copy_to(temp_dir.path(), &progress),
        async {
            match deskshare {
                Some(deskshare) => deskshare.copy_to(temp_dir.path(), &progress).await.map(Some),
                None => Ok(None),
            }
        },
        async {
            if cli.no_chat {
                Ok(None)
            } else {
                chat::build_chat_subtitles(
                    &client,
                    temp_dir.path(),
                    metadata.known_duration(),
                    &subtitle_opts,
                )
                .await
            }
        },
    )?;

    if let Some(directory) = &cli.slides {
        save_slides(&client, directory, &progress).await?;
    }

    let inputs = MuxInputs {
        webcam,
        deskshare,
        subtitles,
    };
    muxer::build_video(&output, &inputs).await
}

async fn save_slides(client: &RecordingClient, directory: &Path, progress: &MultiProgress) -> Result<()> {
    tokio::fs::create_dir_all(directory)
        .await
        .with_context(|| format!("Failed to create directory: {}", directory.display()))?;

    let slides = client.slides().await.context("Failed to read the slide list")?;
    let mut saved = 0;
    for slide in distinct_slides(&slides) {
        match client.open(slide.url.clone(), slide.filename.clone()).await? {
            Some(file) => {
                debug!(
                    "Slide {} shown {:?} - {:?}, {}x{} at ({}, {})",
                    slide.filename,
                    slide.start,
                    slide.end,
                    slide.size.width,
                    slide.size.height,
                    slide.position.x,
                    slide.position.y
                );
                file.copy_to(directory, progress).await?;
                saved += 1;
            }
            None => warn!("Slide {} is not available", slide.url),
        }
    }
    info!("Saved {} slides to {}", saved, directory.display());
    Ok(())
}

/// A slide shown several times is listed once per showing; only the first
/// listing of each image is kept.
fn distinct_slides(slides: &[SlideEntry]) -> Vec<&SlideEntry> {
    let mut seen = HashSet::new();
    slides
        .iter()
        .filter(|slide| seen.insert(slide.url.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let cli = Cli::try_parse_from([
            "bbbdl",
            "-d",
            "-c",
            "-s",
            "-o",
            "lecture.mp4",
            "--chat-entry-duration",
            "1.5",
            "-vv",
            "https://bbb.example.org/playback/presentation/2.3/x",
        ])
        .unwrap();

        assert!(cli.no_deskshare);
        assert!(cli.no_chat);
        assert!(cli.no_ssl);
        assert_eq!(cli.output, Some(PathBuf::from("lecture.mp4")));
        assert_eq!(cli.chat_entry_duration, Duration::from_millis(1_500));
        assert_eq!(cli.verbose, 2);
        assert!(cli.slides.is_none());
    }

    #[test]
    fn chat_entry_duration_defaults_to_three_seconds() {
        let cli = Cli::try_parse_from(["bbbdl", "https://bbb.example.org/x"]).unwrap();

        assert_eq!(cli.chat_entry_duration, Duration::from_secs(3));
    }

    #[test]
    fn repeated_slides_are_saved_once() {
        let xml = r#"<svg xmlns:xlink="http://www.w3.org/1999/xlink">
            <image in="0" out="10" xlink:href="presentation/aaaa-1/slide-1.png" width="1" height="1" x="0" y="0"/>
            <image in="10" out="20" xlink:href="presentation/bbbb-2/slide-1.png" width="1" height="1" x="0" y="0"/>
            <image in="20" out="30" xlink:href="presentation/aaaa-1/slide-1.png" width="1" height="1" x="0" y="0"/>
        </svg>"#;
        let root = parser::parse_document(xml).unwrap();
        let base = url::Url::parse("https://bbb.example.org/presentation/rec-1/").unwrap();
        let slides: Vec<SlideEntry> = root
            .children_named("image")
            .map(|image| SlideEntry::from_xml(image, &base).unwrap())
            .collect();

        let names: Vec<&str> = distinct_slides(&slides)
            .into_iter()
            .map(|slide| slide.filename.as_str())
            .collect();

        assert_eq!(names, vec!["aaaa-1-slide-1.png", "bbbb-2-slide-1.png"]);
    }

    #[test]
    fn non_positive_chat_entry_duration_is_rejected() {
        assert!(parse_seconds("0").is_err());
        assert!(parse_seconds("-2").is_err());
        assert!(parse_seconds("NaN").is_err());
        assert!(parse_seconds("abc").is_err());
        assert!(parse_seconds("1e-12").is_err());
        assert_eq!(parse_seconds("1e-9").unwrap(), Duration::from_nanos(1));
    }
}
