use crate::error::BbbError;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, Result};
use log::{debug, info};
use tokio::process::Command;

/// Downloaded parts that go into the final video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxInputs {
    pub webcam: PathBuf,
    pub deskshare: Option<PathBuf>,
    pub subtitles: Option<PathBuf>,
}

/// Arguments for ffmpeg: audio always comes from the webcam recording, video
/// from the deskshare when there is one.
pub fn ffmpeg_args(output: &Path, inputs: &MuxInputs) -> Vec<OsString> {
    let mut files: Vec<OsString> = vec!["-i".into(), inputs.webcam.clone().into()];
    let mut maps: Vec<OsString> = vec!["-map".into(), "0:a:0".into()];
    let mut input_index = 1;

    match &inputs.deskshare {
        Some(deskshare) => {
            files.push("-i".into());
            files.push(deskshare.clone().into());
            maps.push("-map".into());
            maps.push(format!("{}:v:0", input_index).into());
            input_index += 1;
        }
        None => {
            maps.push("-map".into());
            maps.push("0:v:0".into());
        }
    }

    if let Some(subtitles) = &inputs.subtitles {
        files.push("-i".into());
        files.push(subtitles.clone().into());
        for arg in ["-c:s", "mov_text", "-map"] {
            maps.push(arg.into());
        }
        maps.push(format!("{}:s:0", input_index).into());
    }

    let mut args: Vec<OsString> = vec!["-y".into()];
    args.extend(files);
    args.extend(maps);
    args.push(output.into());
    args
}

pub async fn build_video(output: &Path, inputs: &MuxInputs) -> Result<()> {
    let args = ffmpeg_args(output, inputs);
    debug!("Running ffmpeg {:?}", args);

    let status = Command::new("ffmpeg")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .context("Failed to run ffmpeg. Is it installed and on the PATH?")?;
    if !status.success() {
        return Err(BbbError::MuxerFailed(status).into());
    }

    info!("Saved {}", output.display());
    Ok(())
}
