use crate::srt::Cue;

use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

pub fn serialise<P: AsRef<Path>>(cues: &[Cue], output: P) -> Result<()> {
    let output = output.as_ref();
    let file = std::fs::File::create(output)
        .with_context(|| format!("Failed to create subtitle file: {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    write_cues(&mut writer, cues).context("Failed to write to subtitle file.")?;
    writer.flush().context("Failed to write to subtitle file.")?;
    Ok(())
}

pub fn write_cues<W: Write>(buf: &mut W, cues: &[Cue]) -> Result<()> {
    for (index, cue) in cues.iter().enumerate() {
        if index > 0 {
            writeln!(buf)?;
        }
        write_cue(buf, index + 1, cue)?;
    }
    Ok(())
}

fn write_cue<W: Write>(buf: &mut W, sequence_number: usize, cue: &Cue) -> Result<()> {
    writeln!(buf, "{}", sequence_number)?;
    write_ts(buf, cue.show_at)?;
    write!(buf, " --> ")?;
    write_ts(buf, cue.hide_at)?;
    writeln!(buf)?;
    writeln!(buf, "{}", cue.text)?;
    Ok(())
}

fn write_ts<W: Write>(buf: &mut W, timestamp: Duration) -> Result<()> {
    let total_secs = timestamp.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    let millis = timestamp.subsec_millis();
    write!(
        buf,
        "{:02}:{:02}:{:02},{:03}",
        hours, minutes, seconds, millis
    )?;
    Ok(())
}
