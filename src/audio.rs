use std::{path::Path, process::Command};

use crate::{
    error::{TilawahError, TilawahResult},
    sequencer::ReelTimeline,
};

/// One narration placement on the reel's audio clock.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioPlacement {
    pub path: std::path::PathBuf,
    /// Offset in the reel, seconds.
    pub start: f64,
    /// Source is trimmed to this length, seconds.
    pub max_duration: f64,
    /// Fade-in/out applied at the clip edges, seconds.
    pub fade: f64,
}

/// Derives the audio placements for an assembled reel: each unit's narration
/// at its `start_time_in_reel`, trimmed to its probed duration.
pub fn placements_for(timeline: &ReelTimeline, fade: f64) -> Vec<AudioPlacement> {
    timeline
        .units
        .iter()
        .map(|u| AudioPlacement {
            path: u.audio_path.clone(),
            start: u.start_time_in_reel,
            max_duration: u.audio_duration,
            fade,
        })
        .collect()
}

/// Builds the full `ffmpeg` argument list that mixes the placements into a
/// single AAC track of exactly `total_duration` seconds. Pure so the graph
/// shape is testable without running ffmpeg.
pub fn build_mix_args(
    placements: &[AudioPlacement],
    total_duration: f64,
    out_path: &Path,
) -> TilawahResult<Vec<String>> {
    if placements.is_empty() {
        return Err(TilawahError::validation(
            "audio mix requires at least one placement",
        ));
    }

    let mut args: Vec<String> = vec!["-y".into(), "-loglevel".into(), "error".into()];
    for p in placements {
        args.push("-i".into());
        args.push(p.path.display().to_string());
    }

    let mut filter = String::new();
    for (i, p) in placements.iter().enumerate() {
        let delay_ms = (p.start.max(0.0) * 1000.0).round() as u64;
        let fade_out_start = (p.max_duration - p.fade).max(0.0);
        filter.push_str(&format!(
            "[{i}:a]atrim=0:{dur:.3},afade=t=in:st=0:d={fade:.3},\
             afade=t=out:st={fo:.3}:d={fade:.3},adelay={delay_ms}|{delay_ms}[a{i}];",
            dur = p.max_duration,
            fade = p.fade,
            fo = fade_out_start,
        ));
    }
    for i in 0..placements.len() {
        filter.push_str(&format!("[a{i}]"));
    }
    filter.push_str(&format!(
        "amix=inputs={}:duration=longest:normalize=0,apad=whole_dur={total_duration:.3}[mix]",
        placements.len()
    ));

    args.extend([
        "-filter_complex".into(),
        filter,
        "-map".into(),
        "[mix]".into(),
        "-t".into(),
        format!("{total_duration:.3}"),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        "192k".into(),
    ]);
    args.push(out_path.display().to_string());
    Ok(args)
}

/// Runs the system `ffmpeg` binary to write the mixed narration track.
#[tracing::instrument(skip(placements))]
pub fn write_mix(
    placements: &[AudioPlacement],
    total_duration: f64,
    out_path: &Path,
) -> TilawahResult<()> {
    let args = build_mix_args(placements, total_duration, out_path)?;

    let output = Command::new("ffmpeg")
        .args(&args)
        .output()
        .map_err(|e| TilawahError::encode(format!("failed to spawn ffmpeg for audio mix: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TilawahError::encode(format!(
            "ffmpeg audio mix exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    tracing::debug!(out = %out_path.display(), "audio track written");
    Ok(())
}
