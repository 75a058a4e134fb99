use std::{
    path::{Path, PathBuf},
    process::{Child, ChildStdin, Command, Stdio},
};

use crate::{
    core::{Canvas, Fps, PixelBuffer},
    error::{TilawahError, TilawahResult},
};

#[derive(Clone, Debug)]
pub struct EncodeConfig {
    pub canvas: Canvas,
    pub fps: Fps,
    pub out_path: PathBuf,
    /// Pre-mixed narration track muxed alongside the frame stream.
    pub audio_path: Option<PathBuf>,
    /// Output container duration, seconds.
    pub total_duration: f64,
    pub overwrite: bool,
}

impl EncodeConfig {
    pub fn validate(&self) -> TilawahResult<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(TilawahError::validation(
                "encode width/height must be non-zero",
            ));
        }
        if self.fps.0 == 0 {
            return Err(TilawahError::validation("encode fps must be non-zero"));
        }
        if !self.canvas.width.is_multiple_of(2) || !self.canvas.height.is_multiple_of(2) {
            // Default settings target yuv420p output for maximum compatibility.
            return Err(TilawahError::validation(
                "encode width/height must be even (required for yuv420p mp4 output)",
            ));
        }
        if !self.total_duration.is_finite() || self.total_duration <= 0.0 {
            return Err(TilawahError::validation(
                "encode total_duration must be > 0",
            ));
        }
        Ok(())
    }
}

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> TilawahResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Duration of a media file in seconds, via the system `ffprobe`.
///
/// Never fails: the collaborator contract guarantees a 5.0 s fallback so the
/// sequencer always receives a usable duration.
pub fn probe_duration(path: &Path) -> f64 {
    const FALLBACK_SECS: f64 = 5.0;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output();

    let parsed = match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout)
            .trim()
            .parse::<f64>()
            .ok(),
        _ => None,
    };

    match parsed {
        Some(d) if d.is_finite() && d > 0.0 => d,
        _ => {
            tracing::warn!(
                path = %path.display(),
                fallback = FALLBACK_SECS,
                "could not probe audio duration, using fallback"
            );
            FALLBACK_SECS
        }
    }
}

/// Streams raw RGBA frames into the system `ffmpeg` binary and muxes the
/// optional narration track. The system binary avoids native FFmpeg dev
/// header/lib requirements.
pub struct FfmpegEncoder {
    cfg: EncodeConfig,
    bg_rgba: [u8; 4],
    child: Child,
    stdin: Option<ChildStdin>,
    scratch: Vec<u8>,
}

impl FfmpegEncoder {
    pub fn new(cfg: EncodeConfig, bg_rgba: [u8; 4]) -> TilawahResult<Self> {
        cfg.validate()?;
        ensure_parent_dir(&cfg.out_path)?;

        if !cfg.overwrite && cfg.out_path.exists() {
            return Err(TilawahError::validation(format!(
                "output file '{}' already exists",
                cfg.out_path.display()
            )));
        }

        if !is_ffmpeg_on_path() {
            return Err(TilawahError::encode(
                "ffmpeg is required for MP4 encoding, but was not found on PATH",
            ));
        }

        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        cmd.arg(if cfg.overwrite { "-y" } else { "-n" });

        cmd.args([
            "-loglevel",
            "error",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", cfg.canvas.width, cfg.canvas.height),
            "-r",
            &cfg.fps.0.to_string(),
            "-i",
            "pipe:0",
        ]);

        if let Some(audio) = &cfg.audio_path {
            cmd.arg("-i").arg(audio);
            cmd.args(["-c:a", "aac", "-b:a", "192k"]);
        } else {
            cmd.arg("-an");
        }

        cmd.args([
            "-c:v",
            "libx264",
            "-pix_fmt",
            "yuv420p",
            "-movflags",
            "+faststart",
            "-t",
            &format!("{:.3}", cfg.total_duration),
        ])
        .arg(&cfg.out_path);

        let mut child = cmd.spawn().map_err(|e| {
            TilawahError::encode(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TilawahError::encode("failed to open ffmpeg stdin (unexpected)"))?;

        Ok(Self {
            scratch: vec![0u8; (cfg.canvas.width * cfg.canvas.height * 4) as usize],
            cfg,
            bg_rgba,
            child,
            stdin: Some(stdin),
        })
    }

    pub fn encode_frame(&mut self, frame: &PixelBuffer) -> TilawahResult<()> {
        if frame.width() != self.cfg.canvas.width || frame.height() != self.cfg.canvas.height {
            return Err(TilawahError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width(),
                frame.height(),
                self.cfg.canvas.width,
                self.cfg.canvas.height
            )));
        }

        flatten_premul_to_opaque(&mut self.scratch, frame.data(), self.bg_rgba)?;

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(TilawahError::encode("ffmpeg encoder is already finalized"));
        };

        use std::io::Write as _;
        stdin.write_all(&self.scratch).map_err(|e| {
            TilawahError::encode(format!("failed to write frame to ffmpeg stdin: {e}"))
        })?;

        Ok(())
    }

    pub fn finish(mut self) -> TilawahResult<()> {
        drop(self.stdin.take());

        let output = self
            .child
            .wait_with_output()
            .map_err(|e| TilawahError::encode(format!("failed to wait for ffmpeg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TilawahError::encode(format!(
                "ffmpeg exited with status {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

/// Flattens premultiplied RGBA over an opaque background color. Composited
/// reel frames are already opaque; this guards the general case.
fn flatten_premul_to_opaque(dst: &mut [u8], src: &[u8], bg_rgba: [u8; 4]) -> TilawahResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(TilawahError::validation(
            "flatten expects equal-length rgba8 buffers",
        ));
    }

    let bg = [
        u16::from(bg_rgba[0]),
        u16::from(bg_rgba[1]),
        u16::from(bg_rgba[2]),
    ];

    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }

        let inv = 255u16 - a;
        for c in 0..3 {
            let v = u16::from(s[c]) + mul_div255(bg[c], inv);
            d[c] = v.min(255) as u8;
        }
        d[3] = 255;
    }

    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}
