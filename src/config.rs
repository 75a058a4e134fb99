use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{
    core::{Canvas, Fps},
    error::{TilawahError, TilawahResult},
};

/// Engine parameters for one reel-generation run.
///
/// Constructed once at the top of a run and threaded explicitly into the
/// sequencer and renderer; nothing in the call tree reads the environment.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ReelConfig {
    pub canvas: Canvas,
    pub fps: Fps,

    /// Words per display page.
    pub page_size: usize,
    /// Crossfade window around each page transition, seconds.
    pub crossfade: f64,

    /// Silence inserted after each unit's audio, seconds.
    pub inter_unit_padding: f64,
    /// Offset before the first unit's audio starts, seconds.
    pub lead_in: f64,
    /// Buffer appended after the last unit, seconds.
    pub trailing_buffer: f64,

    /// Reels shorter than this are extended with further units.
    pub min_duration: f64,
    /// Hard ceiling on reel content duration (platform short-video limit).
    pub max_duration: f64,

    pub verses_per_reel: u32,

    /// Background source: a still image file or a directory to pick from.
    /// `None` falls back to a solid graded color.
    pub background: Option<PathBuf>,
    /// Optional font file loaded in addition to system fonts.
    pub font_path: Option<PathBuf>,

    pub audio_dir: PathBuf,
    pub videos_dir: PathBuf,
    pub state_path: PathBuf,

    pub api_base: String,
}

impl Default for ReelConfig {
    fn default() -> Self {
        Self {
            canvas: Canvas {
                width: 1080,
                height: 1920,
            },
            fps: Fps(24),
            page_size: 12,
            crossfade: 0.5,
            inter_unit_padding: 0.48,
            lead_in: 0.1,
            trailing_buffer: 0.5,
            min_duration: 30.0,
            max_duration: 59.0,
            verses_per_reel: 3,
            background: None,
            font_path: None,
            audio_dir: PathBuf::from("outputs/audio"),
            videos_dir: PathBuf::from("outputs/videos"),
            state_path: PathBuf::from("outputs/progress.json"),
            api_base: "https://api.quran.com/api/v4".to_string(),
        }
    }
}

impl ReelConfig {
    pub fn load(path: &Path) -> TilawahResult<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parse config '{}'", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> TilawahResult<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(TilawahError::validation("canvas width/height must be > 0"));
        }
        if self.fps.0 == 0 {
            return Err(TilawahError::validation("fps must be > 0"));
        }
        if self.page_size == 0 {
            return Err(TilawahError::validation("page_size must be > 0"));
        }
        if self.min_duration > self.max_duration {
            return Err(TilawahError::validation(
                "min_duration must be <= max_duration",
            ));
        }
        for (name, v) in [
            ("crossfade", self.crossfade),
            ("inter_unit_padding", self.inter_unit_padding),
            ("lead_in", self.lead_in),
            ("trailing_buffer", self.trailing_buffer),
            ("min_duration", self.min_duration),
            ("max_duration", self.max_duration),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(TilawahError::validation(format!(
                    "{name} must be finite and >= 0"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        ReelConfig::default().validate().unwrap();
    }

    #[test]
    fn min_above_max_is_rejected() {
        let cfg = ReelConfig {
            min_duration: 60.0,
            max_duration: 59.0,
            ..ReelConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let cfg = ReelConfig {
            page_size: 0,
            ..ReelConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: ReelConfig = serde_json::from_str(r#"{ "page_size": 8 }"#).unwrap();
        assert_eq!(cfg.page_size, 8);
        assert_eq!(cfg.fps, Fps(24));
        assert_eq!(cfg.max_duration, 59.0);
    }
}
