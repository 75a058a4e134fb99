use std::path::PathBuf;

use anyhow::Context as _;

use crate::{
    audio::{placements_for, write_mix},
    background::{Backdrop, pick_random_background},
    config::ReelConfig,
    encode::{EncodeConfig, FfmpegEncoder},
    error::{TilawahError, TilawahResult},
    quran::{
        QuranClient, Reciter, VerseUnitSource, random_reciter, reciter_by_key, surah_name_ar,
        surah_name_en, validate_verse_range, verse_count,
    },
    raster::{RasterCache, SvgTextRasterizer},
    render::{ReelScene, RenderThreading, render_to_encoder},
    sequencer::{AssembledReel, CancelToken, SequencerConfig, UnitSequencer},
    style::ReelStyle,
};

#[derive(Clone, Debug)]
pub struct GenerateRequest {
    pub surah: u32,
    pub start_ayah: u32,
    pub end_ayah: u32,
    pub reciter_key: Option<String>,
    pub output_path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct GeneratedReel {
    pub video_path: PathBuf,
    pub surah: u32,
    /// The range actually rendered; the duration policy may have truncated
    /// or extended the request.
    pub actual_start: u32,
    pub actual_end: u32,
    pub reciter_key: &'static str,
    pub total_duration: f64,
}

/// A fully prepared reel scene, ready to render frames or encode.
pub struct PreparedReel {
    pub scene: ReelScene,
    pub assembled: AssembledReel,
    pub reciter_key: &'static str,
}

/// Fetches and sequences the narration units, then builds the backdrop and
/// all text overlays. Everything after this is pure frame rendering.
#[tracing::instrument(skip(cfg, style, cancel))]
pub fn prepare_reel(
    req: &GenerateRequest,
    cfg: &ReelConfig,
    style: &ReelStyle,
    cancel: &CancelToken,
) -> TilawahResult<PreparedReel> {
    cfg.validate()?;
    let (start, end) = validate_verse_range(req.surah, req.start_ayah, req.end_ayah)?;
    let reciter = resolve_reciter(req.reciter_key.as_deref())?;

    tracing::info!(
        surah = req.surah,
        start,
        end,
        reciter = reciter.key,
        "preparing reel"
    );

    let client = QuranClient::new(&cfg.api_base)?;
    let mut source = VerseUnitSource::new(&client, req.surah, reciter, cfg.audio_dir.clone());
    let seq_cfg = SequencerConfig {
        start_index: start,
        requested_end_index: end,
        max_index: verse_count(req.surah)?,
        min_duration: cfg.min_duration,
        max_content_duration: cfg.max_duration,
        inter_unit_padding: cfg.inter_unit_padding,
        lead_in: cfg.lead_in,
        trailing_buffer: cfg.trailing_buffer,
    };
    let assembled = UnitSequencer::assemble(&mut source, &seq_cfg, cancel)?;

    let backdrop = load_backdrop(cfg, style, assembled.timeline.total_duration)?;
    let raster = SvgTextRasterizer::new(style, cfg.font_path.as_deref())?;
    let mut cache = RasterCache::new();
    let scene = ReelScene::build(
        &assembled.timeline,
        surah_name_ar(req.surah)?,
        backdrop,
        cfg,
        style,
        &raster,
        &mut cache,
    )?;

    Ok(PreparedReel {
        scene,
        assembled,
        reciter_key: reciter.key,
    })
}

/// Generates one complete reel: sequence the narration units, mix the audio
/// track, and render + encode the final MP4.
///
/// Fetch failures abort the reel; rendering failures degrade the affected
/// unit and keep going.
pub fn generate_reel(
    req: &GenerateRequest,
    cfg: &ReelConfig,
    style: &ReelStyle,
    cancel: &CancelToken,
) -> TilawahResult<GeneratedReel> {
    let prepared = prepare_reel(req, cfg, style, cancel)?;
    let total_duration = prepared.assembled.timeline.total_duration;

    // Narration track, mixed into a temp file consumed by the encoder.
    std::fs::create_dir_all(&cfg.audio_dir)
        .with_context(|| format!("create audio dir '{}'", cfg.audio_dir.display()))?;
    let mix_file = tempfile::Builder::new()
        .prefix("mix_")
        .suffix(".m4a")
        .tempfile_in(&cfg.audio_dir)
        .context("create temp audio file")?;
    let placements = placements_for(&prepared.assembled.timeline, style.audio_fade);
    write_mix(&placements, total_duration, mix_file.path())?;

    let video_path = match &req.output_path {
        Some(path) => path.clone(),
        None => default_output_path(
            cfg,
            req.surah,
            prepared.assembled.actual_start_index,
            prepared.assembled.actual_end_index,
        )?,
    };
    let encoder = FfmpegEncoder::new(
        EncodeConfig {
            canvas: cfg.canvas,
            fps: cfg.fps,
            out_path: video_path.clone(),
            audio_path: Some(mix_file.path().to_path_buf()),
            total_duration,
            overwrite: true,
        },
        [0, 0, 0, 255],
    )?;
    render_to_encoder(&prepared.scene, cfg.fps, encoder, &RenderThreading::default())?;

    tracing::info!(video = %video_path.display(), "reel generated");
    Ok(GeneratedReel {
        video_path,
        surah: req.surah,
        actual_start: prepared.assembled.actual_start_index,
        actual_end: prepared.assembled.actual_end_index,
        reciter_key: prepared.reciter_key,
        total_duration,
    })
}

fn resolve_reciter(key: Option<&str>) -> TilawahResult<&'static Reciter> {
    match key {
        Some(key) => reciter_by_key(key)
            .ok_or_else(|| TilawahError::validation(format!("unknown reciter '{key}'"))),
        None => {
            let reciter = random_reciter();
            tracing::info!(reciter = reciter.key, "randomly selected reciter");
            Ok(reciter)
        }
    }
}

fn load_backdrop(cfg: &ReelConfig, style: &ReelStyle, duration: f64) -> TilawahResult<Backdrop> {
    match &cfg.background {
        Some(path) if path.is_dir() => {
            let picked = pick_random_background(path)?;
            Backdrop::from_image(&picked, cfg.canvas, duration, style)
        }
        Some(path) => Backdrop::from_image(path, cfg.canvas, duration, style),
        None => Ok(Backdrop::solid(cfg.canvas, [15, 15, 25], duration)),
    }
}

fn default_output_path(
    cfg: &ReelConfig,
    surah: u32,
    start: u32,
    end: u32,
) -> TilawahResult<PathBuf> {
    let range = if start == end {
        start.to_string()
    } else {
        format!("{start}-{end}")
    };
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let name = surah_name_en(surah)?;
    Ok(cfg
        .videos_dir
        .join(format!("QuranReel_{surah:03}_{name}_{range}_{timestamp}.mp4")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_reciter_accepts_known_keys() {
        assert_eq!(resolve_reciter(Some("sudais")).unwrap().key, "sudais");
        assert!(resolve_reciter(Some("unknown")).is_err());
        // Random selection always lands on a registered reciter.
        let r = resolve_reciter(None).unwrap();
        assert!(reciter_by_key(r.key).is_some());
    }

    #[test]
    fn default_output_path_encodes_the_range() {
        let cfg = ReelConfig::default();
        let single = default_output_path(&cfg, 112, 1, 1).unwrap();
        let name = single.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("QuranReel_112_Al-Ikhlas_1_"));

        let ranged = default_output_path(&cfg, 18, 1, 10).unwrap();
        let name = ranged.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.contains("_1-10_"));
    }

    #[test]
    fn solid_backdrop_is_used_without_configuration() {
        let cfg = ReelConfig::default();
        let backdrop = load_backdrop(&cfg, &ReelStyle::default(), 10.0).unwrap();
        let frame = backdrop.frame_at(0.0);
        assert_eq!(frame.get(0, 0), [15, 15, 25, 255]);
    }
}
