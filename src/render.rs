use rayon::prelude::*;

use crate::{
    background::Backdrop,
    compose::{TimedLayer, render_frame},
    config::ReelConfig,
    core::{Fps, PixelBuffer},
    encode::FfmpegEncoder,
    error::TilawahResult,
    layers::{StaticLayer, UnitOverlay, build_fallback_overlay, build_unit_overlay, surah_label_layer},
    raster::{RasterCache, TextRasterizer},
    sequencer::ReelTimeline,
    style::ReelStyle,
};

/// Frame-loop threading. Frames are pure functions of `t`, so disjoint
/// chunks render in parallel and are fed to the encoder in order.
#[derive(Clone, Debug)]
pub struct RenderThreading {
    pub parallel: bool,
    pub chunk_size: usize,
}

impl Default for RenderThreading {
    fn default() -> Self {
        Self {
            parallel: true,
            chunk_size: 64,
        }
    }
}

/// Everything needed to render any frame of the reel: the graded backdrop,
/// one overlay set per unit, and the persistent surah label. Read-only once
/// built; shared across rendering threads without locking.
pub struct ReelScene {
    backdrop: Backdrop,
    overlays: Vec<UnitOverlay>,
    label: Option<StaticLayer>,
    total_duration: f64,
}

impl ReelScene {
    /// Builds per-unit overlays up front. A unit whose paged overlay fails
    /// degrades to its plain full-text rendering; other units are
    /// unaffected. A failed surah label is dropped with a warning.
    #[tracing::instrument(skip_all)]
    pub fn build(
        timeline: &ReelTimeline,
        surah_name: &str,
        backdrop: Backdrop,
        cfg: &ReelConfig,
        style: &ReelStyle,
        raster: &dyn TextRasterizer,
        cache: &mut RasterCache,
    ) -> TilawahResult<Self> {
        let mut overlays = Vec::with_capacity(timeline.units.len());
        for unit in &timeline.units {
            let overlay = match build_unit_overlay(unit, cfg, style, raster, cache) {
                Ok(overlay) => overlay,
                Err(e) => {
                    tracing::warn!(
                        unit = unit.unit_id,
                        error = %e,
                        "paged overlay failed, falling back to static text"
                    );
                    build_fallback_overlay(unit, cfg, style, raster, cache)?
                }
            };
            overlays.push(overlay);
        }

        let label = match surah_label_layer(
            surah_name,
            timeline.total_duration,
            cfg.canvas,
            style,
            raster,
            cache,
        ) {
            Ok(layer) => Some(layer),
            Err(e) => {
                tracing::warn!(error = %e, "surah label failed, omitting");
                None
            }
        };

        tracing::debug!(
            overlays = overlays.len(),
            cached_renders = cache.len(),
            "reel scene built"
        );
        Ok(Self {
            backdrop,
            overlays,
            label,
            total_duration: timeline.total_duration,
        })
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    fn overlay_at(&self, t: f64) -> Option<&UnitOverlay> {
        self.overlays
            .iter()
            .find(|o| o.start_time_in_reel <= t && t < o.segment_end)
    }

    /// Renders the frame at reel time `t`. Pure: no state is carried
    /// between calls.
    pub fn frame_at(&self, t: f64) -> PixelBuffer {
        let background = self.backdrop.frame_at(t);

        let mut layers: Vec<TimedLayer<'_>> = Vec::with_capacity(8);
        if let Some(overlay) = self.overlay_at(t) {
            for layer in &overlay.layers {
                layers.push(TimedLayer {
                    layer: layer.as_ref(),
                    offset: overlay.start_time_in_reel,
                });
            }
        }
        if let Some(label) = &self.label {
            layers.push(TimedLayer {
                layer: label,
                offset: 0.0,
            });
        }

        render_frame(t, &background, &layers)
    }
}

/// Renders the whole reel into `encoder`, chunked so frame rendering can run
/// in parallel while encoding stays sequential.
#[tracing::instrument(skip(scene, encoder))]
pub fn render_to_encoder(
    scene: &ReelScene,
    fps: Fps,
    mut encoder: FfmpegEncoder,
    threading: &RenderThreading,
) -> TilawahResult<()> {
    let total_frames = fps.secs_to_frames_ceil(scene.total_duration()).max(1);
    let chunk_size = threading.chunk_size.max(1) as u64;

    let mut chunk_start = 0u64;
    while chunk_start < total_frames {
        let chunk_end = (chunk_start + chunk_size).min(total_frames);

        let frames: Vec<PixelBuffer> = if threading.parallel {
            (chunk_start..chunk_end)
                .into_par_iter()
                .map(|f| scene.frame_at(fps.frame_to_secs(f)))
                .collect()
        } else {
            (chunk_start..chunk_end)
                .map(|f| scene.frame_at(fps.frame_to_secs(f)))
                .collect()
        };

        for frame in &frames {
            encoder.encode_frame(frame)?;
        }

        tracing::debug!(rendered = chunk_end, total = total_frames, "chunk encoded");
        chunk_start = chunk_end;
    }

    encoder.finish()
}
