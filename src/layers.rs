use std::sync::Arc;

use crate::{
    compose::{Layer, LayerFrame, Placed},
    config::ReelConfig,
    core::{Canvas, TimeSpan},
    error::TilawahResult,
    paging::compute_pages,
    raster::{RasterCache, TextRasterizer, TextSpec, clean_uthmani, text_on_plate},
    sequencer::NarrationUnit,
    style::{ReelStyle, font_settings},
    timeline::{FrameQuery, TextTimeline},
    timing::{sort_by_start, validate_timings},
    translation::split_translation,
};

/// Shortest time window a per-page translation overlay may occupy.
const MIN_PAGE_WINDOW_SECS: f64 = 0.1;

/// The accumulating word-by-word text of one unit, crossfading at page
/// transitions. Holds one pre-rendered buffer per timeline state.
pub struct PagedTextLayer {
    timeline: TextTimeline,
    rendered: Vec<Placed>,
}

impl PagedTextLayer {
    pub fn new(timeline: TextTimeline, rendered: Vec<Placed>) -> Self {
        debug_assert_eq!(timeline.states().len(), rendered.len());
        Self { timeline, rendered }
    }
}

impl Layer for PagedTextLayer {
    fn frame_at(&self, t: f64) -> LayerFrame {
        match self.timeline.frame_at(t) {
            FrameQuery::Hidden => LayerFrame::Hidden,
            FrameQuery::Steady(i) => LayerFrame::Single {
                placed: self.rendered[i].clone(),
                opacity: 1.0,
            },
            FrameQuery::Blend {
                outgoing,
                incoming,
                blend,
            } => LayerFrame::Dissolve {
                outgoing: outgoing.map(|i| self.rendered[i].clone()),
                incoming: incoming.map(|i| self.rendered[i].clone()),
                blend,
            },
        }
    }
}

/// A fixed buffer shown during `[start, end)` with fade-in/out opacity ramps
/// at the window edges.
pub struct StaticLayer {
    placed: Placed,
    span: TimeSpan,
    fade_in: f64,
    fade_out: f64,
}

impl StaticLayer {
    pub fn new(placed: Placed, span: TimeSpan, fade_in: f64, fade_out: f64) -> Self {
        Self {
            placed,
            span,
            fade_in,
            fade_out,
        }
    }

    fn opacity_at(&self, t: f64) -> f32 {
        let mut opacity = 1.0f64;
        if self.fade_in > 0.0 {
            opacity = opacity.min(((t - self.span.start) / self.fade_in).clamp(0.0, 1.0));
        }
        if self.fade_out > 0.0 {
            opacity = opacity.min(((self.span.end - t) / self.fade_out).clamp(0.0, 1.0));
        }
        opacity as f32
    }
}

impl Layer for StaticLayer {
    fn frame_at(&self, t: f64) -> LayerFrame {
        if !self.span.contains(t) {
            return LayerFrame::Hidden;
        }
        LayerFrame::Single {
            placed: self.placed.clone(),
            opacity: self.opacity_at(t),
        }
    }
}

/// All overlays of one narration unit, queried in unit-local time.
/// Z-order is slice order: accumulating text, translations, ayah marker.
pub struct UnitOverlay {
    pub layers: Vec<Box<dyn Layer>>,
    pub start_time_in_reel: f64,
    pub segment_end: f64,
}

impl std::fmt::Debug for UnitOverlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOverlay")
            .field("layers", &self.layers.len())
            .field("start_time_in_reel", &self.start_time_in_reel)
            .field("segment_end", &self.segment_end)
            .finish()
    }
}

/// Builds the full paged overlay set for a unit. Any failure here is a
/// render-composition failure; the caller substitutes
/// [`build_fallback_overlay`] so one degraded unit never aborts the reel.
pub fn build_unit_overlay(
    unit: &NarrationUnit,
    cfg: &ReelConfig,
    style: &ReelStyle,
    raster: &dyn TextRasterizer,
    cache: &mut RasterCache,
) -> TilawahResult<UnitOverlay> {
    let canvas = cfg.canvas;
    let duration = unit.display_duration();
    let mut layers: Vec<Box<dyn Layer>> = Vec::new();

    let mut timings = unit.word_timings.clone();
    sort_by_start(&mut timings);
    let word_count = unit.word_texts.len();
    validate_timings(&timings, word_count)?;

    if !timings.is_empty() && word_count > 0 {
        // Accumulating word-by-word text with page crossfades.
        let timeline = TextTimeline::build(
            &timings,
            &unit.word_texts,
            duration,
            cfg.page_size,
            cfg.crossfade,
        );
        let mut rendered = Vec::with_capacity(timeline.states().len());
        for state in timeline.states() {
            let buf = cache.get_or_render(
                raster,
                &TextSpec {
                    text: clean_uthmani(&state.display_text),
                    font_size: style.page_font_size,
                    color: style.font_color,
                    words_per_line: style.page_words_per_line,
                    rtl: true,
                },
            )?;
            rendered.push(Placed::centered(buf, canvas.width, canvas.height, None));
        }
        layers.push(Box::new(PagedTextLayer::new(timeline, rendered)));

        // Translation, split across the page windows.
        if !unit.translation.is_empty() {
            let pages = compute_pages(&timings, word_count, duration, cfg.page_size);
            let segments = split_translation(&unit.translation, &pages, word_count);
            for (page, segment) in pages.iter().zip(&segments) {
                if segment.trim().is_empty() {
                    continue;
                }
                let window_end = page
                    .end_time
                    .max(page.start_time + MIN_PAGE_WINDOW_SECS)
                    .min(duration);
                layers.push(Box::new(translation_layer(
                    segment,
                    page.start_time,
                    window_end,
                    canvas,
                    style,
                    raster,
                    cache,
                )?));
            }
        }
    } else {
        // No word timings: static full text for the whole unit.
        push_static_text_layers(unit, duration, canvas, style, raster, cache, &mut layers)?;
    }

    if unit.unit_id > 0 {
        layers.push(Box::new(ayah_marker_layer(
            unit.unit_id,
            duration,
            canvas,
            style,
            raster,
            cache,
        )?));
    }

    Ok(UnitOverlay {
        layers,
        start_time_in_reel: unit.start_time_in_reel,
        segment_end: unit.segment_end,
    })
}

/// Degraded rendering for a unit whose paged overlay failed: the plain
/// full-ayah text and translation, no accumulation, no crossfade.
pub fn build_fallback_overlay(
    unit: &NarrationUnit,
    cfg: &ReelConfig,
    style: &ReelStyle,
    raster: &dyn TextRasterizer,
    cache: &mut RasterCache,
) -> TilawahResult<UnitOverlay> {
    let duration = unit.display_duration();
    let mut layers: Vec<Box<dyn Layer>> = Vec::new();
    push_static_text_layers(unit, duration, cfg.canvas, style, raster, cache, &mut layers)?;
    Ok(UnitOverlay {
        layers,
        start_time_in_reel: unit.start_time_in_reel,
        segment_end: unit.segment_end,
    })
}

fn push_static_text_layers(
    unit: &NarrationUnit,
    duration: f64,
    canvas: Canvas,
    style: &ReelStyle,
    raster: &dyn TextRasterizer,
    cache: &mut RasterCache,
    layers: &mut Vec<Box<dyn Layer>>,
) -> TilawahResult<()> {
    let text = if unit.text.is_empty() {
        crate::timing::joined_text(&unit.word_texts)
    } else {
        unit.text.clone()
    };
    let (font_size, words_per_line) = font_settings(text.split_whitespace().count());
    let buf = cache.get_or_render(
        raster,
        &TextSpec {
            text: clean_uthmani(&text),
            font_size,
            color: style.font_color,
            words_per_line,
            rtl: true,
        },
    )?;
    layers.push(Box::new(StaticLayer::new(
        Placed::centered(buf, canvas.width, canvas.height, None),
        TimeSpan::new(0.0, duration)?,
        style.text_fade_in,
        style.text_fade_out,
    )));

    if !unit.translation.is_empty() {
        layers.push(Box::new(translation_layer(
            &unit.translation,
            0.0,
            duration,
            canvas,
            style,
            raster,
            cache,
        )?));
    }
    Ok(())
}

fn translation_layer(
    text: &str,
    start: f64,
    end: f64,
    canvas: Canvas,
    style: &ReelStyle,
    raster: &dyn TextRasterizer,
    cache: &mut RasterCache,
) -> TilawahResult<StaticLayer> {
    let words = text.split_whitespace().count();
    // Long translations break into two lines.
    let words_per_line = if words > 12 { words.div_ceil(2) } else { words.max(1) };
    let buf = cache.get_or_render(
        raster,
        &TextSpec {
            text: text.to_string(),
            font_size: style.translation_font_size,
            color: style.translation_color,
            words_per_line,
            rtl: false,
        },
    )?;
    Ok(StaticLayer::new(
        Placed::centered(
            buf,
            canvas.width,
            canvas.height,
            Some(style.translation_y_ratio),
        ),
        TimeSpan::new(start, end)?,
        style.text_fade_in,
        style.text_fade_out,
    ))
}

fn ayah_marker_layer(
    ayah: u32,
    duration: f64,
    canvas: Canvas,
    style: &ReelStyle,
    raster: &dyn TextRasterizer,
    cache: &mut RasterCache,
) -> TilawahResult<StaticLayer> {
    let buf = cache.get_or_render(
        raster,
        &TextSpec {
            text: format!("\u{FD3E} {ayah} \u{FD3F}"),
            font_size: style.ayah_number_font_size,
            color: style.ayah_number_color,
            words_per_line: 10,
            rtl: true,
        },
    )?;
    // Top-right corner with a fixed margin.
    let x = i64::from(canvas.width) - i64::from(buf.width()) - 40;
    let placed = Placed {
        buf,
        x: x.max(0),
        y: 80,
    };
    Ok(StaticLayer::new(placed, TimeSpan::new(0.0, duration)?, 0.3, 0.3))
}

/// The persistent surah label pill at the bottom of the whole reel.
pub fn surah_label_layer(
    surah_name: &str,
    total_duration: f64,
    canvas: Canvas,
    style: &ReelStyle,
    raster: &dyn TextRasterizer,
    cache: &mut RasterCache,
) -> TilawahResult<StaticLayer> {
    let text = cache.get_or_render(
        raster,
        &TextSpec {
            text: clean_uthmani(&format!("سورة {surah_name}")),
            font_size: style.surah_label_font_size,
            color: [255, 255, 255, 255],
            words_per_line: 10,
            rtl: true,
        },
    )?;
    let plate_alpha = (style.surah_label_bg_opacity.clamp(0.0, 1.0) * 255.0).round() as u8;
    let pill = Arc::new(text_on_plate(&text, 40, 16, [0, 0, 0, plate_alpha]));

    let x = (i64::from(canvas.width) - i64::from(pill.width())) / 2;
    let y = i64::from(canvas.height) - i64::from(pill.height()) - 30;
    Ok(StaticLayer::new(
        Placed { buf: pill, x, y },
        TimeSpan::new(0.0, total_duration)?,
        0.0,
        0.0,
    ))
}
