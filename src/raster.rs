use std::{collections::HashMap, path::Path, sync::Arc};

use anyhow::Context as _;
use resvg::tiny_skia;

use crate::{
    compose::{Placed, blit_over},
    core::{PixelBuffer, premultiply},
    error::{TilawahError, TilawahResult},
    style::ReelStyle,
};

/// A request for one rendered text block.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextSpec {
    pub text: String,
    pub font_size: u32,
    pub color: [u8; 4],
    pub words_per_line: usize,
    pub rtl: bool,
}

/// Glyph shaping and rasterization boundary. The engine never inspects
/// glyph-level output; it only positions and blends the returned buffers.
pub trait TextRasterizer: Send + Sync {
    fn rasterize(&self, spec: &TextSpec) -> TilawahResult<PixelBuffer>;
}

/// Uthmani-script small marks (U+06D6..=U+06ED) that common fonts render as
/// boxes. Standard Arabic diacritics are kept.
pub fn clean_uthmani(text: &str) -> String {
    text.chars()
        .filter(|c| !('\u{06D6}'..='\u{06ED}').contains(c))
        .collect()
}

/// Splits into lines of at most `words_per_line` words.
pub fn wrap_words(text: &str, words_per_line: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }
    words
        .chunks(words_per_line.max(1))
        .map(|chunk| chunk.join(" "))
        .collect()
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn hex_rgb(c: [u8; 4]) -> String {
    format!("#{:02X}{:02X}{:02X}", c[0], c[1], c[2])
}

fn opacity_attr(c: [u8; 4], extra: f32) -> f32 {
    (f32::from(c[3]) / 255.0 * extra).clamp(0.0, 1.0)
}

/// Text rasterizer backed by usvg/resvg: the text block is expressed as an
/// SVG document and shaped/rasterized by resvg's text support (system fonts
/// plus an optional bundled font file). Handles RTL paragraphs via the SVG
/// `direction` property.
pub struct SvgTextRasterizer {
    opts: usvg::Options<'static>,
    font_family: String,
    stroke_color: [u8; 4],
    stroke_width: u32,
    shadow_color: [u8; 4],
    shadow_offset: (i32, i32),
    shadow_opacity: f32,
    max_width: u32,
}

impl SvgTextRasterizer {
    pub fn new(style: &ReelStyle, font_path: Option<&Path>) -> TilawahResult<Self> {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        if let Some(path) = font_path {
            db.load_font_file(path)
                .with_context(|| format!("load font file '{}'", path.display()))?;
        }
        tracing::debug!(faces = db.faces().count(), "font database ready");

        let opts = usvg::Options {
            font_family: style.font_family.clone(),
            fontdb: Arc::new(db),
            ..usvg::Options::default()
        };

        Ok(Self {
            opts,
            font_family: style.font_family.clone(),
            stroke_color: style.stroke_color,
            stroke_width: style.stroke_width,
            shadow_color: style.shadow_color,
            shadow_offset: style.shadow_offset,
            shadow_opacity: style.shadow_opacity,
            max_width: style.text_max_width,
        })
    }

    fn svg_doc(&self, spec: &TextSpec) -> String {
        let lines = wrap_words(&spec.text, spec.words_per_line);
        let fs = f64::from(spec.font_size);
        let line_height = fs * 1.5;
        let pad = f64::from(self.stroke_width)
            + f64::from(self.shadow_offset.0.abs().max(self.shadow_offset.1.abs()))
            + 8.0;
        let width = f64::from(self.max_width) + pad * 2.0;
        let height = lines.len() as f64 * line_height + pad * 2.0;

        let direction = if spec.rtl { " direction=\"rtl\"" } else { "" };
        let (sx, sy) = self.shadow_offset;

        let mut doc = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.0}\" height=\"{height:.0}\">"
        );
        for (i, line) in lines.iter().enumerate() {
            let escaped = xml_escape(line);
            let x = width / 2.0;
            let y = pad + (i as f64) * line_height + fs;

            if self.shadow_opacity > 0.0 {
                doc.push_str(&format!(
                    "<text x=\"{:.1}\" y=\"{:.1}\" font-family=\"{}\" font-size=\"{fs}\" \
                     text-anchor=\"middle\"{direction} fill=\"{}\" fill-opacity=\"{:.3}\">{escaped}</text>",
                    x + f64::from(sx),
                    y + f64::from(sy),
                    xml_escape(&self.font_family),
                    hex_rgb(self.shadow_color),
                    opacity_attr(self.shadow_color, self.shadow_opacity),
                ));
            }

            doc.push_str(&format!(
                "<text x=\"{x:.1}\" y=\"{y:.1}\" font-family=\"{}\" font-size=\"{fs}\" \
                 text-anchor=\"middle\"{direction} fill=\"{}\" fill-opacity=\"{:.3}\" \
                 stroke=\"{}\" stroke-width=\"{}\" paint-order=\"stroke\" \
                 stroke-linejoin=\"round\">{escaped}</text>",
                xml_escape(&self.font_family),
                hex_rgb(spec.color),
                opacity_attr(spec.color, 1.0),
                hex_rgb(self.stroke_color),
                self.stroke_width,
            ));
        }
        doc.push_str("</svg>");
        doc
    }
}

impl TextRasterizer for SvgTextRasterizer {
    fn rasterize(&self, spec: &TextSpec) -> TilawahResult<PixelBuffer> {
        let doc = self.svg_doc(spec);
        let tree = usvg::Tree::from_str(&doc, &self.opts)
            .map_err(|e| TilawahError::render(format!("text svg parse failed: {e}")))?;

        let size = tree.size();
        let (w, h) = (size.width().ceil() as u32, size.height().ceil() as u32);
        let mut pixmap = tiny_skia::Pixmap::new(w.max(1), h.max(1))
            .ok_or_else(|| TilawahError::render("text pixmap allocation failed"))?;
        resvg::render(&tree, tiny_skia::Transform::identity(), &mut pixmap.as_mut());

        let (w, h) = (pixmap.width(), pixmap.height());
        let buf = PixelBuffer::from_premul_data(w, h, pixmap.take())?;
        Ok(trim_transparent(&buf))
    }
}

/// Crops a buffer to its non-transparent content (a fully transparent input
/// collapses to 1x1).
pub fn trim_transparent(buf: &PixelBuffer) -> PixelBuffer {
    let (w, h) = (buf.width(), buf.height());
    let mut min_x = w;
    let mut min_y = h;
    let mut max_x = 0u32;
    let mut max_y = 0u32;

    for y in 0..h {
        for x in 0..w {
            if buf.get(x, y)[3] != 0 {
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }
    }

    if min_x > max_x {
        return PixelBuffer::transparent(1, 1);
    }

    let out_w = max_x - min_x + 1;
    let out_h = max_y - min_y + 1;
    let mut out = PixelBuffer::transparent(out_w, out_h);
    for y in 0..out_h {
        for x in 0..out_w {
            out.put(x, y, buf.get(min_x + x, min_y + y));
        }
    }
    out
}

/// Rasterizes a rounded rectangle with a one-pixel feathered edge.
pub fn rounded_rect(width: u32, height: u32, radius: u32, rgba: [u8; 4]) -> PixelBuffer {
    let radius = f64::from(radius.min(width / 2).min(height / 2));
    let mut out = PixelBuffer::transparent(width, height);
    let (w, h) = (f64::from(width), f64::from(height));

    for y in 0..height {
        for x in 0..width {
            let px = f64::from(x) + 0.5;
            let py = f64::from(y) + 0.5;
            // Distance outside the radius-inset core rectangle.
            let dx = (radius - px).max(px - (w - radius)).max(0.0);
            let dy = (radius - py).max(py - (h - radius)).max(0.0);
            let dist = (dx * dx + dy * dy).sqrt();
            let coverage = (radius - dist + 0.5).clamp(0.0, 1.0);
            if coverage <= 0.0 {
                continue;
            }
            let a = (f64::from(rgba[3]) * coverage).round() as u8;
            out.put(x, y, premultiply([rgba[0], rgba[1], rgba[2], a]));
        }
    }
    out
}

/// Composites a text buffer centered over a rounded-rectangle plate, used
/// for the persistent surah label pill.
pub fn text_on_plate(text: &PixelBuffer, pad_x: u32, pad_y: u32, plate_rgba: [u8; 4]) -> PixelBuffer {
    let w = text.width() + pad_x * 2;
    let h = text.height() + pad_y * 2;
    let mut plate = rounded_rect(w, h, h / 2, plate_rgba);
    blit_over(
        &mut plate,
        &Placed {
            buf: Arc::new(text.clone()),
            x: i64::from(pad_x),
            y: i64::from(pad_y),
        },
        1.0,
    );
    plate
}

/// Explicit render cache keyed by the full text spec. Owned by a single
/// reel-generation run and shared read-only across rendering threads once
/// populated.
#[derive(Default)]
pub struct RasterCache {
    map: HashMap<TextSpec, Arc<PixelBuffer>>,
}

impl RasterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get_or_render(
        &mut self,
        raster: &dyn TextRasterizer,
        spec: &TextSpec,
    ) -> TilawahResult<Arc<PixelBuffer>> {
        if let Some(hit) = self.map.get(spec) {
            return Ok(Arc::clone(hit));
        }
        let rendered = Arc::new(raster.rasterize(spec)?);
        self.map.insert(spec.clone(), Arc::clone(&rendered));
        Ok(rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_uthmani_strips_only_the_uthmani_block() {
        let input = "قَالَ\u{06D6} بِسْمِ\u{06DF}";
        let cleaned = clean_uthmani(input);
        assert!(!cleaned.contains('\u{06D6}'));
        assert!(!cleaned.contains('\u{06DF}'));
        // Standard fatha diacritic survives.
        assert!(cleaned.contains('\u{064E}'));
    }

    #[test]
    fn wrap_words_chunks_by_count() {
        assert_eq!(
            wrap_words("a b c d e", 2),
            vec!["a b".to_string(), "c d".to_string(), "e".to_string()]
        );
        assert!(wrap_words("   ", 3).is_empty());
    }

    #[test]
    fn xml_escape_handles_markup_characters() {
        assert_eq!(xml_escape("a<b&c>\"d'"), "a&lt;b&amp;c&gt;&quot;d&apos;");
    }

    #[test]
    fn trim_collapses_fully_transparent() {
        let buf = PixelBuffer::transparent(8, 8);
        let trimmed = trim_transparent(&buf);
        assert_eq!((trimmed.width(), trimmed.height()), (1, 1));
    }

    #[test]
    fn trim_crops_to_content() {
        let mut buf = PixelBuffer::transparent(8, 8);
        buf.put(2, 3, [255, 255, 255, 255]);
        buf.put(5, 6, [255, 255, 255, 255]);
        let trimmed = trim_transparent(&buf);
        assert_eq!((trimmed.width(), trimmed.height()), (4, 4));
        assert_eq!(trimmed.get(0, 0)[3], 255);
        assert_eq!(trimmed.get(3, 3)[3], 255);
    }

    #[test]
    fn rounded_rect_fills_center_and_clears_corners() {
        let pill = rounded_rect(20, 10, 5, [0, 0, 0, 255]);
        assert_eq!(pill.get(10, 5)[3], 255);
        assert_eq!(pill.get(0, 0)[3], 0);
        assert_eq!(pill.get(19, 0)[3], 0);
    }

    #[test]
    fn text_on_plate_pads_both_axes() {
        let text = PixelBuffer::solid(10, 4, [255, 255, 255, 255]);
        let plated = text_on_plate(&text, 6, 3, [0, 0, 0, 128]);
        assert_eq!((plated.width(), plated.height()), (22, 10));
        // Text pixel sits over the plate.
        assert_eq!(plated.get(11, 5), [255, 255, 255, 255]);
    }

    struct CountingRaster(std::sync::atomic::AtomicUsize);

    impl TextRasterizer for CountingRaster {
        fn rasterize(&self, _spec: &TextSpec) -> TilawahResult<PixelBuffer> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(PixelBuffer::transparent(2, 2))
        }
    }

    #[test]
    fn cache_renders_each_spec_once() {
        let raster = CountingRaster(std::sync::atomic::AtomicUsize::new(0));
        let mut cache = RasterCache::new();
        let spec = TextSpec {
            text: "hello".to_string(),
            font_size: 32,
            color: [255, 255, 255, 255],
            words_per_line: 5,
            rtl: false,
        };

        let a = cache.get_or_render(&raster, &spec).unwrap();
        let b = cache.get_or_render(&raster, &spec).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(raster.0.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn svg_doc_carries_direction_and_stroke() {
        let style = ReelStyle::default();
        let raster = SvgTextRasterizer {
            opts: usvg::Options::default(),
            font_family: style.font_family.clone(),
            stroke_color: style.stroke_color,
            stroke_width: style.stroke_width,
            shadow_color: style.shadow_color,
            shadow_offset: style.shadow_offset,
            shadow_opacity: style.shadow_opacity,
            max_width: style.text_max_width,
        };
        let doc = raster.svg_doc(&TextSpec {
            text: "بسم الله".to_string(),
            font_size: 72,
            color: [255, 255, 255, 255],
            words_per_line: 5,
            rtl: true,
        });
        assert!(doc.contains("direction=\"rtl\""));
        assert!(doc.contains("paint-order=\"stroke\""));
        assert!(doc.contains("font-family=\"Amiri\""));
    }
}
