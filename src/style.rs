use serde::{Deserialize, Serialize};

/// Visual styling for a reel. Purely cosmetic; engine timing parameters
/// live in [`crate::config::ReelConfig`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReelStyle {
    pub font_family: String,

    pub font_color: [u8; 4],
    pub page_font_size: u32,
    pub page_words_per_line: usize,
    pub text_max_width: u32,

    pub translation_font_size: u32,
    pub translation_color: [u8; 4],
    /// Vertical position of the translation block as a ratio of canvas height.
    pub translation_y_ratio: f64,

    pub ayah_number_font_size: u32,
    pub ayah_number_color: [u8; 4],

    pub surah_label_font_size: u32,
    pub surah_label_bg_opacity: f32,

    pub stroke_color: [u8; 4],
    pub stroke_width: u32,
    pub shadow_color: [u8; 4],
    pub shadow_offset: (i32, i32),
    pub shadow_opacity: f32,

    pub background_brightness: f32,
    pub background_tint: [u8; 3],
    pub background_tint_opacity: f32,
    pub ken_burns: bool,
    pub ken_burns_zoom: f64,

    pub text_fade_in: f64,
    pub text_fade_out: f64,
    pub audio_fade: f64,
}

impl Default for ReelStyle {
    fn default() -> Self {
        Self {
            font_family: "Amiri".to_string(),
            font_color: [255, 255, 255, 255],
            page_font_size: 72,
            page_words_per_line: 5,
            text_max_width: 1000,
            translation_font_size: 36,
            translation_color: [208, 216, 224, 255],
            translation_y_ratio: 0.68,
            ayah_number_font_size: 48,
            ayah_number_color: [212, 175, 55, 255],
            surah_label_font_size: 38,
            surah_label_bg_opacity: 0.45,
            stroke_color: [0, 0, 0, 255],
            stroke_width: 2,
            shadow_color: [0, 0, 0, 255],
            shadow_offset: (2, 2),
            shadow_opacity: 0.7,
            background_brightness: 0.38,
            background_tint: [5, 12, 25],
            background_tint_opacity: 0.40,
            ken_burns: true,
            ken_burns_zoom: 1.06,
            text_fade_in: 0.4,
            text_fade_out: 0.4,
            audio_fade: 0.05,
        }
    }
}

/// Font size and wrap width for a static full-ayah rendering, stepped down
/// as the word count grows.
pub fn font_settings(word_count: usize) -> (u32, usize) {
    match word_count {
        n if n >= 60 => (36, 8),
        n if n >= 40 => (42, 7),
        n if n >= 25 => (52, 6),
        n if n >= 15 => (62, 5),
        _ => (72, 5),
    }
}
