use std::path::{Path, PathBuf};

use anyhow::Context as _;
use image::{RgbaImage, imageops};
use rand::seq::SliceRandom as _;

use crate::{
    compose::over,
    core::{Canvas, PixelBuffer, premultiply},
    error::{TilawahError, TilawahResult},
    style::ReelStyle,
};

const STILL_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// The graded background of a reel. Built once; per-frame queries are pure
/// functions of `t` (Ken Burns is a deterministic zoom ramp).
pub struct Backdrop {
    base: RgbaImage,
    canvas: Canvas,
    duration: f64,
    ken_burns_zoom: Option<f64>,
}

impl Backdrop {
    /// Loads a still, cover-fits it to the canvas and bakes in the color
    /// grade (brightness multiply, then tint overlay).
    pub fn from_image(
        path: &Path,
        canvas: Canvas,
        duration: f64,
        style: &ReelStyle,
    ) -> TilawahResult<Self> {
        let img = image::open(path)
            .with_context(|| format!("open background '{}'", path.display()))?
            .to_rgba8();
        let fitted = cover_fit(&img, canvas);
        let base = grade(
            fitted,
            style.background_brightness,
            style.background_tint,
            style.background_tint_opacity,
        );
        tracing::debug!(background = %path.display(), "background loaded");
        Ok(Self {
            base,
            canvas,
            duration,
            ken_burns_zoom: style.ken_burns.then_some(style.ken_burns_zoom),
        })
    }

    /// Flat dark background used when no media is configured.
    pub fn solid(canvas: Canvas, rgb: [u8; 3], duration: f64) -> Self {
        let base = RgbaImage::from_pixel(
            canvas.width,
            canvas.height,
            image::Rgba([rgb[0], rgb[1], rgb[2], 255]),
        );
        Self {
            base,
            canvas,
            duration,
            ken_burns_zoom: None,
        }
    }

    /// The background frame at reel time `t`.
    pub fn frame_at(&self, t: f64) -> PixelBuffer {
        let img = match self.ken_burns_zoom {
            Some(zoom_ratio) if self.duration > 0.0 => {
                let progress = (t / self.duration).clamp(0.0, 1.0);
                let zoom = 1.0 + (zoom_ratio - 1.0) * progress;
                ken_burns_crop(&self.base, zoom)
            }
            _ => self.base.clone(),
        };
        rgba_image_to_premul(img, self.canvas)
    }
}

/// Picks a random still image from `dir`.
pub fn pick_random_background(dir: &Path) -> TilawahResult<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("read backgrounds dir '{}'", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| STILL_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        })
        .collect();
    candidates.sort();

    candidates
        .choose(&mut rand::thread_rng())
        .cloned()
        .ok_or_else(|| {
            TilawahError::validation(format!(
                "no background images found in '{}'",
                dir.display()
            ))
        })
}

/// Scales and center-crops to fill the canvas, preserving aspect ratio.
fn cover_fit(img: &RgbaImage, canvas: Canvas) -> RgbaImage {
    let (sw, sh) = img.dimensions();
    let scale = (f64::from(canvas.width) / f64::from(sw))
        .max(f64::from(canvas.height) / f64::from(sh));
    let new_w = ((f64::from(sw) * scale).ceil() as u32).max(canvas.width);
    let new_h = ((f64::from(sh) * scale).ceil() as u32).max(canvas.height);

    let resized = imageops::resize(img, new_w, new_h, imageops::FilterType::Triangle);
    let x = (new_w - canvas.width) / 2;
    let y = (new_h - canvas.height) / 2;
    imageops::crop_imm(&resized, x, y, canvas.width, canvas.height).to_image()
}

fn grade(mut img: RgbaImage, brightness: f32, tint: [u8; 3], tint_opacity: f32) -> RgbaImage {
    let brightness = brightness.clamp(0.0, 1.0);
    let tint_px = premultiply([
        tint[0],
        tint[1],
        tint[2],
        (tint_opacity.clamp(0.0, 1.0) * 255.0).round() as u8,
    ]);

    for px in img.pixels_mut() {
        let mut p = [
            (f32::from(px[0]) * brightness) as u8,
            (f32::from(px[1]) * brightness) as u8,
            (f32::from(px[2]) * brightness) as u8,
            255,
        ];
        if tint_px[3] > 0 {
            p = over(p, tint_px, 1.0);
        }
        *px = image::Rgba(p);
    }
    img
}

/// Crops a centered window shrunk by `zoom` and scales it back up, the
/// classic slow-zoom framing.
fn ken_burns_crop(img: &RgbaImage, zoom: f64) -> RgbaImage {
    let (w, h) = img.dimensions();
    let win_w = ((f64::from(w) / zoom) as u32).clamp(1, w);
    let win_h = ((f64::from(h) / zoom) as u32).clamp(1, h);
    let x = (w - win_w) / 2;
    let y = (h - win_h) / 2;

    let cropped = imageops::crop_imm(img, x, y, win_w, win_h).to_image();
    imageops::resize(&cropped, w, h, imageops::FilterType::Triangle)
}

fn rgba_image_to_premul(img: RgbaImage, canvas: Canvas) -> PixelBuffer {
    debug_assert_eq!(img.dimensions(), (canvas.width, canvas.height));
    // Background frames are opaque, so straight and premultiplied agree.
    PixelBuffer::from_premul_data(canvas.width, canvas.height, img.into_raw())
        .unwrap_or_else(|_| PixelBuffer::solid(canvas.width, canvas.height, [0, 0, 0, 255]))
}
