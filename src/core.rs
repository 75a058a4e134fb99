use crate::error::{TilawahError, TilawahResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Integer frames-per-second. Reels target plain integer rates (24/30/60).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps(pub u32);

impl Fps {
    pub fn new(fps: u32) -> TilawahResult<Self> {
        if fps == 0 {
            return Err(TilawahError::validation("fps must be > 0"));
        }
        Ok(Self(fps))
    }

    pub fn frame_duration_secs(self) -> f64 {
        1.0 / f64::from(self.0)
    }

    pub fn frame_to_secs(self, frame: u64) -> f64 {
        (frame as f64) / f64::from(self.0)
    }

    pub fn secs_to_frames_ceil(self, secs: f64) -> u64 {
        (secs * f64::from(self.0)).ceil().max(0.0) as u64
    }
}

/// Half-open interval in seconds: `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimeSpan {
    pub start: f64,
    pub end: f64,
}

impl TimeSpan {
    pub fn new(start: f64, end: f64) -> TilawahResult<Self> {
        if !(start.is_finite() && end.is_finite()) || start > end {
            return Err(TilawahError::validation(
                "TimeSpan requires finite start <= end",
            ));
        }
        Ok(Self { start, end })
    }

    pub fn duration(self) -> f64 {
        self.end - self.start
    }

    pub fn contains(self, t: f64) -> bool {
        self.start <= t && t < self.end
    }
}

/// Premultiplied RGBA8 pixel buffer (r,g,b already multiplied by a).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn transparent(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; width as usize * height as usize * 4],
        }
    }

    /// Fills the whole buffer with a straight-alpha color (premultiplied on store).
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let px = premultiply(rgba);
        let mut data = Vec::with_capacity(width as usize * height as usize * 4);
        for _ in 0..(width as usize * height as usize) {
            data.extend_from_slice(&px);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn from_premul_data(width: u32, height: u32, data: Vec<u8>) -> TilawahResult<Self> {
        if data.len() != width as usize * height as usize * 4 {
            return Err(TilawahError::validation(
                "pixel data length must be width*height*4",
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn get(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    pub fn put(&mut self, x: u32, y: u32, px: [u8; 4]) {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.data[i..i + 4].copy_from_slice(&px);
    }
}

pub fn premultiply(rgba: [u8; 4]) -> [u8; 4] {
    fn mul(c: u8, a: u8) -> u8 {
        ((u16::from(c) * u16::from(a) + 127) / 255) as u8
    }
    [
        mul(rgba[0], rgba[3]),
        mul(rgba[1], rgba[3]),
        mul(rgba[2], rgba[3]),
        rgba[3],
    ]
}
