use std::sync::Arc;

use crate::core::PixelBuffer;

/// Premultiplied RGBA8 "over" with an extra opacity factor on the source.
pub fn over(dst: [u8; 4], src: [u8; 4], opacity: f32) -> [u8; 4] {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = add_sat_u8(sa, mul_div255(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = add_sat_u8(sc, dc);
    }
    out
}

/// Channel-wise linear interpolation of two premultiplied pixels.
pub fn crossfade(a: [u8; 4], b: [u8; 4], t: f32) -> [u8; 4] {
    let t = t.clamp(0.0, 1.0);
    let tt = ((t * 255.0).round() as i32).clamp(0, 255) as u16;
    let it = 255u16 - tt;

    let mut out = [0u8; 4];
    for i in 0..4 {
        let av = mul_div255(u16::from(a[i]), it);
        let bv = mul_div255(u16::from(b[i]), tt);
        out[i] = add_sat_u8(av, bv);
    }
    out
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}

/// A buffer positioned on the canvas by its top-left corner. Coordinates may
/// be negative or run off the canvas; blits clip.
#[derive(Clone, Debug)]
pub struct Placed {
    pub buf: Arc<PixelBuffer>,
    pub x: i64,
    pub y: i64,
}

impl Placed {
    /// Centers `buf` horizontally, with its vertical center at
    /// `y_ratio * canvas_height` (or the canvas center when `None`).
    pub fn centered(buf: Arc<PixelBuffer>, canvas_w: u32, canvas_h: u32, y_ratio: Option<f64>) -> Self {
        let x = (i64::from(canvas_w) - i64::from(buf.width())) / 2;
        let y = match y_ratio {
            Some(r) => (f64::from(canvas_h) * r) as i64 - i64::from(buf.height()) / 2,
            None => (i64::from(canvas_h) - i64::from(buf.height())) / 2,
        };
        Self { buf, x, y }
    }

    fn sample(&self, cx: i64, cy: i64) -> [u8; 4] {
        let lx = cx - self.x;
        let ly = cy - self.y;
        if lx < 0 || ly < 0 || lx >= i64::from(self.buf.width()) || ly >= i64::from(self.buf.height())
        {
            return [0, 0, 0, 0];
        }
        self.buf.get(lx as u32, ly as u32)
    }
}

/// Composites `src` over `dst` at its placement, clipped to the canvas.
pub fn blit_over(dst: &mut PixelBuffer, src: &Placed, opacity: f32) {
    if opacity <= 0.0 {
        return;
    }
    let x0 = src.x.max(0);
    let y0 = src.y.max(0);
    let x1 = (src.x + i64::from(src.buf.width())).min(i64::from(dst.width()));
    let y1 = (src.y + i64::from(src.buf.height())).min(i64::from(dst.height()));

    for cy in y0..y1 {
        for cx in x0..x1 {
            let s = src.sample(cx, cy);
            if s[3] == 0 {
                continue;
            }
            let d = dst.get(cx as u32, cy as u32);
            dst.put(cx as u32, cy as u32, over(d, s, opacity));
        }
    }
}

/// Cross-dissolves two placed buffers over `dst`: each covered pixel is the
/// channel-wise interpolation of the outgoing and incoming sources (absent
/// sources read as transparent), composited over the canvas.
pub fn dissolve_over(dst: &mut PixelBuffer, outgoing: Option<&Placed>, incoming: Option<&Placed>, t: f32) {
    let mut x0 = i64::from(dst.width());
    let mut y0 = i64::from(dst.height());
    let mut x1 = 0i64;
    let mut y1 = 0i64;

    for placed in [outgoing, incoming].into_iter().flatten() {
        x0 = x0.min(placed.x);
        y0 = y0.min(placed.y);
        x1 = x1.max(placed.x + i64::from(placed.buf.width()));
        y1 = y1.max(placed.y + i64::from(placed.buf.height()));
    }

    let x0 = x0.max(0);
    let y0 = y0.max(0);
    let x1 = x1.min(i64::from(dst.width()));
    let y1 = y1.min(i64::from(dst.height()));

    for cy in y0..y1 {
        for cx in x0..x1 {
            let a = outgoing.map_or([0, 0, 0, 0], |p| p.sample(cx, cy));
            let b = incoming.map_or([0, 0, 0, 0], |p| p.sample(cx, cy));
            let blended = crossfade(a, b, t);
            if blended[3] == 0 {
                continue;
            }
            let d = dst.get(cx as u32, cy as u32);
            dst.put(cx as u32, cy as u32, over(d, blended, 1.0));
        }
    }
}

/// What a layer contributes at a query time.
#[derive(Clone, Debug)]
pub enum LayerFrame {
    Hidden,
    Single {
        placed: Placed,
        opacity: f32,
    },
    Dissolve {
        outgoing: Option<Placed>,
        incoming: Option<Placed>,
        blend: f32,
    },
}

/// An overlay queried per output frame. Implementations hold only
/// pre-rendered buffers and derived timelines, so queries are pure and
/// safe to run from multiple rendering threads.
pub trait Layer: Send + Sync {
    fn frame_at(&self, t: f64) -> LayerFrame;
}

/// A layer paired with its offset on the reel clock; the layer itself is
/// queried in local time.
pub struct TimedLayer<'a> {
    pub layer: &'a dyn Layer,
    pub offset: f64,
}

/// Pure frame compositor: background first, then every layer in slice order
/// (fixed z-order), each alpha-composited with "over". Holds no state
/// between calls, so disjoint time ranges can be rendered concurrently.
pub fn render_frame(t: f64, background: &PixelBuffer, layers: &[TimedLayer<'_>]) -> PixelBuffer {
    let mut canvas = background.clone();
    for timed in layers {
        match timed.layer.frame_at(t - timed.offset) {
            LayerFrame::Hidden => {}
            LayerFrame::Single { placed, opacity } => {
                blit_over(&mut canvas, &placed, opacity);
            }
            LayerFrame::Dissolve {
                outgoing,
                incoming,
                blend,
            } => {
                dissolve_over(&mut canvas, outgoing.as_ref(), incoming.as_ref(), blend);
            }
        }
    }
    canvas
}
