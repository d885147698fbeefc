use std::f32::consts::PI;

use raqote::{DrawOptions, DrawTarget, PathBuilder, SolidSource, Source};
use rayon::prelude::*;

use crate::channel::Channel;
use crate::dots::Dot;
use crate::error::{HalftoneError, Result};
use crate::occupancy::RadiusTable;

/// Ink is drawn as opaque white on an opaque black background, so the green component of the
/// canvas reads back directly as ink coverage.
const INK: SolidSource = SolidSource {
    r: 0xff,
    g: 0xff,
    b: 0xff,
    a: 0xff,
};
const PAPER: SolidSource = SolidSource {
    r: 0,
    g: 0,
    b: 0,
    a: 0xff,
};

/// Canvas samples per output pixel along each axis.
const SUPERSAMPLE: usize = 4;
/// Output rows rendered by one canvas.
const STRIP_ROWS: usize = 32;

/// Size of the output raster for an input of `width × height` scaled by `scale`.
pub fn output_size(width: usize, height: usize, scale: f64) -> Result<(usize, usize)> {
    let w = (width as f64 * scale).round();
    let h = (height as f64 * scale).round();
    if !(w >= 1.0 && h >= 1.0 && w <= i32::MAX as f64 && h <= i32::MAX as f64) {
        return Err(HalftoneError::InvalidParameter {
            name: "scale",
            value: scale,
            reason: "output image would be empty or too large",
        });
    }
    Ok((w as usize, h as usize))
}

/// A dot in output pixel units.
#[derive(Debug, Copy, Clone)]
struct Disc {
    x: f64,
    y: f64,
    r: f64,
}

/// Paints anti-aliased round dots onto a single-band canvas.
///
/// Dot centers are given in input pixel space and scaled on the way in; dot sizes come from the
/// radius table, scaled the same way. Dots are collected by [`draw`](Self::draw) and painted by
/// [`finish`](Self::finish), which renders horizontal strips at [`SUPERSAMPLE`] times the output
/// resolution and box-averages them down, so that edge coverage sums to the dot area.
pub struct Rasterizer<'t> {
    table: &'t RadiusTable,
    scale: f64,
    width: usize,
    height: usize,
    discs: Vec<Disc>,
}

impl<'t> Rasterizer<'t> {
    /// A blank canvas for an input of `width × height`.
    pub fn new(table: &'t RadiusTable, width: usize, height: usize, scale: f64) -> Result<Self> {
        let (w, h) = output_size(width, height, scale)?;
        if w > i32::MAX as usize / SUPERSAMPLE {
            return Err(HalftoneError::InvalidParameter {
                name: "scale",
                value: scale,
                reason: "output image is too wide to render",
            });
        }
        Ok(Rasterizer {
            table,
            scale,
            width: w,
            height: h,
            discs: Vec::new(),
        })
    }

    /// Output radius of the dot drawn for `dot`.
    pub fn radius(&self, dot: &Dot) -> f64 {
        self.table.radius_for(dot.intensity) * self.scale
    }

    pub fn draw(&mut self, dot: &Dot) {
        let r = self.radius(dot);
        if !(r > 0.0) {
            return;
        }
        let (x, y) = (dot.x * self.scale, dot.y * self.scale);
        let (w, h) = (self.width as f64, self.height as f64);
        if x + r <= 0.0 || y + r <= 0.0 || x - r >= w || y - r >= h {
            return;
        }
        self.discs.push(Disc { x, y, r });
    }

    /// Ink coverage of every output pixel, in `[0, 1]`.
    pub fn finish(self) -> Channel {
        let strips = (self.height + STRIP_ROWS - 1) / STRIP_ROWS;
        let mut buckets: Vec<Vec<Disc>> = vec![Vec::new(); strips];
        let rows = STRIP_ROWS as f64;
        for disc in &self.discs {
            let first = (((disc.y - disc.r).max(0.0) / rows) as usize).min(strips - 1);
            let last = (((disc.y + disc.r) / rows) as usize).min(strips - 1);
            for bucket in &mut buckets[first..=last] {
                bucket.push(*disc);
            }
        }
        let data = buckets
            .par_iter()
            .enumerate()
            .map(|(strip, discs)| self.render_strip(strip * STRIP_ROWS, discs))
            .collect::<Vec<Vec<f32>>>()
            .concat();
        Channel::from_vec(self.width, self.height, data)
            .unwrap_or_else(|_| Channel::filled(self.width, self.height, 0.0))
    }

    /// Coverage of the output rows starting at `top`, row-major.
    fn render_strip(&self, top: usize, discs: &[Disc]) -> Vec<f32> {
        let k = SUPERSAMPLE;
        let rows = STRIP_ROWS.min(self.height - top);
        let canvas_width = self.width * k;
        let mut dt = DrawTarget::new(canvas_width as i32, (rows * k) as i32);
        dt.clear(PAPER);
        let options = DrawOptions::new();
        let ink = Source::Solid(INK);
        let (kf, top) = (k as f64, top as f64);
        for disc in discs {
            let x = (disc.x * kf) as f32;
            let y = ((disc.y - top) * kf) as f32;
            let r = (disc.r * kf) as f32;
            let mut pb = PathBuilder::new();
            pb.move_to(x + r, y);
            pb.arc(x, y, r, 0.0, 2.0 * PI);
            pb.close();
            dt.fill(&pb.finish(), &ink, &options);
        }

        let mut sums = vec![0u32; self.width * rows];
        for (sub_row, line) in dt.get_data().chunks_exact(canvas_width).enumerate() {
            let out = &mut sums[(sub_row / k) * self.width..][..self.width];
            for (sub_x, px) in line.iter().enumerate() {
                let [_b, g, _r, _a] = px.to_le_bytes();
                out[sub_x / k] += u32::from(g);
            }
        }
        let full = (255 * k * k) as f32;
        sums.into_iter().map(|s| s as f32 / full).collect()
    }
}
