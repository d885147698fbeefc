use crate::channel::Channel;
use crate::grid::{GridTransform, LatticeBounds};
use crate::resample::Resampler;

/// A dot center in pixel space with the intensity sampled there.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Dot {
    pub x: f64,
    pub y: f64,
    pub intensity: f64,
}

/// Lazily walks the lattice over a channel, yielding one [`Dot`] per lattice point near the image.
///
/// Lattice points whose pixel position lies a full pitch or more outside the image are skipped.
/// The sampler only borrows the channel, so several samplers (one per channel) can run side by
/// side.
pub struct DotSampler<'a> {
    channel: &'a Channel,
    resampler: Resampler,
    transform: GridTransform,
    bounds: LatticeBounds,
    cursor: usize,
}

impl<'a> DotSampler<'a> {
    /// Lattice rotated by `angle` degrees about the center of the channel.
    pub fn new(channel: &'a Channel, pitch: f64, angle: f64, resampler: Resampler) -> Self {
        let center = (channel.width() as f64 / 2.0, channel.height() as f64 / 2.0);
        Self::with_transform(channel, GridTransform::new(pitch, angle, center), resampler)
    }

    pub fn with_transform(channel: &'a Channel, transform: GridTransform, resampler: Resampler) -> Self {
        let bounds = transform.lattice_bounds(channel.width(), channel.height());
        DotSampler {
            channel,
            resampler,
            transform,
            bounds,
            cursor: 0,
        }
    }

    pub fn transform(&self) -> &GridTransform {
        &self.transform
    }

    /// Number of lattice points this sampler visits, including those it skips.
    pub fn lattice_len(&self) -> usize {
        self.bounds.len()
    }

    /// Fraction of the lattice visited so far, in `[0, 1]`. Reaches `1.0` once exhausted.
    pub fn progress(&self) -> f64 {
        match self.bounds.len() {
            0 => 1.0,
            total => self.cursor.min(total) as f64 / total as f64,
        }
    }

    fn near_image(&self, (x, y): (f64, f64)) -> bool {
        let pitch = self.transform.pitch();
        let (w, h) = (self.channel.width() as f64, self.channel.height() as f64);
        -pitch < x && x < w + pitch && -pitch < y && y < h + pitch
    }
}

impl Iterator for DotSampler<'_> {
    type Item = Dot;

    fn next(&mut self) -> Option<Dot> {
        while let Some((u, v)) = self.bounds.get(self.cursor) {
            self.cursor += 1;
            let (x, y) = self.transform.to_pixel((u as f64, v as f64));
            if self.near_image((x, y)) {
                let intensity = self.resampler.sample(self.channel, x, y);
                return Some(Dot { x, y, intensity });
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.bounds.len().saturating_sub(self.cursor)))
    }
}
