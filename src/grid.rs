use std::ops::RangeInclusive;

use crate::math::rotate;

/// Affine map between pixel space and the rotated, scaled lattice of dot centers.
///
/// Integer lattice coordinates `(u, v)` are dot centers; `to_pixel` and `to_lattice` are exact
/// inverses up to rounding.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GridTransform {
    pitch: f64,
    origin: (f64, f64),
    sin_cos: (f64, f64),
}

impl GridTransform {
    /// `angle` is in degrees. `pitch` must be positive.
    pub fn new(pitch: f64, angle: f64, origin: (f64, f64)) -> Self {
        GridTransform {
            pitch,
            origin,
            sin_cos: angle.to_radians().sin_cos(),
        }
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn origin(&self) -> (f64, f64) {
        self.origin
    }

    pub fn to_lattice(&self, (x, y): (f64, f64)) -> (f64, f64) {
        let (sin, cos) = self.sin_cos;
        let (u, v) = rotate((x - self.origin.0, y - self.origin.1), (-sin, cos));
        (u / self.pitch, v / self.pitch)
    }

    pub fn to_pixel(&self, (u, v): (f64, f64)) -> (f64, f64) {
        let (x, y) = rotate((u * self.pitch, v * self.pitch), self.sin_cos);
        (x + self.origin.0, y + self.origin.1)
    }

    /// Integer lattice coordinates whose dots can touch a `width × height` image.
    ///
    /// The image rectangle is grown by one pitch on every side, its corners are mapped into
    /// lattice space, and the axis-aligned box around them is returned. This covers the rotated
    /// grid completely whatever the angle.
    pub fn lattice_bounds(&self, width: usize, height: usize) -> LatticeBounds {
        let (w, h, p) = (width as f64, height as f64, self.pitch);
        let corners = [(-p, -p), (w + p, -p), (w + p, h + p), (-p, h + p)].map(|c| self.to_lattice(c));
        let (mut lower, mut upper) = (corners[0], corners[0]);
        for &(u, v) in &corners[1..] {
            lower = (lower.0.min(u), lower.1.min(v));
            upper = (upper.0.max(u), upper.1.max(v));
        }
        LatticeBounds {
            u: lower.0.ceil() as i64..=upper.0.floor() as i64,
            v: lower.1.ceil() as i64..=upper.1.floor() as i64,
        }
    }
}

/// Rectangle of integer lattice coordinates, visited row by row in `u`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatticeBounds {
    pub u: RangeInclusive<i64>,
    pub v: RangeInclusive<i64>,
}

impl LatticeBounds {
    fn span(range: &RangeInclusive<i64>) -> usize {
        if range.is_empty() {
            0
        } else {
            (range.end() - range.start()) as usize + 1
        }
    }

    pub fn len(&self) -> usize {
        Self::span(&self.u) * Self::span(&self.v)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `index`-th coordinate in iteration order, if any.
    pub fn get(&self, index: usize) -> Option<(i64, i64)> {
        let rows = Self::span(&self.v);
        if index >= self.len() {
            return None;
        }
        let u = *self.u.start() + (index / rows) as i64;
        let v = *self.v.start() + (index % rows) as i64;
        Some((u, v))
    }
}
