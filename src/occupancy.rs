//! Ink coverage of a round dot in a square halftone cell, and its tabulated inverse.

use std::collections::{hash_map::Entry::*, HashMap};
use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_4, PI};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::error::{positive, HalftoneError, Result};
use crate::math::{bisect, MAX_BISECTIONS};

/// Number of tone levels in a radius table unless configured otherwise.
pub const DEFAULT_DEPTH: usize = 1 << 16;
/// Largest accepted number of tone levels.
pub const MAX_DEPTH: usize = 1 << 24;

/// Radius at which a dot centered in a `pitch`-sized cell covers the whole cell.
#[inline]
pub fn max_radius(pitch: f64) -> f64 {
    FRAC_1_SQRT_2 * pitch
}

/// Fraction of a `pitch × pitch` cell covered by a centered disk of the given radius.
///
/// Below `pitch / 2` the disk lies entirely inside the cell. Between `pitch / 2` and
/// `pitch / √2` the four cell edges cut a circular segment off each side. Beyond that the cell
/// is fully covered.
pub fn occupancy(pitch: f64, radius: f64) -> f64 {
    if !(radius > 0.0) {
        0.0
    } else if radius < pitch / 2.0 {
        PI * radius * radius / (pitch * pitch)
    } else if radius < max_radius(pitch) {
        let theta = (pitch / (2.0 * radius)).acos();
        (radius / pitch).powi(2) * (PI - 4.0 * theta) + 2.0 * radius * theta.sin() / pitch
    } else {
        1.0
    }
}

/// Maps an intensity in `[0, 1]` to the nearest of `depth` evenly spaced levels.
pub fn quantize(intensity: f64, depth: usize) -> usize {
    let last = depth.saturating_sub(1);
    let scaled = (intensity * last as f64).round();
    if scaled >= last as f64 {
        last
    } else if scaled > 0.0 {
        scaled as usize
    } else {
        0
    }
}

pub(crate) fn check_depth(depth: usize) -> Result<usize> {
    let reason = if depth < 2 {
        "need at least two tone levels"
    } else if depth > MAX_DEPTH {
        "too many tone levels"
    } else {
        return Ok(depth);
    };
    Err(HalftoneError::InvalidParameter {
        name: "depth",
        value: depth as f64,
        reason,
    })
}

/// Dot radius for each of `depth` evenly spaced occupancy levels.
///
/// Entry `i` is the radius whose [`occupancy`] is `i / (depth - 1)`. The table is immutable once
/// built and is meant to be shared between channels behind an [`Arc`].
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusTable {
    pitch: f64,
    radii: Vec<f64>,
}

impl RadiusTable {
    pub fn build(pitch: f64, depth: usize) -> Result<Self> {
        let pitch = positive("pitch", pitch)?;
        let last = check_depth(depth)? - 1;
        let rmax = max_radius(pitch);
        let target = |level: usize| level as f64 / last as f64;

        let mut radii = Vec::with_capacity(depth);
        let mut level = 0;

        // While the dot fits inside the cell, occupancy is just the disk area.
        while level < last && target(level) <= FRAC_PI_4 {
            radii.push(pitch * (target(level) / PI).sqrt());
            level += 1;
        }

        // Past that, solve numerically. Each solve starts from the previous radius, which keeps
        // the table monotonic and the brackets small.
        let mut r = pitch / 2.0;
        while level < last {
            let goal = target(level);
            r = bisect(|x| occupancy(pitch, x) - goal, r, rmax).ok_or(
                HalftoneError::NonConvergence {
                    target: goal,
                    iterations: MAX_BISECTIONS,
                },
            )?;
            radii.push(r);
            level += 1;
        }
        radii.push(rmax);

        debug!(pitch, depth, "built radius table");
        Ok(RadiusTable { pitch, radii })
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn depth(&self) -> usize {
        self.radii.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.radii
    }

    /// Table index for an intensity; see [`quantize`].
    pub fn level(&self, intensity: f64) -> usize {
        quantize(intensity, self.depth())
    }

    /// Radius for a table index. Indices past the end saturate at full coverage.
    pub fn radius(&self, level: usize) -> f64 {
        match self.radii.get(level) {
            Some(&r) => r,
            None => max_radius(self.pitch),
        }
    }

    /// Radius of the dot that encodes `intensity`.
    pub fn radius_for(&self, intensity: f64) -> f64 {
        self.radius(self.level(intensity))
    }
}

/// Radius tables keyed by `(pitch, depth)`, each built at most once.
///
/// Construction happens while holding the lock, so concurrent callers asking for the same key
/// wait for a single build and then share its result. A failed build inserts nothing.
#[derive(Debug, Default)]
pub struct RadiusTableCache {
    tables: Mutex<HashMap<(u64, usize), Arc<RadiusTable>>>,
}

impl RadiusTableCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pitch: f64, depth: usize) -> Result<Arc<RadiusTable>> {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        match tables.entry((pitch.to_bits(), depth)) {
            Occupied(o) => {
                debug!(pitch, depth, "radius table cache hit");
                Ok(Arc::clone(o.get()))
            }
            Vacant(v) => {
                let table = Arc::new(RadiusTable::build(pitch, depth)?);
                Ok(Arc::clone(v.insert(table)))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_occupancy_endpoints() {
        for pitch in [0.5, 1.0, 4.0, 17.25] {
            assert_eq!(occupancy(pitch, 0.0), 0.0);
            assert_eq!(occupancy(pitch, -1.0), 0.0);
            assert_eq!(occupancy(pitch, max_radius(pitch)), 1.0);
            assert_eq!(occupancy(pitch, 10.0 * pitch), 1.0);
        }
    }

    #[test]
    fn test_occupancy_regimes() {
        const TEST_CASES: &[(f64, f64, f64)] = &[
            // (pitch, radius, occupancy)
            (4.0, 1.0, PI / 16.0),
            (2.0, 1.0, FRAC_PI_4),
            (10.0, 5.0, FRAC_PI_4),
        ];
        for &(pitch, radius, want) in TEST_CASES {
            let got = occupancy(pitch, radius);
            if (got - want).abs() > 1e-12 {
                panic!("occupancy({}, {}): got {}, want {}", pitch, radius, got, want);
            }
        }
        // Continuous where the clipped branch takes over and where it saturates.
        let pitch = 3.0;
        let below = occupancy(pitch, pitch / 2.0 - 1e-9);
        let above = occupancy(pitch, pitch / 2.0 + 1e-9);
        assert!((below - above).abs() < 1e-6, "{} vs {}", below, above);
        let near_full = occupancy(pitch, max_radius(pitch) - 1e-9);
        assert!((near_full - 1.0).abs() < 1e-6, "{}", near_full);
    }

    #[test]
    fn test_occupancy_monotonic() {
        let pitch = 6.0;
        let steps = 10_000;
        let mut previous = 0.0;
        for i in 0..=steps {
            let r = max_radius(pitch) * i as f64 / steps as f64;
            let o = occupancy(pitch, r);
            if o < previous || !(0.0..=1.0).contains(&o) {
                panic!("occupancy({}, {}) = {} after {}", pitch, r, o, previous);
            }
            previous = o;
        }
    }

    #[test]
    fn test_quantize() {
        const TEST_CASES: &[(f64, usize, usize)] = &[
            (0.0, 256, 0),
            (1.0, 256, 255),
            (128.0 / 255.0, 256, 128),
            (0.5, 3, 1),
            (-0.25, 256, 0),
            (1.75, 256, 255),
            (f64::NAN, 256, 0),
            (0.499, 2, 0),
            (0.5, 2, 1),
        ];
        for &(intensity, depth, want) in TEST_CASES {
            let got = quantize(intensity, depth);
            if got != want {
                panic!("quantize({}, {}): got {}, want {}", intensity, depth, got, want);
            }
        }
    }

    #[test]
    fn test_radius_table_inverts_occupancy() {
        for (pitch, depth) in [(4.0, 256), (7.5, 1000), (1.0, 2), (2.0, 3)] {
            let table = RadiusTable::build(pitch, depth).unwrap();
            let radii = table.as_slice();
            assert_eq!(radii.len(), depth);
            assert_eq!(radii[0], 0.0);
            assert_eq!(radii[depth - 1], max_radius(pitch));
            for (i, pair) in radii.windows(2).enumerate() {
                if pair[1] < pair[0] {
                    panic!("pitch {} depth {}: radii[{}] > radii[{}]", pitch, depth, i, i + 1);
                }
            }
            for (i, &r) in radii.iter().enumerate() {
                let want = i as f64 / (depth - 1) as f64;
                let got = occupancy(pitch, r);
                if (got - want).abs() > 1e-9 {
                    panic!("pitch {} depth {}: occupancy(table[{}]) = {}, want {}", pitch, depth, i, got, want);
                }
            }
        }
    }

    #[test]
    fn test_radius_table_lookup() {
        let table = RadiusTable::build(4.0, 256).unwrap();
        assert_eq!(table.depth(), 256);
        assert_eq!(table.pitch(), 4.0);
        assert_eq!(table.radius_for(128.0 / 255.0), table.as_slice()[128]);
        assert_eq!(table.radius_for(2.0), max_radius(4.0));
        assert_eq!(table.radius_for(-2.0), 0.0);
        assert_eq!(table.radius(100_000), max_radius(4.0));
    }

    #[test]
    fn test_radius_table_rejects_bad_parameters() {
        let cases = [
            (0.0, 256, "pitch"),
            (-3.0, 256, "pitch"),
            (4.0, 1, "depth"),
            (4.0, 0, "depth"),
            (4.0, MAX_DEPTH + 1, "depth"),
            (4.0, usize::MAX, "depth"),
        ];
        for (pitch, depth, name) in cases {
            match RadiusTable::build(pitch, depth) {
                Err(HalftoneError::InvalidParameter { name: got, .. }) if got == name => {}
                other => panic!("build({}, {}): got {:?}, want InvalidParameter({})", pitch, depth, other, name),
            }
        }
    }

    #[test]
    fn test_cache_builds_once() {
        let cache = RadiusTableCache::new();
        assert!(cache.is_empty());
        let a = cache.get(4.0, 256).unwrap();
        let b = cache.get(4.0, 256).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let c = cache.get(4.0, 512).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_cache_ignores_failed_builds() {
        let cache = RadiusTableCache::new();
        assert!(cache.get(-1.0, 256).is_err());
        assert!(cache.get(4.0, 1).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_shared_across_threads() {
        let cache = RadiusTableCache::new();
        let tables: Vec<Arc<RadiusTable>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4).map(|_| s.spawn(|| cache.get(5.0, 4096).unwrap())).collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for t in &tables[1..] {
            assert!(Arc::ptr_eq(&tables[0], t));
        }
        assert_eq!(cache.len(), 1);
    }
}
