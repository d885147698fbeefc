//! Continuous-domain sampling of a [`Channel`] at arbitrary sub-pixel positions.
//!
//! Pixel `(i, j)` is treated as a sample located at its center `(i + 0.5, j + 0.5)`. Every
//! kernel here is separable: the 2-D weight of a tap is the product of the 1-D weights of its
//! horizontal and vertical distances from the sampling point.

use std::f64::consts::PI;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::error::{HalftoneError, Result};

#[derive(Debug, Default, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resampler {
    /// The pixel containing the point, without interpolation.
    Nearest,
    /// Bilinear: triangular window with a support of one pixel.
    #[default]
    Linear,
    /// Windowed sinc with a support of two pixels.
    Lanczos2,
    /// Windowed sinc with a support of three pixels.
    Lanczos3,
    /// Piecewise cubic spline with a support of three pixels.
    Spline36,
}

/// A separable interpolation kernel: its support radius in pixels and its 1-D weight function.
#[derive(Copy, Clone)]
struct Kernel {
    radius: i64,
    weight: fn(f64) -> f64,
}

impl Resampler {
    pub const ALL: [Resampler; 5] = [
        Resampler::Nearest,
        Resampler::Linear,
        Resampler::Lanczos2,
        Resampler::Lanczos3,
        Resampler::Spline36,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Resampler::Nearest => "nearest",
            Resampler::Linear => "linear",
            Resampler::Lanczos2 => "lanczos2",
            Resampler::Lanczos3 => "lanczos3",
            Resampler::Spline36 => "spline36",
        }
    }

    fn kernel(self) -> Option<Kernel> {
        let (radius, weight): (i64, fn(f64) -> f64) = match self {
            Resampler::Nearest => return None,
            Resampler::Linear => (1, linear),
            Resampler::Lanczos2 => (2, lanczos2),
            Resampler::Lanczos3 => (3, lanczos3),
            Resampler::Spline36 => (3, spline36),
        };
        Some(Kernel { radius, weight })
    }

    /// Estimates the intensity at `(x, y)`, clamped to `[0, 1]`.
    ///
    /// Taps that fall outside the raster are mirrored back inside, so any coordinate is valid.
    pub fn sample(self, channel: &Channel, x: f64, y: f64) -> f64 {
        let nearest = || f64::from(channel.pixel_reflected(x, y)).clamp(0.0, 1.0);
        let Kernel { radius, weight } = match self.kernel() {
            Some(k) => k,
            None => return nearest(),
        };

        // The 2 * radius pixels whose centers can lie within the support around the point.
        let taps = (2 * radius) as usize;
        let first_i = x.round() - radius as f64;
        let first_j = y.round() - radius as f64;
        let mut wx = [0.0f64; 6];
        let mut wy = [0.0f64; 6];
        for k in 0..taps {
            wx[k] = weight(first_i + k as f64 + 0.5 - x);
            wy[k] = weight(first_j + k as f64 + 0.5 - y);
        }

        let mut total = 0.0;
        let mut norm = 0.0;
        for (b, &weight_y) in wy[..taps].iter().enumerate() {
            let j = first_j + b as f64 + 0.5;
            for (a, &weight_x) in wx[..taps].iter().enumerate() {
                let i = first_i + a as f64 + 0.5;
                let w = weight_x * weight_y;
                total += w * f64::from(channel.pixel_reflected(i, j));
                norm += w;
            }
        }
        if !(norm.abs() > 1e-12) || !total.is_finite() {
            return nearest();
        }
        (total / norm).clamp(0.0, 1.0)
    }
}

fn linear(t: f64) -> f64 {
    let d = t.abs();
    if d < 1.0 {
        1.0 - d
    } else {
        0.0
    }
}

/// Normalized sinc, `sin(πx) / (πx)`.
fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        let pi_x = PI * x;
        pi_x.sin() / pi_x
    }
}

fn lanczos(t: f64, n: f64) -> f64 {
    if t.abs() < n {
        sinc(t) * sinc(t / n)
    } else {
        0.0
    }
}

fn lanczos2(t: f64) -> f64 {
    lanczos(t, 2.0)
}

fn lanczos3(t: f64) -> f64 {
    lanczos(t, 3.0)
}

/// Spline36 as published with the Panorama Tools / AviSynth resizers.
fn spline36(t: f64) -> f64 {
    let d = t.abs();
    if d <= 1.0 {
        (((247.0 * d - 453.0) * d - 3.0) * d + 209.0) / 209.0
    } else if d <= 2.0 {
        (((-114.0 * d + 612.0) * d - 1038.0) * d + 540.0) / 209.0
    } else if d <= 3.0 {
        (((19.0 * d - 159.0) * d + 434.0) * d - 384.0) / 209.0
    } else {
        0.0
    }
}

impl FromStr for Resampler {
    type Err = HalftoneError;
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        Resampler::ALL
            .into_iter()
            .find(|r| r.name() == lower)
            .ok_or_else(|| HalftoneError::UnknownResampler(s.into()))
    }
}

impl Display for Resampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard() -> Channel {
        Channel::from_fn(7, 5, |x, y| if (x + y) % 2 == 0 { 1.0 } else { 0.0 })
    }

    fn ramp() -> Channel {
        Channel::from_fn(6, 4, |x, y| (x * 4 + y) as f32 / 23.0)
    }

    #[test]
    fn test_empty_channel_samples_zero() {
        let empty = Channel::filled(0, 4, 0.5);
        for resampler in Resampler::ALL {
            let got = resampler.sample(&empty, 0.0, 1.0);
            if got != 0.0 {
                panic!("{}: got {}", resampler, got);
            }
        }
    }

    #[test]
    fn test_parse() {
        for r in Resampler::ALL {
            assert_eq!(r.name().parse::<Resampler>(), Ok(r));
            assert_eq!(r.to_string(), r.name());
        }
        assert_eq!("Lanczos3".parse::<Resampler>(), Ok(Resampler::Lanczos3));
        assert_eq!(
            "bicubic".parse::<Resampler>(),
            Err(HalftoneError::UnknownResampler("bicubic".into()))
        );
    }

    #[test]
    fn test_kernel_values() {
        const TEST_CASES: &[(fn(f64) -> f64, f64, f64)] = &[
            (linear, 0.0, 1.0),
            (linear, 0.25, 0.75),
            (linear, -1.0, 0.0),
            (lanczos2, 0.0, 1.0),
            (lanczos2, 2.0, 0.0),
            (lanczos3, 3.5, 0.0),
            (spline36, 0.0, 1.0),
            (spline36, 1.0, 0.0),
            (spline36, 2.0, 0.0),
            (spline36, 3.0, 0.0),
        ];
        for (i, &(kernel, t, want)) in TEST_CASES.iter().enumerate() {
            let got = kernel(t);
            if (got - want).abs() > 1e-12 {
                panic!("case {}: kernel({}): got {}, want {}", i, t, got, want);
            }
        }
        assert!(lanczos3(1.0).abs() < 1e-15);
        assert!(lanczos2(0.5) > 0.0 && lanczos2(1.5) < 0.0);
    }

    #[test]
    fn test_interpolates_pixel_centers() {
        let c = ramp();
        for r in Resampler::ALL {
            for j in 0..c.height() {
                for i in 0..c.width() {
                    let got = r.sample(&c, i as f64 + 0.5, j as f64 + 0.5);
                    let want = f64::from(c.get(i, j));
                    if (got - want).abs() > 1e-6 {
                        panic!("{}: sample at center of ({}, {}): got {}, want {}", r, i, j, got, want);
                    }
                }
            }
        }
    }

    #[test]
    fn test_uniform_channel() {
        let c = Channel::filled(5, 5, 0.3);
        for r in Resampler::ALL {
            for &(x, y) in &[(0.0, 0.0), (2.3, 1.7), (-4.2, 9.9), (4.999, 0.001)] {
                let got = r.sample(&c, x, y);
                if (got - 0.3).abs() > 1e-6 {
                    panic!("{}: sample({}, {}): got {}, want 0.3", r, x, y, got);
                }
            }
        }
    }

    #[test]
    fn test_linear_blends_neighbours() {
        let c = ramp();
        let got = Resampler::Linear.sample(&c, 1.0, 0.5);
        let want = f64::from(c.get(0, 0) + c.get(1, 0)) / 2.0;
        assert!((got - want).abs() < 1e-6, "got {}, want {}", got, want);
    }

    #[test]
    fn test_nearest_picks_containing_pixel() {
        let c = ramp();
        assert_eq!(Resampler::Nearest.sample(&c, 2.9, 1.1), f64::from(c.get(2, 1)));
        assert_eq!(Resampler::Nearest.sample(&c, -0.4, 0.2), f64::from(c.get(0, 0)));
    }

    #[test]
    fn test_bounded_everywhere() {
        let c = checkerboard();
        let coordinates = [
            (0.0, 0.0),
            (3.25, 2.75),
            (-0.5, 6.5),
            (123.456, -78.9),
            (1e9, 1e9),
            (-1e15, 3.0),
            (f64::NAN, 1.0),
            (2.0, f64::INFINITY),
        ];
        for r in Resampler::ALL {
            for &(x, y) in &coordinates {
                let got = r.sample(&c, x, y);
                if !(0.0..=1.0).contains(&got) {
                    panic!("{}: sample({}, {}) = {}, outside [0, 1]", r, x, y, got);
                }
            }
        }
    }

    #[test]
    fn test_mirrors_past_edges() {
        let c = ramp();
        for r in Resampler::ALL {
            let inside = r.sample(&c, 0.7, 1.3);
            let mirrored = r.sample(&c, -0.7, 1.3);
            if (inside - mirrored).abs() > 1e-6 {
                panic!("{}: {} inside vs {} mirrored", r, inside, mirrored);
            }
        }
    }
}
