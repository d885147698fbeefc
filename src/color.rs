//! Conversions between the gray, RGB and CMYK separations the halftoner works in.
//!
//! Only an approximate device-independent transform lives here. Profile-based conversion is
//! expected to come from outside through [`ColorConverter`].

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::separation::{ColorMode, Separation};

/// Converts a separation into another color mode.
pub trait ColorConverter: Sync {
    fn convert(&self, image: &Separation, to: ColorMode) -> Result<Separation>;
}

/// sRGB transfer function: linear light to encoded value.
pub fn gamma_encode(u: f64) -> f64 {
    if u <= 0.0031308 {
        12.92 * u
    } else {
        1.055 * u.powf(1.0 / 2.4) - 0.055
    }
}

/// Inverse sRGB transfer function: encoded value to linear light.
pub fn gamma_decode(u: f64) -> f64 {
    if u <= 0.04045 {
        u / 12.92
    } else {
        ((u + 0.055) / 1.055).powf(2.4)
    }
}

/// ITU-R BT.601 luma.
pub fn rgb_to_gray([r, g, b]: [f64; 3]) -> f64 {
    0.299 * r + 0.587 * g + 0.114 * b
}

/// Naive RGB ⇄ CMYK conversion with simple black generation.
///
/// Black starts being generated once the darkest component passes `key_threshold`, and reaches
/// full strength at pure black. The remaining ink is split between cyan, magenta and yellow.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaiveTransform {
    /// In `[0, 1]`. A threshold of `1.0` disables black generation.
    pub key_threshold: f64,
    /// Linearize sRGB before separating and re-encode after recombining.
    pub gamma_correction: bool,
}

impl Default for NaiveTransform {
    fn default() -> Self {
        NaiveTransform {
            key_threshold: 0.5,
            gamma_correction: false,
        }
    }
}

impl NaiveTransform {
    pub fn rgb_to_cmyk(&self, rgb: [f64; 3]) -> [f64; 4] {
        let [r, g, b] = if self.gamma_correction {
            rgb.map(gamma_decode)
        } else {
            rgb
        };
        let t = self.key_threshold;
        let darkest = f64::min(1.0 - r, f64::min(1.0 - g, 1.0 - b));
        let k = if t < 1.0 {
            ((darkest - t) / (1.0 - t)).clamp(0.0, 1.0)
        } else {
            0.0
        };
        if (1.0 - k).abs() <= f64::EPSILON {
            return [0.0, 0.0, 0.0, k];
        }
        let ink = |v: f64| ((1.0 - v - k) / (1.0 - k)).clamp(0.0, 1.0);
        [ink(r), ink(g), ink(b), k]
    }

    pub fn cmyk_to_rgb(&self, [c, m, y, k]: [f64; 4]) -> [f64; 3] {
        let light = |v: f64| 1.0 - f64::min(1.0, v * (1.0 - k) + k);
        let rgb = [light(c), light(m), light(y)];
        if self.gamma_correction {
            rgb.map(gamma_encode)
        } else {
            rgb
        }
    }

    fn to_rgb(&self, mode: ColorMode, px: &[f32]) -> [f64; 3] {
        let px: Vec<f64> = px.iter().map(|&v| f64::from(v)).collect();
        match mode {
            ColorMode::Gray => [px[0]; 3],
            ColorMode::Rgb => [px[0], px[1], px[2]],
            ColorMode::Cmyk => self.cmyk_to_rgb([px[0], px[1], px[2], px[3]]),
        }
    }

    fn from_rgb(&self, mode: ColorMode, rgb: [f64; 3]) -> Vec<f32> {
        let out: Vec<f64> = match mode {
            ColorMode::Gray => vec![rgb_to_gray(rgb)],
            ColorMode::Rgb => rgb.to_vec(),
            ColorMode::Cmyk => self.rgb_to_cmyk(rgb).to_vec(),
        };
        out.into_iter().map(|v| v.clamp(0.0, 1.0) as f32).collect()
    }
}

impl ColorConverter for NaiveTransform {
    fn convert(&self, image: &Separation, to: ColorMode) -> Result<Separation> {
        let from = image.mode();
        if from == to {
            return Ok(image.clone());
        }
        Separation::from_pixels(to, image.dimensions(), |x, y| {
            self.from_rgb(to, self.to_rgb(from, &image.pixel(x, y)))
        })
    }
}
