use std::fmt::Display;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

use crate::error::{HalftoneError, Result};
use crate::math::reflect;

/// A single band of samples in `[0, 1]`, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl Channel {
    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Channel {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Channel {
            width,
            height,
            data,
        }
    }

    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != width * height {
            return Err(HalftoneError::DimensionMismatch {
                expected: (width, height),
                actual: (data.len(), 1),
            });
        }
        Ok(Channel {
            width,
            height,
            data,
        })
    }

    /// Converts 8-bit samples, mapping `0..=255` onto `[0, 1]`.
    pub fn from_luma8(image: &GrayImage) -> Self {
        Channel {
            width: image.width() as usize,
            height: image.height() as usize,
            data: image.as_raw().iter().map(|&v| f32::from(v) / 255.0).collect(),
        }
    }

    pub fn to_luma8(&self) -> GrayImage {
        let raw = self.data.iter().map(|&v| to_byte(v)).collect();
        GrayImage::from_raw(self.width as u32, self.height as u32, raw)
            .unwrap_or_else(|| GrayImage::new(self.width as u32, self.height as u32))
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.width + x] = value;
    }

    /// Sample of the pixel containing the real point `(x, y)`.
    ///
    /// Points outside the raster are mirrored back across the image edges (repeatedly, so any
    /// finite coordinate is accepted) and then clamped to a valid index. An empty raster reads
    /// as `0.0` everywhere.
    pub fn pixel_reflected(&self, x: f64, y: f64) -> f32 {
        if self.width == 0 || self.height == 0 {
            return 0.0;
        }
        let (w, h) = (self.width as f64, self.height as f64);
        let i = reflect(x, w).clamp(0.0, w - 1.0).floor() as usize;
        let j = reflect(y, h).clamp(0.0, h - 1.0).floor() as usize;
        self.get(i, j)
    }

    /// Sample of pixel `(i, j)`, mirroring indices outside the raster about its edges.
    pub fn texel(&self, i: i64, j: i64) -> f32 {
        self.pixel_reflected(i as f64 + 0.5, j as f64 + 0.5)
    }

    /// `1 - v` for every sample.
    pub fn inverted(&self) -> Channel {
        Channel {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| 1.0 - v).collect(),
        }
    }

    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|&v| f64::from(v)).sum::<f64>() / self.data.len() as f64
    }

    /// Resamples to `width × height` with a Lanczos3 filter, clamping the result to `[0, 1]`.
    pub fn resized(&self, width: usize, height: usize) -> Channel {
        let buffer: ImageBuffer<Luma<f32>, Vec<f32>> =
            match ImageBuffer::from_raw(self.width as u32, self.height as u32, self.data.clone()) {
                Some(b) => b,
                None => return Channel::filled(width, height, 0.0),
            };
        let resized = imageops::resize(&buffer, width as u32, height as u32, FilterType::Lanczos3);
        Channel {
            width,
            height,
            data: resized.into_raw().into_iter().map(|v| v.clamp(0.0, 1.0)).collect(),
        }
    }

    /// Returns a blurred copy, or a plain copy for [`BlurKind::None`] and zero radius.
    pub fn blurred(&self, kind: BlurKind, radius: f64) -> Channel {
        let kernel = match kind {
            BlurKind::None => return self.clone(),
            BlurKind::Box => box_kernel(radius),
            BlurKind::Gaussian => gaussian_kernel(radius),
        };
        if kernel.len() <= 1 {
            return self.clone();
        }
        self.convolve_separable(&kernel)
    }

    /// Convolves rows and then columns with a normalized odd-length kernel. Samples past the
    /// border repeat the edge pixel.
    fn convolve_separable(&self, kernel: &[f32]) -> Channel {
        let half = (kernel.len() / 2) as i64;
        let (w, h) = (self.width as i64, self.height as i64);
        let tap = |center: i64, k: usize, len: i64| (center + k as i64 - half).clamp(0, len - 1) as usize;

        let horizontal = Channel::from_fn(self.width, self.height, |x, y| {
            kernel
                .iter()
                .enumerate()
                .map(|(k, &weight)| weight * self.get(tap(x as i64, k, w), y))
                .sum()
        });
        Channel::from_fn(self.width, self.height, |x, y| {
            kernel
                .iter()
                .enumerate()
                .map(|(k, &weight)| weight * horizontal.get(x, tap(y as i64, k, h)))
                .sum::<f32>()
                .clamp(0.0, 1.0)
        })
    }
}

pub(crate) fn to_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Averaging window of `2 * radius + 1` samples. A fractional radius gives the two outermost
/// taps partial weight.
fn box_kernel(radius: f64) -> Vec<f32> {
    if !(radius > 0.0) || !radius.is_finite() {
        return vec![1.0];
    }
    let whole = radius.floor() as usize;
    let fraction = (radius - radius.floor()) as f32;
    let (half, edge) = if fraction > 0.0 {
        (whole + 1, fraction)
    } else {
        (whole, 1.0)
    };
    let mut kernel = vec![1.0f32; 2 * half + 1];
    kernel[0] = edge;
    kernel[2 * half] = edge;
    normalize(kernel)
}

/// Sampled Gaussian with standard deviation `sigma`, truncated at three deviations.
fn gaussian_kernel(sigma: f64) -> Vec<f32> {
    if !(sigma > 0.0) || !sigma.is_finite() {
        return vec![1.0];
    }
    let half = (3.0 * sigma).ceil() as i64;
    let divisor = 2.0 * sigma * sigma;
    let kernel = (-half..=half)
        .map(|k| (-(k * k) as f64 / divisor).exp() as f32)
        .collect();
    normalize(kernel)
}

fn normalize(mut kernel: Vec<f32>) -> Vec<f32> {
    let sum: f32 = kernel.iter().sum();
    for weight in &mut kernel {
        *weight /= sum;
    }
    kernel
}

/// Smoothing applied to a channel before dot sampling, so that each dot reflects the average
/// tone around its cell rather than a single point.
#[derive(Debug, Default, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlurKind {
    #[default]
    None,
    Box,
    Gaussian,
}

impl FromStr for BlurKind {
    type Err = HalftoneError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(BlurKind::None),
            "box" => Ok(BlurKind::Box),
            "gaussian" => Ok(BlurKind::Gaussian),
            _ => Err(HalftoneError::UnknownBlurKind(s.into())),
        }
    }
}

impl Display for BlurKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BlurKind::None => "none",
            BlurKind::Box => "box",
            BlurKind::Gaussian => "gaussian",
        })
    }
}
