use std::fmt::Display;
use std::io::{Seek, Write};
use std::str::FromStr;

use image::{DynamicImage, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use tiff::encoder::{colortype, TiffEncoder};

use crate::channel::{to_byte, Channel};
use crate::error::{HalftoneError, Result};

/// Channel layout of a [`Separation`].
#[derive(Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    Gray,
    Rgb,
    Cmyk,
}

impl ColorMode {
    pub fn channel_count(self) -> usize {
        self.channel_names().len()
    }

    pub fn channel_names(self) -> &'static [&'static str] {
        match self {
            ColorMode::Gray => &["Gray"],
            ColorMode::Rgb => &["Red", "Green", "Blue"],
            ColorMode::Cmyk => &["Cyan", "Magenta", "Yellow", "Key"],
        }
    }

    /// Classic screen angles, in degrees. No two bands of one mode share an angle, which keeps
    /// their dot lattices from beating against each other.
    pub fn default_angles(self) -> &'static [f64] {
        match self {
            ColorMode::Gray => &[45.0],
            ColorMode::Rgb => &[15.0, 75.0, 30.0],
            ColorMode::Cmyk => &[15.0, 75.0, 30.0, 45.0],
        }
    }

    /// Whether samples measure light (gray, RGB) rather than ink (CMYK).
    pub fn is_additive(self) -> bool {
        !matches!(self, ColorMode::Cmyk)
    }
}

impl FromStr for ColorMode {
    type Err = HalftoneError;
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gray" | "grey" | "l" => Ok(ColorMode::Gray),
            "rgb" => Ok(ColorMode::Rgb),
            "cmyk" => Ok(ColorMode::Cmyk),
            _ => Err(HalftoneError::UnknownColorMode(s.into())),
        }
    }
}

impl Display for ColorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ColorMode::Gray => "gray",
            ColorMode::Rgb => "rgb",
            ColorMode::Cmyk => "cmyk",
        })
    }
}

/// An image split into equally sized bands, one [`Channel`] per band of its [`ColorMode`].
#[derive(Debug, Clone, PartialEq)]
pub struct Separation {
    mode: ColorMode,
    channels: Vec<Channel>,
}

impl Separation {
    pub fn new(mode: ColorMode, channels: Vec<Channel>) -> Result<Self> {
        if channels.len() != mode.channel_count() {
            return Err(HalftoneError::ChannelCount {
                expected: mode.channel_count(),
                actual: channels.len(),
            });
        }
        let expected = channels[0].dimensions();
        if let Some(c) = channels.iter().find(|c| c.dimensions() != expected) {
            return Err(HalftoneError::DimensionMismatch {
                expected,
                actual: c.dimensions(),
            });
        }
        Ok(Separation { mode, channels })
    }

    pub fn from_gray8(image: &GrayImage) -> Self {
        Separation {
            mode: ColorMode::Gray,
            channels: vec![Channel::from_luma8(image)],
        }
    }

    pub fn from_rgb8(image: &RgbImage) -> Self {
        let (w, h) = (image.width() as usize, image.height() as usize);
        let band = |k: usize| {
            Channel::from_fn(w, h, |x, y| f32::from(image.get_pixel(x as u32, y as u32).0[k]) / 255.0)
        };
        Separation {
            mode: ColorMode::Rgb,
            channels: (0..3).map(band).collect(),
        }
    }

    pub fn mode(&self) -> ColorMode {
        self.mode
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn into_channels(self) -> Vec<Channel> {
        self.channels
    }

    pub fn dimensions(&self) -> (usize, usize) {
        self.channels[0].dimensions()
    }

    /// Pixel `(x, y)` across all bands.
    pub fn pixel(&self, x: usize, y: usize) -> Vec<f32> {
        self.channels.iter().map(|c| c.get(x, y)).collect()
    }

    /// Builds a separation of `mode` by evaluating `f` once per pixel.
    pub fn from_pixels(
        mode: ColorMode,
        (width, height): (usize, usize),
        f: impl Fn(usize, usize) -> Vec<f32>,
    ) -> Result<Self> {
        let n = mode.channel_count();
        let mut data = vec![Vec::with_capacity(width * height); n];
        for y in 0..height {
            for x in 0..width {
                let px = f(x, y);
                if px.len() != n {
                    return Err(HalftoneError::ChannelCount {
                        expected: n,
                        actual: px.len(),
                    });
                }
                for (band, v) in data.iter_mut().zip(px) {
                    band.push(v);
                }
            }
        }
        let channels = data
            .into_iter()
            .map(|band| Channel::from_vec(width, height, band))
            .collect::<Result<Vec<Channel>>>()?;
        Separation::new(mode, channels)
    }

    /// 8-bit image for gray and RGB separations. CMYK has no `image` representation.
    pub fn to_dynamic(&self) -> Option<DynamicImage> {
        let (w, h) = self.dimensions();
        match self.mode {
            ColorMode::Gray => Some(DynamicImage::ImageLuma8(self.channels[0].to_luma8())),
            ColorMode::Rgb => {
                let bands: Vec<GrayImage> = self.channels.iter().map(Channel::to_luma8).collect();
                let rgb = RgbImage::from_fn(w as u32, h as u32, |x, y| {
                    image::Rgb([0, 1, 2].map(|k| bands[k].get_pixel(x, y).0[0]))
                });
                Some(DynamicImage::ImageRgb8(rgb))
            }
            ColorMode::Cmyk => None,
        }
    }

    /// 8-bit samples interleaved pixel by pixel, in channel order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let (w, h) = self.dimensions();
        let mut bytes = Vec::with_capacity(w * h * self.channels.len());
        for y in 0..h {
            for x in 0..w {
                bytes.extend(self.channels.iter().map(|c| to_byte(c.get(x, y))));
            }
        }
        bytes
    }

    /// Encodes the separation as an 8-bit TIFF in its own color mode, so CMYK stays CMYK.
    pub fn write_tiff<W: Write + Seek>(&self, writer: W) -> Result<()> {
        let (w, h) = self.dimensions();
        let (w, h) = (w as u32, h as u32);
        let data = self.to_bytes();
        let mut encoder = TiffEncoder::new(writer).map_err(encode_error)?;
        match self.mode {
            ColorMode::Gray => encoder.write_image::<colortype::Gray8>(w, h, &data),
            ColorMode::Rgb => encoder.write_image::<colortype::RGB8>(w, h, &data),
            ColorMode::Cmyk => encoder.write_image::<colortype::CMYK8>(w, h, &data),
        }
        .map_err(encode_error)
    }
}

fn encode_error(e: tiff::TiffError) -> HalftoneError {
    HalftoneError::Encode(e.to_string())
}
