use serde::{Deserialize, Serialize};

use crate::channel::BlurKind;
use crate::compose::{ChannelSettings, HalftoneParams};
use crate::error::Result;
use crate::occupancy::DEFAULT_DEPTH;
use crate::resample::Resampler;
use crate::separation::ColorMode;

#[derive(Debug, Clone, PartialEq, clap::Args, Serialize, Deserialize)]
pub struct Config {
    /// Spacing of the dot lattice, in input pixels.
    #[clap(short, long, visible_alias = "interval", default_value_t = 4.0)]
    pub pitch: f64,

    /// Size of the output relative to the input.
    #[clap(short = 'x', visible_short_alias = 's', long, default_value_t = 1.0)]
    pub scale: f64,

    /// Smooth each channel before sampling it. Given without a value, uses a Gaussian.
    #[clap(short, long, num_args = 0..=1, default_missing_value = "gaussian")]
    pub blur: Option<BlurKind>,

    /// Radius of the pre-sampling blur, in input pixels. Half the pitch if unset.
    #[clap(short = 'B', long)]
    pub blur_radius: Option<f64>,

    /// Kernel used to sample the channel at each dot center.
    #[clap(short = 'F', long, default_value_t = Resampler::Linear)]
    pub resample: Resampler,

    /// Number of distinct dot sizes.
    #[clap(long, default_value_t = DEFAULT_DEPTH)]
    pub depth: usize,

    /// Screen angle for grayscale images, in degrees.
    #[clap(short = 'A', long, visible_alias = "gray-angle", default_value_t = 45.0)]
    pub angle: f64,

    /// Screen angles for red, green and blue.
    #[clap(short = 't', long, visible_alias = "Angles", num_args = 3, allow_negative_numbers = true, default_values_t = [15.0, 75.0, 30.0])]
    pub rgb_angles: Vec<f64>,

    /// Screen angles for cyan, magenta, yellow and key.
    #[clap(short = 'a', long, visible_alias = "angles", num_args = 4, allow_negative_numbers = true, default_values_t = [15.0, 75.0, 30.0, 45.0])]
    pub cmyk_angles: Vec<f64>,

    /// Resize every channel instead of halftoning it.
    #[clap(short = 'K', long)]
    pub keep_all: bool,
    #[clap(long)]
    pub keep_red: bool,
    #[clap(long)]
    pub keep_green: bool,
    #[clap(long)]
    pub keep_blue: bool,
    #[clap(long)]
    pub keep_cyan: bool,
    #[clap(long)]
    pub keep_magenta: bool,
    #[clap(long)]
    pub keep_yellow: bool,
    #[clap(long)]
    pub keep_key: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            pitch: 4.0,
            scale: 1.0,
            blur: None,
            blur_radius: None,
            resample: Resampler::Linear,
            depth: DEFAULT_DEPTH,
            angle: 45.0,
            rgb_angles: ColorMode::Rgb.default_angles().to_vec(),
            cmyk_angles: ColorMode::Cmyk.default_angles().to_vec(),
            keep_all: false,
            keep_red: false,
            keep_green: false,
            keep_blue: false,
            keep_cyan: false,
            keep_magenta: false,
            keep_yellow: false,
            keep_key: false,
        }
    }
}

impl Config {
    pub fn params(&self) -> Result<HalftoneParams> {
        let params = HalftoneParams {
            pitch: self.pitch,
            scale: self.scale,
            blur: self.blur.unwrap_or_default(),
            blur_radius: self.blur_radius,
            resampler: self.resample,
            depth: self.depth,
            origin: None,
        };
        params.validate()?;
        Ok(params)
    }

    /// Angle and keep flag for each channel of `mode`, in channel order.
    pub fn channel_settings(&self, mode: ColorMode) -> Vec<ChannelSettings> {
        let (angles, keeps): (&[f64], Vec<bool>) = match mode {
            ColorMode::Gray => (std::slice::from_ref(&self.angle), vec![false]),
            ColorMode::Rgb => (
                &self.rgb_angles,
                vec![self.keep_red, self.keep_green, self.keep_blue],
            ),
            ColorMode::Cmyk => (
                &self.cmyk_angles,
                vec![self.keep_cyan, self.keep_magenta, self.keep_yellow, self.keep_key],
            ),
        };
        angles
            .iter()
            .zip(keeps)
            .map(|(&angle, keep)| ChannelSettings {
                angle,
                keep: keep || self.keep_all,
            })
            .collect()
    }
}
