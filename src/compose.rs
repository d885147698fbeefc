//! Per-channel halftoning and recombination of multi-band images.

use std::borrow::Cow;
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::channel::{BlurKind, Channel};
use crate::dots::DotSampler;
use crate::error::{positive, HalftoneError, Result};
use crate::grid::GridTransform;
use crate::occupancy::{check_depth, RadiusTable, RadiusTableCache, DEFAULT_DEPTH};
use crate::raster::{output_size, Rasterizer};
use crate::resample::Resampler;
use crate::separation::{ColorMode, Separation};

/// How often, in dots, a channel reports progress.
const PROGRESS_INTERVAL: usize = 256;

/// Settings shared by every channel of an image.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct HalftoneParams {
    /// Lattice spacing, in input pixels.
    pub pitch: f64,
    /// Output size relative to the input.
    pub scale: f64,
    pub blur: BlurKind,
    /// Blur radius in input pixels; half the pitch when unset.
    pub blur_radius: Option<f64>,
    pub resampler: Resampler,
    /// Number of tone levels in the radius table.
    pub depth: usize,
    /// Center of lattice rotation; the image center when unset.
    pub origin: Option<(f64, f64)>,
}

impl Default for HalftoneParams {
    fn default() -> Self {
        HalftoneParams {
            pitch: 4.0,
            scale: 1.0,
            blur: BlurKind::None,
            blur_radius: None,
            resampler: Resampler::Linear,
            depth: DEFAULT_DEPTH,
            origin: None,
        }
    }
}

impl HalftoneParams {
    pub fn validate(&self) -> Result<()> {
        positive("pitch", self.pitch)?;
        positive("scale", self.scale)?;
        check_depth(self.depth)?;
        if let Some(radius) = self.blur_radius {
            if !(radius.is_finite() && radius >= 0.0) {
                return Err(HalftoneError::InvalidParameter {
                    name: "blur radius",
                    value: radius,
                    reason: "must be a non-negative finite number",
                });
            }
        }
        Ok(())
    }

    pub fn blur_radius(&self) -> f64 {
        self.blur_radius.unwrap_or(self.pitch / 2.0)
    }
}

/// Settings that differ between the channels of one image.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// Lattice rotation in degrees.
    pub angle: f64,
    /// Resize the channel smoothly instead of halftoning it.
    pub keep: bool,
}

impl ChannelSettings {
    /// Default screen angles for `mode`, with no channel kept.
    pub fn defaults(mode: ColorMode) -> Vec<ChannelSettings> {
        mode.default_angles()
            .iter()
            .map(|&angle| ChannelSettings { angle, keep: false })
            .collect()
    }
}

/// Halftones one band in which `1.0` means full ink.
///
/// The result has the same polarity and is `round(width * scale) × round(height * scale)`.
/// `progress` receives non-decreasing fractions and always ends with `1.0`.
pub fn halftone_channel(
    channel: &Channel,
    table: &RadiusTable,
    params: &HalftoneParams,
    settings: ChannelSettings,
    mut progress: impl FnMut(f64),
) -> Result<Channel> {
    params.validate()?;
    let (width, height) = output_size(channel.width(), channel.height(), params.scale)?;
    if settings.keep {
        let kept = channel.resized(width, height);
        progress(1.0);
        return Ok(kept);
    }

    let source = match params.blur {
        BlurKind::None => Cow::Borrowed(channel),
        kind => Cow::Owned(channel.blurred(kind, params.blur_radius())),
    };
    let origin = params
        .origin
        .unwrap_or((channel.width() as f64 / 2.0, channel.height() as f64 / 2.0));
    let transform = GridTransform::new(table.pitch(), settings.angle, origin);
    let mut sampler = DotSampler::with_transform(&source, transform, params.resampler);
    let mut raster = Rasterizer::new(table, channel.width(), channel.height(), params.scale)?;

    let mut count = 0;
    while let Some(dot) = sampler.next() {
        raster.draw(&dot);
        count += 1;
        if count % PROGRESS_INTERVAL == 0 {
            progress(sampler.progress());
        }
    }
    let ink = raster.finish();
    progress(1.0);
    debug!(dots = count, angle = settings.angle, width, height, "halftoned channel");
    Ok(ink)
}

/// Drives [`halftone_channel`] over every band of an image.
///
/// Radius tables are cached per `(pitch, depth)`, so one `Halftoner` can be reused across many
/// images sharing a pitch.
#[derive(Debug)]
pub struct Halftoner {
    params: HalftoneParams,
    tables: RadiusTableCache,
}

impl Halftoner {
    pub fn new(params: HalftoneParams) -> Result<Self> {
        params.validate()?;
        Ok(Halftoner {
            params,
            tables: RadiusTableCache::new(),
        })
    }

    pub fn params(&self) -> &HalftoneParams {
        &self.params
    }

    pub fn table(&self) -> Result<Arc<RadiusTable>> {
        self.tables.get(self.params.pitch, self.params.depth)
    }

    /// Halftones each band of `image` with its own angle and keep flag, in parallel.
    ///
    /// Gray and RGB bands hold light, so they are turned into ink before drawing and back
    /// afterwards: dark areas get large dots. CMYK bands are drawn as they are. `progress` is
    /// called with the band index and that band's completion fraction.
    pub fn halftone(
        &self,
        image: &Separation,
        settings: &[ChannelSettings],
        progress: &(dyn Fn(usize, f64) + Sync),
    ) -> Result<Separation> {
        if settings.len() != image.channels().len() {
            return Err(HalftoneError::ChannelCount {
                expected: image.channels().len(),
                actual: settings.len(),
            });
        }
        let (width, height) = image.dimensions();
        output_size(width, height, self.params.scale)?;
        // Build the shared table before fanning out.
        let table = self.table()?;
        let additive = image.mode().is_additive();
        debug!(mode = %image.mode(), pitch = self.params.pitch, "halftoning image");

        let channels = image
            .channels()
            .par_iter()
            .zip(settings.par_iter())
            .enumerate()
            .map(|(index, (channel, &channel_settings))| {
                let report = |p: f64| progress(index, p);
                if additive {
                    let ink = halftone_channel(
                        &channel.inverted(),
                        &table,
                        &self.params,
                        channel_settings,
                        report,
                    )?;
                    Ok(ink.inverted())
                } else {
                    halftone_channel(channel, &table, &self.params, channel_settings, report)
                }
            })
            .collect::<Result<Vec<Channel>>>()?;
        Separation::new(image.mode(), channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::occupancy::MAX_DEPTH;
    use std::sync::Mutex;

    fn small_params() -> HalftoneParams {
        HalftoneParams {
            depth: 256,
            ..HalftoneParams::default()
        }
    }

    #[test]
    fn test_validate() {
        assert!(HalftoneParams::default().validate().is_ok());
        let bad = [
            HalftoneParams { pitch: 0.0, ..small_params() },
            HalftoneParams { pitch: f64::NAN, ..small_params() },
            HalftoneParams { scale: -1.0, ..small_params() },
            HalftoneParams { depth: 1, ..small_params() },
            HalftoneParams { depth: MAX_DEPTH + 1, ..small_params() },
            HalftoneParams { blur_radius: Some(-2.0), ..small_params() },
        ];
        for params in bad {
            match Halftoner::new(params) {
                Err(HalftoneError::InvalidParameter { .. }) => {}
                other => panic!("{:?}: got {:?}", params, other),
            }
        }
    }

    #[test]
    fn test_blur_radius_defaults_to_half_pitch() {
        let params = HalftoneParams { pitch: 6.0, ..small_params() };
        assert_eq!(params.blur_radius(), 3.0);
        let params = HalftoneParams { blur_radius: Some(1.5), ..params };
        assert_eq!(params.blur_radius(), 1.5);
    }

    #[test]
    fn test_uniform_channel_gets_uniform_dots() {
        let params = small_params();
        let table = RadiusTable::build(params.pitch, params.depth).unwrap();
        let channel = Channel::filled(24, 24, 100.0 / 255.0);
        for resampler in Resampler::ALL {
            let want = table.as_slice()[100];
            for dot in DotSampler::new(&channel, params.pitch, 30.0, resampler) {
                let got = table.radius_for(dot.intensity);
                if got != want {
                    panic!("{}: dot {:?} has radius {}, want {}", resampler, dot, got, want);
                }
            }
        }
    }

    #[test]
    fn test_keep_is_plain_resize() {
        let params = HalftoneParams { scale: 1.5, ..small_params() };
        let table = RadiusTable::build(params.pitch, params.depth).unwrap();
        let channel = Channel::from_fn(10, 6, |x, y| ((x * 3 + y * 5) % 11) as f32 / 10.0);
        let settings = ChannelSettings { angle: 15.0, keep: true };
        let kept = halftone_channel(&channel, &table, &params, settings, |_| {}).unwrap();
        assert_eq!(kept, channel.resized(15, 9));
    }

    #[test]
    fn test_progress_is_monotonic_and_finishes() {
        let params = HalftoneParams { pitch: 2.0, ..small_params() };
        let table = RadiusTable::build(params.pitch, params.depth).unwrap();
        let channel = Channel::filled(64, 64, 0.5);
        let mut seen = Vec::new();
        let settings = ChannelSettings { angle: 45.0, keep: false };
        halftone_channel(&channel, &table, &params, settings, |p| seen.push(p)).unwrap();
        assert!(seen.len() > 1);
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{:?}", seen);
        assert!(seen.iter().all(|p| (0.0..=1.0).contains(p)));
        assert_eq!(seen.last(), Some(&1.0));
    }

    #[test]
    fn test_gray_polarity() {
        let halftoner = Halftoner::new(small_params()).unwrap();
        let settings = ChannelSettings::defaults(ColorMode::Gray);
        let white = Separation::new(ColorMode::Gray, vec![Channel::filled(16, 16, 1.0)]).unwrap();
        let out = halftoner.halftone(&white, &settings, &|_, _| {}).unwrap();
        assert!(out.channels()[0].as_slice().iter().all(|&v| v == 1.0));

        let black = Separation::new(ColorMode::Gray, vec![Channel::filled(16, 16, 0.0)]).unwrap();
        let out = halftoner.halftone(&black, &settings, &|_, _| {}).unwrap();
        let mean = out.channels()[0].mean();
        assert!(mean < 0.06, "black came out with mean {}", mean);
    }

    #[test]
    fn test_cmyk_polarity() {
        let halftoner = Halftoner::new(small_params()).unwrap();
        let settings = ChannelSettings::defaults(ColorMode::Cmyk);
        let channels = vec![
            Channel::filled(16, 16, 0.0),
            Channel::filled(16, 16, 1.0),
            Channel::filled(16, 16, 0.0),
            Channel::filled(16, 16, 0.0),
        ];
        let image = Separation::new(ColorMode::Cmyk, channels).unwrap();
        let out = halftoner.halftone(&image, &settings, &|_, _| {}).unwrap();
        assert_eq!(out.mode(), ColorMode::Cmyk);
        assert!(out.channels()[0].as_slice().iter().all(|&v| v == 0.0));
        assert!(out.channels()[1].mean() > 0.94);
    }

    #[test]
    fn test_settings_must_match_channels() {
        let halftoner = Halftoner::new(small_params()).unwrap();
        let image = Separation::new(ColorMode::Gray, vec![Channel::filled(4, 4, 0.5)]).unwrap();
        let settings = ChannelSettings::defaults(ColorMode::Rgb);
        assert_eq!(
            halftoner.halftone(&image, &settings, &|_, _| {}),
            Err(HalftoneError::ChannelCount {
                expected: 1,
                actual: 3
            })
        );
    }

    #[test]
    fn test_empty_output_fails_before_building_a_table() {
        let halftoner = Halftoner::new(HalftoneParams { scale: 0.1, ..small_params() }).unwrap();
        let image = Separation::new(ColorMode::Gray, vec![Channel::filled(4, 4, 0.5)]).unwrap();
        let settings = ChannelSettings::defaults(ColorMode::Gray);
        match halftoner.halftone(&image, &settings, &|_, _| {}) {
            Err(HalftoneError::InvalidParameter { name: "scale", .. }) => {}
            other => panic!("got {:?}", other),
        }
        assert!(halftoner.tables.is_empty());
    }

    #[test]
    fn test_empty_channel_is_rejected() {
        let params = small_params();
        let table = RadiusTable::build(params.pitch, params.depth).unwrap();
        let settings = ChannelSettings { angle: 45.0, keep: false };
        for channel in [Channel::filled(0, 4, 0.5), Channel::filled(4, 0, 0.5)] {
            match halftone_channel(&channel, &table, &params, settings, |_| {}) {
                Err(HalftoneError::InvalidParameter { name: "scale", .. }) => {}
                other => panic!("{:?}: got {:?}", channel.dimensions(), other),
            }
        }
    }

    #[test]
    fn test_every_channel_reports_completion() {
        let halftoner = Halftoner::new(small_params()).unwrap();
        let image = Separation::new(
            ColorMode::Rgb,
            vec![Channel::filled(20, 20, 0.25); 3],
        )
        .unwrap();
        let mut settings = ChannelSettings::defaults(ColorMode::Rgb);
        settings[1].keep = true;
        let done = Mutex::new(vec![0.0; 3]);
        halftoner
            .halftone(&image, &settings, &|index, p| done.lock().unwrap()[index] = p)
            .unwrap();
        assert_eq!(*done.lock().unwrap(), vec![1.0; 3]);
        assert_eq!(halftoner.tables.len(), 1);
    }
}
