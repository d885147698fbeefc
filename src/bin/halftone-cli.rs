use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use image::io::Reader;
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use halftone::color::{ColorConverter, NaiveTransform};
use halftone::compose::Halftoner;
use halftone::config::Config;
use halftone::separation::{ColorMode, Separation};

const BAR_LENGTH: u64 = 1000;

/// Convert images into halftones made of rotated grids of round dots.
#[derive(Parser)]
#[clap(version)]
struct Opts {
    /// Input image files.
    #[clap(value_name = "FILE", required = true)]
    files: Vec<String>,

    /// Suppress non-error messages.
    #[clap(short, long)]
    quiet: bool,
    /// Stop at the first failing file.
    #[clap(short, long)]
    exit: bool,
    /// Treat FILE values as recursive glob patterns.
    #[clap(short, long)]
    glob: bool,
    /// Overwrite existing files.
    #[clap(short, long)]
    force: bool,
    /// Directory to save output images in.
    #[clap(short, long, value_name = "DIR", default_value = ".")]
    directory: PathBuf,
    #[clap(short = 'P', long, default_value = "", value_parser = filename_segment)]
    prefix: String,
    #[clap(short = 'S', long, default_value = "-halftone", value_parser = filename_segment)]
    suffix: String,
    /// Name outputs with consecutive numbers starting from START.
    #[clap(short = 'E', long, value_name = "START", num_args = 0..=1, default_missing_value = "1")]
    enumerate: Option<usize>,

    /// Color space to halftone in.
    #[clap(short, long, value_enum, default_value_t = Mode::Auto)]
    mode: Mode,
    /// Color space of saved images.
    #[clap(short, long, value_enum, default_value_t = Output::Auto)]
    output: Output,
    /// Save TIFF instead of PNG. CMYK output is always TIFF.
    #[clap(short = 'T', long)]
    tiff: bool,
    /// Lift the decoder's limits on image size and memory.
    #[clap(short = 'H', long)]
    allow_huge: bool,

    /// Apply the sRGB transfer curve around RGB/CMYK conversion.
    #[clap(long)]
    gamma_correction: bool,
    /// Darkness from which black ink is generated, within 0 to 1.
    #[clap(long, visible_alias = "key", value_name = "RATE", default_value_t = 0.5, value_parser = rate)]
    key_from: f64,

    /// Print the resolved settings as JSON.
    #[clap(long)]
    print_settings: bool,

    #[clap(flatten)]
    config: Config,
}

#[derive(Copy, Clone, Debug, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
enum Mode {
    Auto,
    Gray,
    Rgb,
    Cmyk,
}

impl Mode {
    fn resolve(self, input: ColorMode) -> ColorMode {
        match self {
            Mode::Auto => match input {
                ColorMode::Gray => ColorMode::Gray,
                ColorMode::Rgb | ColorMode::Cmyk => ColorMode::Cmyk,
            },
            Mode::Gray => ColorMode::Gray,
            Mode::Rgb => ColorMode::Rgb,
            Mode::Cmyk => ColorMode::Cmyk,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
enum Output {
    Auto,
    Gray,
    Rgb,
    Cmyk,
}

impl Output {
    fn resolve(self, halftone: ColorMode) -> ColorMode {
        match self {
            Output::Auto => match halftone {
                ColorMode::Gray => ColorMode::Gray,
                ColorMode::Rgb | ColorMode::Cmyk => ColorMode::Rgb,
            },
            Output::Gray => ColorMode::Gray,
            Output::Rgb => ColorMode::Rgb,
            Output::Cmyk => ColorMode::Cmyk,
        }
    }
}

#[derive(Serialize)]
struct Settings<'a> {
    mode: Mode,
    output: Output,
    transform: NaiveTransform,
    config: &'a Config,
}

fn filename_segment(s: &str) -> anyhow::Result<String> {
    if s.is_empty() || Path::new(s).file_name() == Some(OsStr::new(s)) {
        Ok(s.to_owned())
    } else {
        bail!("{:?} is not a plain file name part", s)
    }
}

fn rate(s: &str) -> anyhow::Result<f64> {
    let value: f64 = s.parse()?;
    if !(0.0..=1.0).contains(&value) {
        bail!("{} is not within 0 to 1", value);
    }
    Ok(value)
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let opts = Opts::parse();
    match run(&opts) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every file was converted.
fn run(opts: &Opts) -> anyhow::Result<bool> {
    let params = opts.config.params()?;
    let transform = NaiveTransform {
        key_threshold: opts.key_from,
        gamma_correction: opts.gamma_correction,
    };
    if opts.print_settings {
        let settings = Settings {
            mode: opts.mode,
            output: opts.output,
            transform,
            config: &opts.config,
        };
        println!("{}", serde_json::to_string_pretty(&settings)?);
    }

    let inputs = list_inputs(opts)?;
    let n = inputs.len();
    if !opts.quiet {
        match n {
            0 => println!("No files matched"),
            1 => println!("One processing target has been queued"),
            _ => println!("{} processing targets have been queued", n),
        }
    }

    let halftoner = Halftoner::new(params)?;
    let mut ok = true;
    for (i, input) in inputs.iter().enumerate() {
        let start = Instant::now();
        match convert(opts, &halftoner, &transform, input, i) {
            Ok(path) => {
                if !opts.quiet {
                    println!(
                        "{}/{} done: {} -> {} ({:.1} sec)",
                        i + 1,
                        n,
                        input.display(),
                        path.display(),
                        start.elapsed().as_secs_f64()
                    );
                }
            }
            Err(e) => {
                eprintln!("{}/{} error: {}", i + 1, n, input.display());
                eprintln!("{:#}", e);
                ok = false;
                if opts.exit {
                    break;
                }
            }
        }
    }
    Ok(ok)
}

fn list_inputs(opts: &Opts) -> anyhow::Result<Vec<PathBuf>> {
    if !opts.glob {
        return Ok(opts.files.iter().map(PathBuf::from).collect());
    }
    let mut seen = HashSet::new();
    let mut inputs = Vec::new();
    for pattern in &opts.files {
        let paths = glob::glob(pattern).with_context(|| format!("Invalid pattern {:?}", pattern))?;
        for path in paths {
            let path = path?;
            if path.is_file() && seen.insert(path.clone()) {
                inputs.push(path);
            }
        }
    }
    Ok(inputs)
}

fn convert(
    opts: &Opts,
    halftoner: &Halftoner,
    converter: &dyn ColorConverter,
    input: &Path,
    index: usize,
) -> anyhow::Result<PathBuf> {
    let source = load(input, opts.allow_huge)?;
    let mode = opts.mode.resolve(source.mode());
    debug!(
        path = %input.display(),
        from = %source.mode(),
        to = %mode,
        "loaded image"
    );
    let working = converter.convert(&source, mode)?;
    let settings = opts.config.channel_settings(mode);

    let bars = if opts.quiet {
        Vec::new()
    } else {
        progress_bars(mode)?
    };
    let result = halftoner.halftone(&working, &settings, &|channel, p| {
        if let Some(bar) = bars.get(channel) {
            bar.set_position((p * BAR_LENGTH as f64) as u64);
        }
    });
    for bar in &bars {
        bar.finish();
    }
    let halftone = result?;

    let complete = converter.convert(&halftone, opts.output.resolve(halftone.mode()))?;

    std::fs::create_dir_all(&opts.directory)
        .with_context(|| format!("Failed to create {}", opts.directory.display()))?;
    let tiff = opts.tiff || complete.mode() == ColorMode::Cmyk;
    let path = output_path(opts, input, index, tiff);
    save(&complete, &path, tiff).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

fn save(image: &Separation, path: &Path, tiff: bool) -> anyhow::Result<()> {
    if tiff {
        image.write_tiff(BufWriter::new(File::create(path)?))?;
    } else {
        image
            .to_dynamic()
            .context("CMYK images can only be saved as TIFF")?
            .save_with_format(path, ImageFormat::Png)?;
    }
    Ok(())
}

fn progress_bars(mode: ColorMode) -> anyhow::Result<Vec<ProgressBar>> {
    let style = ProgressStyle::with_template("{prefix:>8} [{bar:50}] {percent:>3}%")?.progress_chars("=> ");
    let multi = MultiProgress::new();
    Ok(mode
        .channel_names()
        .iter()
        .map(|&name| {
            let bar = multi.add(ProgressBar::new(BAR_LENGTH));
            bar.set_style(style.clone());
            bar.set_prefix(name);
            bar
        })
        .collect())
}

/// Decodes an image, flattening any alpha onto white.
fn load(path: &Path, allow_huge: bool) -> anyhow::Result<Separation> {
    let image = decode(path, allow_huge).with_context(|| format!("Failed to read {}", path.display()))?;
    let color = image.color();
    let separation = match (color.has_color(), color.has_alpha()) {
        (false, false) => Separation::from_gray8(&image.to_luma8()),
        (true, false) => Separation::from_rgb8(&image.to_rgb8()),
        (false, true) => Separation::from_gray8(&gray_over_white(&image)),
        (true, true) => Separation::from_rgb8(&rgb_over_white(&image)),
    };
    Ok(separation)
}

fn decode(path: &Path, allow_huge: bool) -> anyhow::Result<DynamicImage> {
    let mut reader = Reader::open(path)?.with_guessed_format()?;
    if allow_huge {
        reader.no_limits();
    }
    Ok(reader.decode()?)
}

fn over_white(v: u8, alpha: u8) -> u8 {
    let (v, alpha) = (u32::from(v), u32::from(alpha));
    ((v * alpha + 255 * (255 - alpha) + 127) / 255) as u8
}

fn gray_over_white(image: &DynamicImage) -> GrayImage {
    let la = image.to_luma_alpha8();
    GrayImage::from_fn(la.width(), la.height(), |x, y| {
        let [l, a] = la.get_pixel(x, y).0;
        Luma([over_white(l, a)])
    })
}

fn rgb_over_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        Rgb([r, g, b].map(|v| over_white(v, a)))
    })
}

/// `<directory>/<prefix><stem><suffix>.<ext>`. Unless forced, `+` is appended to the stem until
/// the path is free.
fn output_path(opts: &Opts, input: &Path, index: usize, tiff: bool) -> PathBuf {
    let mut stem = match opts.enumerate {
        Some(start) => (start + index).to_string(),
        None => input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    let ext = if tiff { "tiff" } else { "png" };
    loop {
        let path = opts
            .directory
            .join(format!("{}{}{}.{}", opts.prefix, stem, opts.suffix, ext));
        if opts.force || !path.exists() {
            return path;
        }
        stem.push('+');
    }
}
