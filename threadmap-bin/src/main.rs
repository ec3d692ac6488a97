//! Reduce an image to a small thread palette, map it onto the available thread colors, and write region masks.

#![deny(unsafe_code, unsafe_op_in_unsafe_fn)]
#![warn(
    clippy::pedantic,
    clippy::cargo,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,
    clippy::unwrap_in_result,
    clippy::unneeded_field_pattern,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unnecessary_self_imports,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::string_slice,
    missing_docs,
    clippy::missing_docs_in_private_items,
    rustdoc::all,
    clippy::float_cmp_const,
    clippy::lossy_float_literal
)]
#![allow(
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    clippy::missing_panics_doc,
    clippy::unreadable_literal
)]

mod cli;

#[allow(clippy::wildcard_imports)]
use cli::*;

use std::{
    fmt::{self, Display},
    path::{Path, PathBuf},
    process::ExitCode,
    time::Instant,
};

use clap::Parser;
use colored::Colorize;
use image::{DynamicImage, GenericImageView};
use serde::Serialize;
use threadmap::{
    Action, Color, EmptyClusters, ExtractMethod, ExtractOptions, Image, PipelineError, ResourceLimits,
    RetryPolicy, SampleBudget, Session, Tones,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Record the running time of a function and log the elapsed time
macro_rules! time {
    ($name: literal, $func_call: expr) => {{
        let start = Instant::now();
        let result = $func_call;
        tracing::info!("{} took {}ms", $name, start.elapsed().as_millis());
        result
    }};
}

/// Error cases for the command line application
#[derive(Debug)]
enum CliError {
    /// Failed to read or decode the image file
    ImageLoad(image::ImageError),
    /// A pipeline stage failed
    Pipeline(PipelineError),
    /// Failed to create the output directory
    CreateDir(PathBuf, std::io::Error),
    /// Failed to encode or write a mask
    MaskWrite(PathBuf, image::ImageError),
    /// Failed to serialize the JSON report
    Json(serde_json::Error),
}

impl Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CliError::ImageLoad(e) => write!(f, "Failed to load the image file: {e}"),
            CliError::Pipeline(e) => write!(f, "Failed to process the image: {e}"),
            CliError::CreateDir(path, e) => {
                write!(f, "Failed to create the directory {}: {e}", path.display())
            }
            CliError::MaskWrite(path, e) => {
                write!(f, "Failed to write the mask {}: {e}", path.display())
            }
            CliError::Json(e) => write!(f, "Failed to serialize the report: {e}"),
        }
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        CliError::Pipeline(e)
    }
}

/// One mapping entry in the JSON report
#[derive(Serialize)]
struct MappingReport {
    /// Index into the computed palette
    computed_index: usize,
    /// The computed color
    computed: String,
    /// Index into the actual palette
    actual_index: usize,
    /// The actual color
    actual: String,
    /// Delta-E between both colors
    delta_e: f64,
}

/// Everything printed by `--output json`
#[derive(Serialize)]
struct Report {
    /// The computed palette, background first
    palette: Vec<String>,
    /// The thread colors
    actual: Vec<String>,
    /// The nearest thread color for each palette color
    mapping: Vec<MappingReport>,
    /// Paths of all written masks
    masks: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let options = Options::parse();

    init_logging(options.verbose);

    let result = run_generate_and_print_palette(&options);

    // Returning Result<_> uses Debug printing instead of Display
    if let Err(e) = result {
        eprintln!("{e}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Log to stderr, at debug level for `--verbose`, unless overridden by `RUST_LOG`
fn init_logging(verbose: bool) {
    let default = if verbose { "threadmap=debug" } else { "threadmap=warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Builds a thread pool and then runs `generate_and_print_palette`
#[cfg(feature = "threads")]
fn run_generate_and_print_palette(options: &Options) -> Result<(), CliError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(usize::from(options.threads))
        .build()
        .expect("initialized thread pool");

    pool.install(|| generate_and_print_palette(options))
}

/// Runs `generate_and_print_palette` on a single thread
#[cfg(not(feature = "threads"))]
fn run_generate_and_print_palette(options: &Options) -> Result<(), CliError> {
    generate_and_print_palette(options)
}

/// Load an image, generate its palette and masks, and print the result using the given options
fn generate_and_print_palette(options: &Options) -> Result<(), CliError> {
    // Input
    let img = time!("Image loading", load_image(&options.image))?;
    let img = generate_thumbnail(img, options.max_pixels);
    let img = match options.blur {
        Some(sigma) if sigma > 0.0 => time!("Blur", img.blur(sigma)),
        _ => img,
    };

    let limits = ResourceLimits { max_pixels: u64::from(options.max_pixels) };
    let image = Image::new(img.into_rgba8(), &limits)?;

    // Processing
    let mut session = Session::new(extract_options(options, &image), RetryPolicy::IMMEDIATE, 1);
    session.dispatch(Action::SetImage(image));

    if options.background == Background::Auto {
        let color = session.detect_background(options.edge_percent)?;
        tracing::debug!("Detected background {}", threadmap::rgb_to_hex(color));
    }

    time!("Palette extraction", session.extract())?;

    if options.sync_actual {
        session.dispatch(Action::SetSyncActual(true));
    }
    for &color in &options.actual {
        session.dispatch(Action::AddActual(color));
    }

    // Output
    let masks = match &options.out_dir {
        Some(dir) => time!("Mask generation", write_masks(&mut session, dir))?,
        None => Vec::new(),
    };

    print_results(session.state(), masks, options)
}

/// Load the image at the given path
fn load_image(path: &Path) -> Result<DynamicImage, CliError> {
    image::open(path).map_err(CliError::ImageLoad)
}

/// Create a thumbnail with at most `max_pixels` pixels if the image has more than `max_pixels` pixels
fn generate_thumbnail(image: DynamicImage, max_pixels: u32) -> DynamicImage {
    // The number of pixels should be < u64::MAX, since image dimensions are (u32, u32)
    let (width, height) = image.dimensions();
    let pixels = u64::from(width) * u64::from(height);
    if pixels <= u64::from(max_pixels) {
        tracing::debug!("Skipping image thumbnail since pixels was below max pixels");
        image
    } else {
        // (u64 as f64) only gives innaccurate results for very large u64
        // I.e, only when pixels is in the order of quintillions
        #[allow(clippy::cast_precision_loss)]
        let scale = (f64::from(max_pixels) / pixels as f64).sqrt();

        // multiplying by a positive factor < 1
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (thumb_width, thumb_height) = (
            (f64::from(width) * scale) as u32,
            (f64::from(height) * scale) as u32,
        );

        tracing::debug!("Creating a thumbnail with dimensions {thumb_width}x{thumb_height}");

        time!("Image thumbnail", image.thumbnail(thumb_width, thumb_height))
    }
}

/// Build the palette extraction options from the command line options
fn extract_options(options: &Options, image: &Image) -> ExtractOptions {
    let method = match options.method {
        Method::Kmeans => ExtractMethod::Kmeans,
        Method::Tones => ExtractMethod::Tones(options.tones.unwrap_or(Tones::split(usize::from(options.k)))),
    };

    let budget = if options.mobile {
        SampleBudget::mobile(image.pixel_count())
    } else {
        SampleBudget::desktop()
    };

    let budget = SampleBudget {
        stride: options.stride.unwrap_or(budget.stride),
        max_samples: options.max_samples.unwrap_or(budget.max_samples),
    };

    let background = match options.background {
        Background::Fixed(color) => color,
        Background::Auto => ExtractOptions::default().background,
    };

    ExtractOptions {
        method,
        k: options.k,
        min_delta_e: options.min_delta_e,
        background,
        budget,
        seed: options.seed,
        empty_clusters: if options.keep_empty_clusters {
            EmptyClusters::KeepPrevious
        } else {
            EmptyClusters::Black
        },
        max_iter: options.max_iter,
    }
}

/// Save a mask as a PNG file, returning its path
fn save_mask(mask: &threadmap::Mask, path: PathBuf) -> Result<PathBuf, CliError> {
    match mask.save_with_format(&path, image::ImageFormat::Png) {
        Ok(()) => Ok(path),
        Err(e) => Err(CliError::MaskWrite(path, e)),
    }
}

/// Write the palette masks and, if there is a mapping, the thread color masks to `dir`
fn write_masks(session: &mut Session, dir: &Path) -> Result<Vec<PathBuf>, CliError> {
    std::fs::create_dir_all(dir).map_err(|e| CliError::CreateDir(dir.to_owned(), e))?;

    let mut paths = Vec::new();

    for (i, mask) in session.masks()?.iter().enumerate() {
        paths.push(save_mask(mask, dir.join(format!("mask-{i}.png")))?);
    }

    for mapped in session.mapped_masks()?.iter() {
        let path = dir.join(format!("actual-{}.png", mapped.actual_index));
        paths.push(save_mask(&mapped.mask, path)?);
    }

    Ok(paths)
}

/// Print the palette, the thread colors, and the mapping based off the provided options
fn print_results(state: &threadmap::State, masks: Vec<PathBuf>, options: &Options) -> Result<(), CliError> {
    if let FormatOutput::Json = options.output {
        let report = Report {
            palette: state.palette.to_hex(),
            actual: state.actual.to_hex(),
            mapping: state
                .mapping
                .entries()
                .iter()
                .map(|entry| MappingReport {
                    computed_index: entry.computed_index,
                    computed: threadmap::rgb_to_hex(entry.computed_color),
                    actual_index: entry.actual_index,
                    actual: threadmap::rgb_to_hex(entry.actual_color),
                    delta_e: entry.distance,
                })
                .collect(),
            masks,
        };

        println!("{}", serde_json::to_string_pretty(&report).map_err(CliError::Json)?);
        return Ok(());
    }

    print_palette(&state.palette, options);

    if !state.actual.is_empty() {
        print_palette(&state.actual, options);
    }

    for entry in state.mapping.entries() {
        println!(
            "{} {} -> {} {} (Delta-E {:.2})",
            entry.computed_index,
            format_color(entry.computed_color, options),
            entry.actual_index,
            format_color(entry.actual_color, options),
            entry.distance,
        );
    }

    for path in &masks {
        tracing::info!("Wrote {}", path.display());
    }

    Ok(())
}

/// Print a line of colors
fn print_palette(colors: &[Color], options: &Options) {
    let delimiter = if let FormatOutput::Swatch = options.output { "" } else { " " };
    println!(
        "{}",
        colors
            .iter()
            .map(|&color| format_color(color, options))
            .collect::<Vec<_>>()
            .join(delimiter)
    );
}

/// Format and colorize a single color
fn format_color(color: Color, options: &Options) -> String {
    let text = match options.output {
        FormatOutput::Swatch => {
            return "   "
                .on_truecolor(color.red, color.green, color.blue)
                .to_string()
        }
        FormatOutput::Rgb => format!("({},{},{})", color.red, color.green, color.blue),
        FormatOutput::Hex | FormatOutput::Json => threadmap::rgb_to_hex(color),
    };

    match options.colorize {
        Some(ColorizeOutput::Fg) => text
            .truecolor(color.red, color.green, color.blue)
            .to_string(),
        Some(ColorizeOutput::Bg) => text
            .on_truecolor(color.red, color.green, color.blue)
            .to_string(),
        None => text,
    }
}
