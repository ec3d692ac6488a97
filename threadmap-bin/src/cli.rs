//! Specifies the CLI and handles arg parsing

use clap::{Parser, ValueEnum};
use std::{
    fmt::{Debug, Display},
    num::ParseFloatError,
    ops::RangeBounds,
    path::PathBuf,
    str::FromStr,
};
use threadmap::{Color, Tones};

/// Supported output formats for the final colors
#[derive(Copy, Clone, ValueEnum)]
pub enum FormatOutput {
    /// sRGB hexcode
    Hex,
    /// sRGB (r,g,b) triple
    Rgb,
    /// Whitespace with true color background
    Swatch,
    /// A JSON report of the palettes, the mapping, and the written masks
    Json,
}

/// Ways to colorize the output text
#[derive(Copy, Clone, ValueEnum)]
pub enum ColorizeOutput {
    /// Foreground
    Fg,
    /// Background
    Bg,
}

/// Algorithms for finding the foreground colors
#[derive(Copy, Clone, ValueEnum)]
pub enum Method {
    /// k-means clustering in sRGB with CIELAB color difference
    Kmeans,
    /// Distinct colors from the dark, mid, and light thirds of the image
    Tones,
}

/// Where the background color comes from
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Background {
    /// Average color of the image border
    Auto,
    /// A fixed color
    Fixed(Color),
}

/// Reduce an image to a small thread palette and write one black/white mask per color.
///
/// Colors are compared in CIELAB using Delta-E.
/// The first color printed is always the background color.
#[allow(clippy::struct_excessive_bools)]
#[derive(Parser)]
#[command(version)]
pub struct Options {
    /// The path to the input image
    pub image: PathBuf,

    /// The format to print the colors in
    #[arg(short, long, default_value = "hex")]
    pub output: FormatOutput,

    /// Color the foreground or background for each printed color
    #[arg(short, long)]
    pub colorize: Option<ColorizeOutput>,

    /// The (maximum) number of foreground colors to find
    #[arg(short, default_value_t = 3)]
    pub k: u8,

    /// The algorithm used to find the foreground colors
    #[arg(short, long, default_value = "kmeans")]
    pub method: Method,

    /// Number of dark, mid, and light colors for the tones method, e.g. "2,4,2"
    ///
    /// Defaults to splitting k evenly, with the remainder going to the mid tones.
    #[arg(long, value_parser = parse_tones)]
    pub tones: Option<Tones>,

    /// The minimum Delta-E between any two foreground colors
    ///
    /// Colors closer than this to a lighter color are dropped,
    /// so fewer than k colors may be printed.
    #[arg(short = 'd', long, default_value_t = 10.0, value_parser = parse_valid_delta_e)]
    pub min_delta_e: f64,

    /// The background color as a hexcode, or "auto" to use the average color of the image border
    #[arg(short, long, default_value = "#ffffff", value_parser = parse_background)]
    pub background: Background,

    /// Width of the image border used by "--background auto", in percent of the image height (top and bottom) and width (sides)
    #[arg(long, default_value_t = threadmap::background::DEFAULT_EDGE_PERCENT, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub edge_percent: u32,

    /// A comma separated list of hexcodes for the thread colors you have
    ///
    /// Each palette color is mapped to the closest of these,
    /// and one mask is written per thread color that is used.
    #[arg(short, long, value_delimiter = ',', value_parser = parse_color)]
    pub actual: Vec<Color>,

    /// Use the computed palette itself as the thread colors
    #[arg(long, conflicts_with = "actual")]
    pub sync_actual: bool,

    /// The maximum image size, in number of pixels, before a thumbnail is created
    #[arg(short = 'p', long, default_value_t = 4096 * 4096)]
    pub max_pixels: u32,

    /// Blur the image with this standard deviation before extracting colors
    #[arg(long, value_parser = parse_valid_sigma)]
    pub blur: Option<f32>,

    /// Use the sampling budget meant for phones instead of the desktop one
    #[arg(long)]
    pub mobile: bool,

    /// Sample every nth pixel, overriding the budget's stride
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub stride: Option<u32>,

    /// The maximum number of sampled pixels, overriding the budget's cap
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_samples: Option<u32>,

    /// The maximum number of k-means iterations
    #[arg(short = 'i', long, default_value_t = threadmap::kmeans::MAX_ITERATIONS, value_parser = clap::value_parser!(u32).range(..=i64::from(threadmap::kmeans::MAX_ITERATIONS)))]
    pub max_iter: u32,

    /// Keep the previous centroid for k-means clusters that lose all their pixels, instead of making them black
    #[arg(long)]
    pub keep_empty_clusters: bool,

    /// The seed value used for the random number generator
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Write mask-<i>.png for each palette color and actual-<j>.png for each used thread color to this directory
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// The number of threads to use for painting masks
    #[cfg(feature = "threads")]
    #[arg(short, long, default_value_t = 4)]
    pub threads: u8,

    /// Print additional information, such as timings and the number of k-means iterations
    #[arg(long)]
    pub verbose: bool,
}

/// Parse a float value and ensure it in the provided, valid range
fn parse_float_in_range<T>(s: &str, range: impl RangeBounds<T> + Debug) -> Result<T, String>
where
    T: FromStr<Err = ParseFloatError> + Display + PartialOrd,
{
    let value: T = s.parse().map_err(|e| format!("{e}"))?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not in {range:?}"))
    }
}

/// Parse the minimum Delta-E and ensure it is >= `0.0`
fn parse_valid_delta_e(s: &str) -> Result<f64, String> {
    parse_float_in_range(s, 0.0..)
}

/// Parse the blur sigma and ensure it is >= `0.0`
fn parse_valid_sigma(s: &str) -> Result<f32, String> {
    parse_float_in_range(s, 0.0..)
}

/// Parse a `#rrggbb` hexcode
fn parse_color(s: &str) -> Result<Color, String> {
    threadmap::hex_to_rgb(s).map_err(|e| e.to_string())
}

/// Parse either "auto" or a hexcode
fn parse_background(s: &str) -> Result<Background, String> {
    if s.eq_ignore_ascii_case("auto") {
        Ok(Background::Auto)
    } else {
        parse_color(s).map(Background::Fixed)
    }
}

/// Parse three comma separated counts
fn parse_tones(s: &str) -> Result<Tones, String> {
    let counts = s
        .split(',')
        .map(|n| n.trim().parse::<usize>().map_err(|e| format!("{n:?}: {e}")))
        .collect::<Result<Vec<_>, _>>()?;

    match counts[..] {
        [dark, mid, light] => Ok(Tones { dark, mid, light }),
        _ => Err(format!("expected 3 counts but got {}", counts.len())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn float_ranges() {
        assert_eq!(parse_valid_delta_e("2.5"), Ok(2.5));
        assert_eq!(parse_valid_delta_e("0"), Ok(0.0));
        assert!(parse_valid_delta_e("-1").is_err());
        assert!(parse_valid_delta_e("abc").is_err());
        assert!(parse_valid_sigma("-0.5").is_err());
    }

    #[test]
    fn background_values() {
        assert_eq!(parse_background("auto"), Ok(Background::Auto));
        assert_eq!(parse_background("AUTO"), Ok(Background::Auto));
        assert_eq!(parse_background("#FF8000"), Ok(Background::Fixed(Color::new(255, 128, 0))));
        assert!(parse_background("ff8000").is_err());
    }

    #[test]
    fn tone_counts() {
        assert_eq!(parse_tones("2,4,2"), Ok(Tones { dark: 2, mid: 4, light: 2 }));
        assert_eq!(parse_tones("0, 1, 0"), Ok(Tones { dark: 0, mid: 1, light: 0 }));
        assert!(parse_tones("1,2").is_err());
        assert!(parse_tones("1,2,x").is_err());
    }

    #[test]
    fn parses_full_command_line() {
        let options = Options::try_parse_from([
            "threadmap",
            "photo.png",
            "-k",
            "6",
            "--method",
            "tones",
            "--actual",
            "#111111,#ee0000",
            "--background",
            "auto",
            "--stride",
            "2",
        ])
        .unwrap();

        assert_eq!(options.k, 6);
        assert!(matches!(options.method, Method::Tones));
        assert_eq!(options.actual, vec![Color::new(0x11, 0x11, 0x11), Color::new(0xee, 0, 0)]);
        assert_eq!(options.background, Background::Auto);
        assert_eq!(options.stride, Some(2));
        assert_eq!(options.edge_percent, 10);
        assert_eq!(options.max_iter, 100);
        assert!(options.tones.is_none());
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(Options::try_parse_from(["threadmap", "x.png", "--actual", "#12345"]).is_err());
        assert!(Options::try_parse_from(["threadmap", "x.png", "--edge-percent", "0"]).is_err());
        assert!(Options::try_parse_from(["threadmap", "x.png", "--max-iter", "101"]).is_err());
        assert!(Options::try_parse_from(["threadmap", "x.png", "--sync-actual", "--actual", "#000000"]).is_err());
    }
}
