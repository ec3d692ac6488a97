//! Palette extraction: sampling, clustering, and similarity filtering

use crate::{
	color::{self, Color, LabColor},
	kmeans::{self, EmptyClusters},
	Image, Palette, SampleBudget, SampleCounts,
};
use palette::Srgb;

/// Number of colors to take from each lightness band for [`ExtractMethod::Tones`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tones {
	/// Colors from the darkest third of the samples
	pub dark: usize,
	/// Colors from the middle third of the samples
	pub mid: usize,
	/// Colors from the lightest third of the samples
	pub light: usize,
}

impl Tones {
	/// Split a total number of colors evenly across the bands, giving the remainder to the middle band
	#[must_use]
	pub const fn split(total: usize) -> Self {
		let per_band = total / 3;
		Self {
			dark: per_band,
			mid: per_band + total % 3,
			light: per_band,
		}
	}

	/// The total number of colors across all bands
	#[must_use]
	pub const fn total(&self) -> usize {
		self.dark + self.mid + self.light
	}
}

/// How the foreground colors are found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractMethod {
	/// k-means clustering followed by a minimum Delta-E filter
	#[default]
	Kmeans,
	/// Distinct colors picked from the dark, mid, and light thirds of the samples
	Tones(Tones),
}

/// Parameters for [`extract_palette`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtractOptions {
	/// The algorithm to use
	pub method: ExtractMethod,
	/// The (maximum) number of foreground colors for k-means
	pub k: u8,
	/// Minimum Delta-E between any two foreground colors
	pub min_delta_e: f64,
	/// The background color, always placed at index 0
	pub background: Color,
	/// Limits on how many pixels are sampled
	pub budget: SampleBudget,
	/// Seed used to choose the initial k-means centroids
	pub seed: u64,
	/// What k-means does with clusters that have no samples
	pub empty_clusters: EmptyClusters,
	/// Maximum number of k-means iterations, capped at [`kmeans::MAX_ITERATIONS`]
	pub max_iter: u32,
}

impl Default for ExtractOptions {
	fn default() -> Self {
		Self {
			method: ExtractMethod::Kmeans,
			k: 3,
			min_delta_e: 10.0,
			background: Srgb::new(255, 255, 255),
			budget: SampleBudget::desktop(),
			seed: 0,
			empty_clusters: EmptyClusters::Black,
			max_iter: kmeans::MAX_ITERATIONS,
		}
	}
}

/// Greedily keep each color whose Delta-E to every already kept color is at least `min_delta_e`
fn filter_by_delta_e(colors: impl IntoIterator<Item = (Color, LabColor)>, min_delta_e: f64) -> Vec<(Color, LabColor)> {
	let mut kept: Vec<(Color, LabColor)> = Vec::new();
	for (color, lab) in colors {
		if kept.iter().all(|&(_, other)| color::delta_e(lab, other) >= min_delta_e) {
			kept.push((color, lab));
		}
	}
	kept
}

/// Sort colors by descending lightness, then drop colors too similar to a lighter one
#[must_use]
pub fn dedupe(colors: &[Color], min_delta_e: f64) -> Vec<Color> {
	let mut labeled = colors.iter().map(|&c| (c, color::rgb_to_lab(c))).collect::<Vec<_>>();
	labeled.sort_by(|(_, x), (_, y)| f64::total_cmp(&y.l, &x.l));
	filter_by_delta_e(labeled, min_delta_e)
		.into_iter()
		.map(|(color, _)| color)
		.collect()
}

/// Pick distinct colors from the dark, mid, and light thirds of the samples
#[must_use]
pub fn cluster_by_tones(samples: &[[u8; 3]], tones: Tones, min_delta_e: f64) -> Vec<Color> {
	let mut labeled = samples
		.iter()
		.map(|&[r, g, b]| {
			let color = Srgb::new(r, g, b);
			(color, color::rgb_to_lab(color))
		})
		.collect::<Vec<_>>();

	labeled.sort_by(|(_, x), (_, y)| f64::total_cmp(&x.l, &y.l));

	let n = labeled.len();
	let (dark, rest) = labeled.split_at(n / 3);
	let (mid, light) = rest.split_at(2 * n / 3 - n / 3);

	[(dark, tones.dark), (mid, tones.mid), (light, tones.light)]
		.into_iter()
		.flat_map(|(band, take)| {
			filter_by_delta_e(band.iter().copied(), min_delta_e)
				.into_iter()
				.take(take)
				.map(|(color, _)| color)
		})
		.collect()
}

/// Extract a palette from an image.
///
/// The returned palette always starts with `options.background`,
/// followed by at most `k` (or [`Tones::total`]) foreground colors.
#[must_use]
pub fn extract_palette(image: &Image, options: &ExtractOptions) -> Palette {
	let samples = options.budget.sample(image);

	tracing::debug!(
		pixels = image.pixel_count(),
		samples = samples.len(),
		stride = options.budget.stride,
		"sampled image"
	);

	let foreground = match options.method {
		ExtractMethod::Kmeans => {
			let counts = SampleCounts::from_samples(&samples);
			let result = kmeans::run(&counts, options.k, options.max_iter, options.seed, options.empty_clusters);
			dedupe(&result.centroids, options.min_delta_e)
		},
		ExtractMethod::Tones(tones) => cluster_by_tones(&samples, tones, options.min_delta_e),
	};

	Palette::new(options.background, foreground)
}
