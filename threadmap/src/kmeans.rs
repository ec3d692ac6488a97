//! k-means over sRGB centroids with CIELAB Delta-E assignment

use crate::{
	color::{self, Color, LabColor},
	SampleCounts,
};
use palette::Srgb;
use rand::{distributions::WeightedIndex, prelude::Distribution, Rng, SeedableRng};
use rand_xoshiro::Xoroshiro128PlusPlus;

/// Hard ceiling on the number of k-means iterations
pub const MAX_ITERATIONS: u32 = 100;

/// k-means stops once no centroid moves more than this Delta-E in an iteration
pub const CONVERGENCE_DELTA_E: f64 = 1.0;

/// What happens to a centroid when no samples are assigned to it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptyClusters {
	/// The centroid becomes black (`#000000`)
	#[default]
	Black,
	/// The centroid keeps its previous value
	KeepPrevious,
}

/// Result from running k-means
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmeansResult {
	/// Final centroid colors, one per cluster (including empty clusters)
	pub centroids: Vec<Color>,
	/// Number of samples nearest to each centroid
	pub counts: Vec<u32>,
	/// Number of iterations in which the centroids moved
	pub iterations: u32,
	/// Whether k-means stopped before reaching the iteration limit
	pub converged: bool,
}

impl KmeansResult {
	/// Create an empty result, representing that k-means could not be run
	const fn empty() -> Self {
		Self {
			centroids: Vec::new(),
			counts: Vec::new(),
			iterations: 0,
			converged: true,
		}
	}
}

/// Running sums for each center
struct CenterData {
	/// Per-channel sum of all samples in this center
	sum: Vec<[u64; 3]>,
	/// Number of samples in this center
	count: Vec<u32>,
}

impl CenterData {
	/// Create a [`CenterData`] with the given number of centers
	fn new(k: usize) -> Self {
		Self { sum: vec![[0; 3]; k], count: vec![0; k] }
	}

	/// Clear all sums and counts
	fn reset(&mut self) {
		self.sum.fill([0; 3]);
		self.count.fill(0);
	}
}

/// Pick `k` samples at random, with replacement, weighting each color by its count
fn initial_centroids(k: u8, rng: &mut impl Rng, samples: &SampleCounts) -> Vec<Color> {
	let Ok(sampler) = WeightedIndex::new(&samples.counts) else {
		return Vec::new();
	};

	(0..k).map(|_| samples.colors[sampler.sample(rng)]).collect()
}

/// Index of the centroid closest to `lab`, preferring the lowest index on ties
pub(crate) fn nearest(lab: LabColor, centroids: &[LabColor]) -> usize {
	let mut min_dist = f64::INFINITY;
	let mut min_index = 0;
	for (i, &centroid) in centroids.iter().enumerate() {
		let dist = color::delta_e(lab, centroid);
		if dist < min_dist {
			min_dist = dist;
			min_index = i;
		}
	}
	min_index
}

/// Assign each sample to its nearest centroid, accumulating the center sums
fn update_assignments(samples: &SampleCounts, centroids: &[LabColor], centers: &mut CenterData) {
	centers.reset();
	for (color, lab, n) in samples.iter() {
		let i = nearest(lab, centroids);
		let nu = u64::from(n);
		let sum = &mut centers.sum[i];
		sum[0] += nu * u64::from(color.red);
		sum[1] += nu * u64::from(color.green);
		sum[2] += nu * u64::from(color.blue);
		centers.count[i] += n;
	}
}

/// Compute the new centroid of each center as the rounded mean of its samples
fn update_centroids(centers: &CenterData, previous: &[Color], empty: EmptyClusters) -> Vec<Color> {
	centers
		.sum
		.iter()
		.zip(&centers.count)
		.zip(previous)
		.map(|((sum, &n), &previous)| {
			if n == 0 {
				match empty {
					EmptyClusters::Black => Srgb::new(0, 0, 0),
					EmptyClusters::KeepPrevious => previous,
				}
			} else {
				let n = u64::from(n);
				// Round half up; the mean of u8 values always fits in a u8
				#[allow(clippy::cast_possible_truncation)]
				let mean = |s: u64| ((2 * s + n) / (2 * n)) as u8;
				Srgb::new(mean(sum[0]), mean(sum[1]), mean(sum[2]))
			}
		})
		.collect()
}

/// Whether any centroid moved more than [`CONVERGENCE_DELTA_E`]
fn moved(old: &[LabColor], new: &[LabColor]) -> bool {
	old.iter().zip(new).any(|(&x, &y)| color::delta_e(x, y) > CONVERGENCE_DELTA_E)
}

/// Run k-means from the given starting centroids.
///
/// Iteration stops when no centroid moves more than [`CONVERGENCE_DELTA_E`],
/// in which case the centroids from before that last update are kept,
/// or after `max_iter` (at most [`MAX_ITERATIONS`]) iterations.
#[must_use]
pub fn from_centroids(
	samples: &SampleCounts,
	initial: Vec<Color>,
	max_iter: u32,
	empty: EmptyClusters,
) -> KmeansResult {
	if samples.is_empty() || initial.is_empty() {
		return KmeansResult::empty();
	}

	let max_iter = max_iter.min(MAX_ITERATIONS);
	let mut centers = CenterData::new(initial.len());
	let mut centroids = initial;
	let mut labs = centroids.iter().copied().map(color::rgb_to_lab).collect::<Vec<_>>();

	let mut iterations = 0;
	let mut converged = false;
	while iterations < max_iter {
		update_assignments(samples, &labs, &mut centers);
		let new_centroids = update_centroids(&centers, &centroids, empty);
		let new_labs = new_centroids.iter().copied().map(color::rgb_to_lab).collect::<Vec<_>>();

		if !moved(&labs, &new_labs) {
			converged = true;
			break;
		}

		centroids = new_centroids;
		labs = new_labs;
		iterations += 1;
	}

	if !converged {
		update_assignments(samples, &labs, &mut centers);
	}

	tracing::debug!(iterations, converged, k = centroids.len(), "k-means finished");

	KmeansResult {
		centroids,
		counts: centers.count,
		iterations,
		converged,
	}
}

/// Run k-means with `k` centroids picked at random from the samples.
///
/// An empty result with no centroids is returned if `samples` is empty or `k` = 0.
#[must_use]
pub fn run(samples: &SampleCounts, k: u8, max_iter: u32, seed: u64, empty: EmptyClusters) -> KmeansResult {
	let mut rng = Xoroshiro128PlusPlus::seed_from_u64(seed);
	let initial = initial_centroids(k, &mut rng, samples);
	from_centroids(samples, initial, max_iter, empty)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn test_samples() -> SampleCounts {
		let mut samples = Vec::new();
		for (rgb, n) in [
			([250, 10, 10], 5),
			([240, 20, 0], 4),
			([10, 240, 20], 6),
			([0, 250, 0], 3),
			([20, 20, 230], 4),
			([10, 0, 250], 2),
		] {
			samples.extend(std::iter::repeat(rgb).take(n));
		}
		SampleCounts::from_samples(&samples)
	}

	#[test]
	fn initial_centroids_come_from_samples() {
		let samples = test_samples();
		let mut rng = Xoroshiro128PlusPlus::seed_from_u64(7);
		let centroids = initial_centroids(10, &mut rng, &samples);
		assert_eq!(centroids.len(), 10);
		assert!(centroids.iter().all(|c| samples.colors.contains(c)));
	}

	#[test]
	fn nearest_prefers_lowest_index_on_ties() {
		let lab = color::rgb_to_lab(Srgb::new(100, 100, 100));
		let other = color::rgb_to_lab(Srgb::new(0, 0, 0));
		assert_eq!(nearest(lab, &[other, lab, lab]), 1);
		assert_eq!(nearest(lab, &[]), 0);
	}

	#[test]
	fn update_centroids_rounds_the_mean() {
		let centers = CenterData { sum: vec![[3, 4, 5]], count: vec![2] };
		let result = update_centroids(&centers, &[Srgb::new(9, 9, 9)], EmptyClusters::Black);
		// 1.5 -> 2, 2.0 -> 2, 2.5 -> 3
		assert_eq!(result, vec![Srgb::new(2, 2, 3)]);
	}

	#[test]
	fn empty_cluster_collapses_to_black() {
		let centers = CenterData { sum: vec![[0; 3]], count: vec![0] };
		let previous = [Srgb::new(50, 60, 70)];
		assert_eq!(update_centroids(&centers, &previous, EmptyClusters::Black), vec![Srgb::new(0, 0, 0)]);
		assert_eq!(update_centroids(&centers, &previous, EmptyClusters::KeepPrevious), previous.to_vec());
	}

	#[test]
	fn duplicate_initial_centroid_yields_black() {
		let samples = test_samples();
		let red = Srgb::new(250, 10, 10);
		let green = Srgb::new(10, 240, 20);
		let blue = Srgb::new(20, 20, 230);

		// The second copy of red never wins a tie, so its cluster stays empty
		let result = from_centroids(&samples, vec![red, red, green, blue], MAX_ITERATIONS, EmptyClusters::Black);
		assert!(result.centroids.contains(&Srgb::new(0, 0, 0)));

		let result = from_centroids(
			&samples,
			vec![red, red, green, blue],
			MAX_ITERATIONS,
			EmptyClusters::KeepPrevious,
		);
		assert!(!result.centroids.contains(&Srgb::new(0, 0, 0)));
	}

	#[test]
	fn separated_clusters_converge_to_means() {
		let samples = test_samples();
		let initial = vec![Srgb::new(250, 10, 10), Srgb::new(0, 250, 0), Srgb::new(10, 0, 250)];
		let result = from_centroids(&samples, initial, MAX_ITERATIONS, EmptyClusters::Black);

		assert!(result.converged);
		assert_eq!(result.iterations, 1);
		// channel sums of the red cluster are (2210, 130, 50) over 9 samples
		assert_eq!(result.centroids[0], Srgb::new(246, 14, 6));
		assert_eq!(result.counts, vec![9, 9, 6]);
	}

	#[test]
	fn same_seed_gives_same_result() {
		let samples = test_samples();
		let x = run(&samples, 3, MAX_ITERATIONS, 42, EmptyClusters::Black);
		let y = run(&samples, 3, MAX_ITERATIONS, 42, EmptyClusters::Black);
		assert_eq!(x, y);
		assert!(x.iterations <= MAX_ITERATIONS);
	}

	#[test]
	fn max_iter_is_capped() {
		let samples = test_samples();
		let result = run(&samples, 3, u32::MAX, 0, EmptyClusters::Black);
		assert!(result.iterations <= MAX_ITERATIONS);

		let result = run(&samples, 3, 0, 0, EmptyClusters::Black);
		assert_eq!(result.iterations, 0);
		assert!(!result.converged);
		assert_eq!(result.counts.iter().sum::<u32>(), 24);
	}

	#[test]
	fn empty_inputs_give_empty_result() {
		assert_eq!(run(&SampleCounts::default(), 3, 10, 0, EmptyClusters::Black), KmeansResult::empty());
		assert_eq!(run(&test_samples(), 0, 10, 0, EmptyClusters::Black), KmeansResult::empty());
	}
}
