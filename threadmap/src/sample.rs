//! Pixel sampling and per-color bookkeeping for clustering

use crate::{
	color::{self, Color, LabColor},
	Image,
};
use palette::Srgb;
use std::collections::HashMap;

/// Bounds the number of pixels looked at when extracting a palette.
///
/// This is a performance knob only. The caller decides the budget (e.g., based on the device),
/// so that each extraction costs roughly the same regardless of image resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleBudget {
	/// Take every `stride`th pixel
	pub stride: u32,
	/// Hard cap on the number of samples after striding
	pub max_samples: u32,
}

impl Default for SampleBudget {
	fn default() -> Self {
		Self::desktop()
	}
}

impl SampleBudget {
	/// Budget suited for desktop machines
	#[must_use]
	pub const fn desktop() -> Self {
		Self { stride: 6, max_samples: 5000 }
	}

	/// Budget suited for phones, striding more aggressively for larger images
	#[must_use]
	pub const fn mobile(pixel_count: usize) -> Self {
		let stride = if pixel_count > 200_000 {
			24
		} else if pixel_count > 100_000 {
			16
		} else if pixel_count > 50_000 {
			12
		} else {
			8
		};

		Self { stride, max_samples: 2000 }
	}

	/// Take a deterministic, evenly spaced subset of the image's pixels.
	///
	/// The result never has more than `max_samples` entries.
	pub(crate) fn sample(&self, image: &Image) -> Vec<[u8; 3]> {
		let stride = self.stride.max(1) as usize;
		let max_samples = self.max_samples.max(1) as usize;

		let strided = image.rgb().step_by(stride).collect::<Vec<_>>();
		if strided.len() <= max_samples {
			strided
		} else {
			let ratio = strided.len().div_ceil(max_samples);
			strided.into_iter().step_by(ratio).collect()
		}
	}
}

/// Deduplicated sample colors along with their CIELAB values
#[derive(Debug, Clone, Default)]
pub struct SampleCounts {
	/// Distinct sRGB colors in order of first appearance
	pub(crate) colors: Vec<Color>,
	/// CIELAB value of each color
	pub(crate) labs: Vec<LabColor>,
	/// Number of samples with each color
	pub(crate) counts: Vec<u32>,
}

impl SampleCounts {
	/// Group identical samples, converting each distinct color to CIELAB once
	#[must_use]
	pub fn from_samples(samples: &[[u8; 3]]) -> Self {
		let mut data = Self::default();

		// Packed sRGB -> data index
		let mut memo: HashMap<u32, usize> = HashMap::new();

		for &rgb in samples {
			let index = *memo.entry(color::pack(rgb)).or_insert_with(|| {
				let srgb = Srgb::new(rgb[0], rgb[1], rgb[2]);
				data.colors.push(srgb);
				data.labs.push(color::rgb_to_lab(srgb));
				data.counts.push(0);
				data.colors.len() - 1
			});

			data.counts[index] += 1;
		}

		data
	}

	/// Number of distinct colors
	#[must_use]
	pub fn num_colors(&self) -> usize {
		self.colors.len()
	}

	/// Total number of samples
	#[must_use]
	pub fn num_samples(&self) -> u64 {
		self.counts.iter().copied().map(u64::from).sum()
	}

	/// Whether there are no samples
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.colors.is_empty()
	}

	/// Iterate over each distinct color, its CIELAB value, and its count
	pub(crate) fn iter(&self) -> impl Iterator<Item = (Color, LabColor, u32)> + '_ {
		self.colors
			.iter()
			.zip(&self.labs)
			.zip(&self.counts)
			.map(|((&color, &lab), &n)| (color, lab, n))
	}
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
	use super::*;
	use crate::ResourceLimits;

	fn gradient(width: u32, height: u32) -> Image {
		#[allow(clippy::cast_possible_truncation)]
		let data = (0..width * height).flat_map(|i| [(i % 256) as u8, (i / 256 % 256) as u8, 7, 255]).collect();
		Image::from_raw(width, height, data, &ResourceLimits::default()).unwrap()
	}

	#[test]
	fn mobile_budget_strides_by_image_size() {
		assert_eq!(SampleBudget::mobile(10_000).stride, 8);
		assert_eq!(SampleBudget::mobile(60_000).stride, 12);
		assert_eq!(SampleBudget::mobile(150_000).stride, 16);
		assert_eq!(SampleBudget::mobile(1_000_000).stride, 24);
		assert_eq!(SampleBudget::mobile(1).max_samples, 2000);
	}

	#[test]
	fn stride_takes_every_nth_pixel() {
		let image = gradient(10, 1);
		let budget = SampleBudget { stride: 3, max_samples: 100 };
		let samples = budget.sample(&image);
		assert_eq!(samples, vec![[0, 0, 7], [3, 0, 7], [6, 0, 7], [9, 0, 7]]);
	}

	#[test]
	fn samples_never_exceed_cap() {
		let image = gradient(300, 200);
		for max_samples in [1, 7, 999, 1000, 1001, 5000, 60_000] {
			let budget = SampleBudget { stride: 1, max_samples };
			let samples = budget.sample(&image);
			assert!(samples.len() <= max_samples as usize);
			assert!(!samples.is_empty());
		}
	}

	#[test]
	fn zero_stride_is_treated_as_one() {
		let image = gradient(4, 1);
		let samples = SampleBudget { stride: 0, max_samples: 10 }.sample(&image);
		assert_eq!(samples.len(), 4);
	}

	#[test]
	fn counts_group_duplicates_in_first_seen_order() {
		let counts = SampleCounts::from_samples(&[[1, 1, 1], [2, 2, 2], [1, 1, 1], [1, 1, 1]]);
		assert_eq!(counts.colors, vec![Srgb::new(1, 1, 1), Srgb::new(2, 2, 2)]);
		assert_eq!(counts.counts, vec![3, 1]);
		assert_eq!(counts.num_samples(), 4);
		assert_eq!(counts.labs[0], color::rgb_to_lab(Srgb::new(1, 1, 1)));
	}
}
