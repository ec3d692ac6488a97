//! Greedy nearest-neighbor matching of computed colors to actual material colors

use crate::{
	color::{self, Color},
	kmeans, ActualPalette, Palette,
};

/// The actual color assigned to one computed color
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MappingEntry {
	/// Index into the computed palette
	pub computed_index: usize,
	/// The computed color
	pub computed_color: Color,
	/// Index into the actual palette
	pub actual_index: usize,
	/// The actual color
	pub actual_color: Color,
	/// Delta-E between the computed and actual color at the time of matching
	pub distance: f64,
}

/// One [`MappingEntry`] per computed palette index, in palette order.
///
/// A mapping can only be created by [`match_palettes`], so every entry is consistent
/// with the palettes it was computed from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColorMapping(Vec<MappingEntry>);

impl ColorMapping {
	/// The entries of this mapping
	#[must_use]
	pub fn entries(&self) -> &[MappingEntry] {
		&self.0
	}

	/// Number of entries
	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Whether the mapping has no entries
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// The actual palette index that the given computed palette index maps to
	#[must_use]
	pub fn actual_index(&self, computed_index: usize) -> Option<usize> {
		self.0.get(computed_index).map(|entry| entry.actual_index)
	}

	/// The distinct actual palette indices used, in order of first appearance
	#[must_use]
	pub fn used_actual_indices(&self) -> Vec<usize> {
		self.used_actual_colors().into_iter().map(|(index, _)| index).collect()
	}

	/// Like [`ColorMapping::used_actual_indices`], but paired with the actual color
	#[must_use]
	pub fn used_actual_colors(&self) -> Vec<(usize, Color)> {
		let mut used: Vec<(usize, Color)> = Vec::new();
		for entry in &self.0 {
			if used.iter().all(|&(index, _)| index != entry.actual_index) {
				used.push((entry.actual_index, entry.actual_color));
			}
		}
		used
	}

	/// Actual indices and colors of each entry, used as a structural cache key
	pub(crate) fn key(&self) -> Vec<(usize, u32)> {
		self.0
			.iter()
			.map(|entry| {
				let c = entry.actual_color;
				(entry.actual_index, color::pack([c.red, c.green, c.blue]))
			})
			.collect()
	}
}

/// For each computed color, find the actual color with the smallest Delta-E.
///
/// Several computed colors may map to the same actual color.
/// Ties go to the lowest actual index. If either palette is empty, the mapping is empty.
#[must_use]
pub fn match_palettes(computed: &Palette, actual: &ActualPalette) -> ColorMapping {
	if computed.is_empty() || actual.is_empty() {
		return ColorMapping::default();
	}

	let actual_labs = actual.iter().copied().map(color::rgb_to_lab).collect::<Vec<_>>();

	let entries = computed
		.iter()
		.enumerate()
		.map(|(computed_index, &computed_color)| {
			let lab = color::rgb_to_lab(computed_color);
			let actual_index = kmeans::nearest(lab, &actual_labs);
			MappingEntry {
				computed_index,
				computed_color,
				actual_index,
				actual_color: actual[actual_index],
				distance: color::delta_e(lab, actual_labs[actual_index]),
			}
		})
		.collect();

	ColorMapping(entries)
}
