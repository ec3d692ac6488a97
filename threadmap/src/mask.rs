//! Nearest-color assignment of pixels and rendering of black/white masks

use crate::{
	color::{self, Color},
	ColorMapping, Image,
};
use image::{Rgba, RgbaImage};
use std::collections::HashMap;

#[cfg(feature = "threads")]
use rayon::prelude::*;

/// A black/white image where black pixels belong to one palette color
pub type Mask = RgbaImage;

/// Pixel value for pixels owned by the mask's color
const ASSIGNED: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Pixel value for all other pixels
const UNASSIGNED: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// A mask covering all pixels whose computed color maps to one actual color
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedMask {
	/// Index into the actual palette
	pub actual_index: usize,
	/// The actual color
	pub color: Color,
	/// The mask
	pub mask: Mask,
}

/// Index of the palette color with the smallest RGB distance, preferring the lowest index on ties
fn nearest_rgb(rgb: [u8; 3], palette: &[Color]) -> usize {
	let mut min_dist = u32::MAX;
	let mut min_index = 0;
	for (i, &color) in palette.iter().enumerate() {
		let dist = color::rgb_distance_squared(rgb, color);
		if dist < min_dist {
			min_dist = dist;
			min_index = i;
		}
	}
	min_index
}

/// Assign each pixel of an RGBA byte slice, memoizing the result per distinct color
fn assign_slice(rgba: &[u8], palette: &[Color]) -> Vec<usize> {
	// Packed sRGB -> palette index
	let mut memo: HashMap<u32, usize> = HashMap::new();
	rgba.chunks_exact(4)
		.map(|px| {
			let rgb = [px[0], px[1], px[2]];
			*memo
				.entry(color::pack(rgb))
				.or_insert_with(|| nearest_rgb(rgb, palette))
		})
		.collect()
}

/// For every pixel in row-major order, the index of the nearest palette color by RGB distance.
///
/// Alpha is ignored. Ties go to the lowest palette index.
/// Returns an empty `Vec` if the palette is empty.
#[must_use]
pub fn assign(image: &Image, palette: &[Color]) -> Vec<usize> {
	if palette.is_empty() {
		return Vec::new();
	}

	let rgba = image.pixels().as_raw();

	#[cfg(not(feature = "threads"))]
	{
		assign_slice(rgba, palette)
	}

	#[cfg(feature = "threads")]
	{
		let row_len = (image.width() as usize * 4).max(4);
		rgba.par_chunks(row_len)
			.map(|row| assign_slice(row, palette))
			.collect::<Vec<_>>()
			.concat()
	}
}

/// Render a mask that is black wherever `owned` holds for the pixel's assignment
fn paint(width: u32, height: u32, assignments: &[usize], owned: impl Fn(usize) -> bool) -> Mask {
	let mut mask = RgbaImage::from_pixel(width, height, UNASSIGNED);
	for (px, &index) in mask.pixels_mut().zip(assignments) {
		if owned(index) {
			*px = ASSIGNED;
		}
	}
	mask
}

/// Generate one mask per palette color, in palette order.
///
/// Every pixel is black in exactly one of the returned masks.
/// An empty palette gives no masks.
#[must_use]
pub fn generate_masks(image: &Image, palette: &[Color]) -> Vec<Mask> {
	let assignments = assign(image, palette);
	let (width, height) = (image.width(), image.height());
	let paint_index = |i: usize| paint(width, height, &assignments, |index| index == i);

	#[cfg(not(feature = "threads"))]
	{
		(0..palette.len()).map(paint_index).collect()
	}

	#[cfg(feature = "threads")]
	{
		(0..palette.len()).into_par_iter().map(paint_index).collect()
	}
}

/// Generate one mask per actual color referenced by `mapping`.
///
/// Pixels are assigned to the nearest computed color as in [`generate_masks`]
/// and then fused by the actual color that their computed color maps to.
/// Masks are ordered by the first appearance of each actual index in the mapping.
/// Actual colors that no computed color maps to get no mask.
///
/// `mapping` must have been computed for `palette`.
/// No masks are returned if it has a different number of entries.
#[must_use]
pub fn generate_mapped_masks(image: &Image, palette: &[Color], mapping: &ColorMapping) -> Vec<MappedMask> {
	if mapping.is_empty() {
		return Vec::new();
	}

	if mapping.len() != palette.len() {
		tracing::warn!(mapping = mapping.len(), palette = palette.len(), "mapping does not match the palette");
		return Vec::new();
	}

	let assignments = assign(image, palette);
	let owners = (0..palette.len()).map(|i| mapping.actual_index(i)).collect::<Vec<_>>();
	let (width, height) = (image.width(), image.height());

	let paint_actual = |(actual_index, color): (usize, Color)| MappedMask {
		actual_index,
		color,
		mask: paint(width, height, &assignments, |index| owners[index] == Some(actual_index)),
	};

	let used = mapping.used_actual_colors();

	#[cfg(not(feature = "threads"))]
	{
		used.into_iter().map(paint_actual).collect()
	}

	#[cfg(feature = "threads")]
	{
		used.into_par_iter().map(paint_actual).collect()
	}
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
	use super::*;
	use crate::{match_palettes, ActualPalette, Palette, ResourceLimits};

	fn image(width: u32, height: u32, pixels: &[[u8; 3]]) -> Image {
		let data = pixels.iter().flat_map(|&[r, g, b]| [r, g, b, 255]).collect();
		Image::from_raw(width, height, data, &ResourceLimits::default()).unwrap()
	}

	/// Positions of the black pixels in row-major order
	fn black(mask: &Mask) -> Vec<usize> {
		mask.pixels()
			.enumerate()
			.filter(|&(_, px)| *px == ASSIGNED)
			.map(|(i, _)| i)
			.collect()
	}

	fn noise(width: u32, height: u32) -> Image {
		#[allow(clippy::cast_possible_truncation)]
		let pixels = (0..width * height)
			.map(|i| {
				let x = i.wrapping_mul(2654435761);
				[(x >> 24) as u8, (x >> 16) as u8, (x >> 8) as u8]
			})
			.collect::<Vec<_>>();
		image(width, height, &pixels)
	}

	#[test]
	fn two_by_two_example() {
		let image = image(2, 2, &[[255, 255, 255], [255, 255, 255], [0, 0, 0], [0, 0, 0]]);
		let palette = Palette::from_hex(["#ffffff", "#000000"]).unwrap();

		let masks = generate_masks(&image, &palette);
		assert_eq!(masks.len(), 2);
		assert_eq!(masks[0].dimensions(), (2, 2));
		assert_eq!(black(&masks[0]), vec![0, 1]);
		assert_eq!(black(&masks[1]), vec![2, 3]);
		assert!(masks[0].pixels().all(|&px| px == ASSIGNED || px == UNASSIGNED));
	}

	#[test]
	fn masks_partition_the_image() {
		let image = noise(17, 13);
		let palette = Palette::from_hex(["#ffffff", "#000000", "#ff0000", "#00ff00", "#0000ff", "#808080"]).unwrap();

		let masks = generate_masks(&image, &palette);
		assert_eq!(masks.len(), palette.len());

		let mut owners = vec![0; image.pixel_count()];
		for mask in &masks {
			for i in black(mask) {
				owners[i] += 1;
			}
		}
		assert!(owners.iter().all(|&n| n == 1));
	}

	#[test]
	fn ties_go_to_lowest_index() {
		let image = image(1, 1, &[[100, 100, 100]]);
		let palette = [Color::new(90, 100, 100), Color::new(110, 100, 100)];
		assert_eq!(assign(&image, &palette), vec![0]);
		assert_eq!(nearest_rgb([100, 100, 100], &palette), 0);
	}

	#[test]
	fn alpha_is_ignored() {
		let data = vec![0, 0, 0, 0, 255, 255, 255, 0];
		let image = Image::from_raw(2, 1, data, &ResourceLimits::default()).unwrap();
		let palette = [Color::new(255, 255, 255), Color::new(0, 0, 0)];
		assert_eq!(assign(&image, &palette), vec![1, 0]);
	}

	#[test]
	fn empty_palette_gives_no_masks() {
		let image = noise(4, 4);
		assert!(generate_masks(&image, &[]).is_empty());
		assert!(assign(&image, &[]).is_empty());
		assert!(generate_mapped_masks(&image, &[], &ColorMapping::default()).is_empty());
	}

	#[test]
	fn mapped_masks_fuse_computed_colors() {
		let image = image(4, 1, &[[0, 0, 0], [255, 0, 0], [0, 255, 0], [250, 250, 250]]);
		let computed = Palette::from_hex(["#ffffff", "#000000", "#ff0000", "#00ff00"]).unwrap();
		let actual = ActualPalette::from_hex(["#eeeeee", "#111111", "#ee0000"]).unwrap();

		let mapping = match_palettes(&computed, &actual);
		// white -> 0, black -> 1, red -> 2, green -> 0
		assert_eq!(mapping.used_actual_indices(), vec![0, 1, 2]);

		let masks = generate_mapped_masks(&image, &computed, &mapping);
		let summary = masks
			.iter()
			.map(|m| (m.actual_index, color::rgb_to_hex(m.color), black(&m.mask)))
			.collect::<Vec<_>>();

		assert_eq!(
			summary,
			vec![
				(0, String::from("#eeeeee"), vec![2, 3]),
				(1, String::from("#111111"), vec![0]),
				(2, String::from("#ee0000"), vec![1]),
			]
		);
	}

	#[test]
	fn unused_actual_colors_get_no_mask() {
		let image = noise(8, 8);
		let computed = Palette::from_hex(["#ffffff", "#000000"]).unwrap();
		let actual = ActualPalette::from_hex(["#ff00ff", "#000000", "#ffffff"]).unwrap();

		let mapping = match_palettes(&computed, &actual);
		let masks = generate_mapped_masks(&image, &computed, &mapping);

		let indices = masks.iter().map(|m| m.actual_index).collect::<Vec<_>>();
		assert_eq!(indices, vec![2, 1]);

		let plain = generate_masks(&image, &computed);
		assert_eq!(masks[0].mask, plain[0]);
		assert_eq!(masks[1].mask, plain[1]);
	}

	#[test]
	fn mapping_for_another_palette_gives_no_masks() {
		let image = noise(4, 4);
		let computed = Palette::from_hex(["#ffffff", "#000000", "#ff0000"]).unwrap();
		let actual = ActualPalette::from_hex(["#eeeeee", "#111111"]).unwrap();

		let shorter = Palette::from_hex(["#ffffff", "#000000"]).unwrap();
		let stale = match_palettes(&shorter, &actual);
		assert!(generate_mapped_masks(&image, &computed, &stale).is_empty());

		let longer = Palette::from_hex(["#ffffff", "#000000", "#ff0000", "#00ff00"]).unwrap();
		let stale = match_palettes(&longer, &actual);
		assert!(generate_mapped_masks(&image, &computed, &stale).is_empty());
	}
}
