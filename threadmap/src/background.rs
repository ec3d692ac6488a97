//! Background color detection from the image border

use crate::{color::Color, Image};
use palette::Srgb;

/// Default width of the border bands, as a percentage of the image's height (top and bottom) and width (sides)
pub const DEFAULT_EDGE_PERCENT: u32 = 10;

/// Width of a border band along a side of `len` pixels, at least one pixel
fn band(len: u32, percent: u64) -> u32 {
	#[allow(clippy::cast_possible_truncation)]
	let rounded = ((u64::from(len) * percent + 50) / 100) as u32;
	rounded.max(1)
}

/// Average color of the border bands of the image.
///
/// The top and bottom bands are `height * percent / 100` rows and the left and right bands are
/// `width * percent / 100` columns, both rounded and at least one pixel wide.
/// `percent` is clamped to `1..=100`. The side bands exclude the corners already covered by
/// the top and bottom bands, while overlapping opposite bands count their shared pixels twice.
///
/// White is returned for an image without pixels.
#[must_use]
pub fn edge_color(image: &Image, percent: u32) -> Color {
	let (width, height) = (image.width(), image.height());
	let percent = u64::from(percent.clamp(1, 100));
	let edge_x = band(width, percent);
	let edge_y = band(height, percent);

	let mut sum = [0u64; 3];
	let mut count = 0u64;
	for (x, y, px) in image.pixels().enumerate_pixels() {
		let rows = u64::from(y < edge_y) + u64::from(y >= height - edge_y);
		let weight = if rows > 0 {
			rows
		} else {
			u64::from(x < edge_x) + u64::from(x >= width - edge_x)
		};

		if weight > 0 {
			for (s, &c) in sum.iter_mut().zip(&px.0[..3]) {
				*s += weight * u64::from(c);
			}
			count += weight;
		}
	}

	if count == 0 {
		return Srgb::new(255, 255, 255);
	}

	// Round half up
	#[allow(clippy::cast_possible_truncation)]
	let [r, g, b] = sum.map(|s| ((2 * s + count) / (2 * count)) as u8);
	Srgb::new(r, g, b)
}
