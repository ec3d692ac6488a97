//! sRGB <-> CIELAB conversion, Delta-E, and hex color strings

use crate::FormatError;
use palette::{white_point::D65, Lab, Srgb};

/// An 8-bit sRGB color.
pub type Color = Srgb<u8>;

/// A CIELAB color computed under the D65 white point.
///
/// These are only ever derived from a [`Color`] and are never stored as primary state.
pub type LabColor = Lab<D65, f64>;

/// D65 reference white
const WHITE: [f64; 3] = [0.95047, 1.0, 1.08883];

/// sRGB to XYZ matrix (rows are X, Y, Z)
const SRGB_TO_XYZ: [[f64; 3]; 3] = [
	[0.4124, 0.3576, 0.1805],
	[0.2126, 0.7152, 0.0722],
	[0.0193, 0.1192, 0.9505],
];

/// Undo the sRGB transfer function for a channel in `0.0..=1.0`
fn linearize(c: f64) -> f64 {
	if c > 0.04045 {
		((c + 0.055) / 1.055).powf(2.4)
	} else {
		c / 12.92
	}
}

/// The CIELAB companding function
fn pivot(t: f64) -> f64 {
	if t > 0.008856 {
		t.cbrt()
	} else {
		7.787 * t + 16.0 / 116.0
	}
}

/// Convert an sRGB color to CIELAB.
#[must_use]
pub fn rgb_to_lab(color: Color) -> LabColor {
	let rgb = [color.red, color.green, color.blue].map(|c| linearize(f64::from(c) / 255.0));

	let [fx, fy, fz] = [0, 1, 2].map(|i| {
		let row = SRGB_TO_XYZ[i];
		pivot((row[0] * rgb[0] + row[1] * rgb[1] + row[2] * rgb[2]) / WHITE[i])
	});

	Lab::new(116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz))
}

/// The CIE76 color difference, i.e., the euclidean distance between two CIELAB colors.
#[must_use]
pub fn delta_e(x: LabColor, y: LabColor) -> f64 {
	let dl = x.l - y.l;
	let da = x.a - y.a;
	let db = x.b - y.b;
	(dl * dl + da * da + db * db).sqrt()
}

/// Parse a `#rrggbb` string (case-insensitive).
///
/// # Errors
/// Returns a [`FormatError`] if `hex` is not `#` followed by exactly 6 hex digits.
pub fn hex_to_rgb(hex: &str) -> Result<Color, FormatError> {
	let digits = hex
		.strip_prefix('#')
		.filter(|digits| digits.len() == 6 && digits.bytes().all(|b| b.is_ascii_hexdigit()))
		.ok_or_else(|| FormatError::new(hex))?;

	let value = u32::from_str_radix(digits, 16).map_err(|_| FormatError::new(hex))?;

	#[allow(clippy::cast_possible_truncation)]
	Ok(Srgb::new((value >> 16) as u8, (value >> 8) as u8, value as u8))
}

/// Format a color as a lowercase `#rrggbb` string.
#[must_use]
pub fn rgb_to_hex(color: Color) -> String {
	format!("#{color:x}")
}

/// Squared euclidean distance in sRGB space
#[inline]
pub(crate) fn rgb_distance_squared(x: [u8; 3], y: Color) -> u32 {
	let dr = i32::from(x[0]) - i32::from(y.red);
	let dg = i32::from(x[1]) - i32::from(y.green);
	let db = i32::from(x[2]) - i32::from(y.blue);
	dr.unsigned_abs().pow(2) + dg.unsigned_abs().pow(2) + db.unsigned_abs().pow(2)
}

/// Pack a color into a `u32` for use as a lookup key
#[inline]
pub(crate) fn pack(rgb: [u8; 3]) -> u32 {
	u32::from(rgb[0]) << 16 | u32::from(rgb[1]) << 8 | u32::from(rgb[2])
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_abs_diff_eq;

	fn assert_lab_eq(x: LabColor, (l, a, b): (f64, f64, f64)) {
		assert_abs_diff_eq!(x.l, l, epsilon = 1e-9);
		assert_abs_diff_eq!(x.a, a, epsilon = 1e-9);
		assert_abs_diff_eq!(x.b, b, epsilon = 1e-9);
	}

	#[test]
	fn known_lab_values() {
		assert_lab_eq(rgb_to_lab(Srgb::new(0, 0, 0)), (0.0, 0.0, 0.0));
		assert_lab_eq(
			rgb_to_lab(Srgb::new(255, 0, 0)),
			(53.23288178584245, 80.10930952982204, 67.22006831026425),
		);
		assert_lab_eq(
			rgb_to_lab(Srgb::new(0, 255, 0)),
			(87.73703347354422, -86.18463649762525, 83.18116474777854),
		);

		let white = rgb_to_lab(Srgb::new(255, 255, 255));
		assert_abs_diff_eq!(white.l, 100.0, epsilon = 1e-9);
		assert!(white.a.abs() < 0.01 && white.b.abs() < 0.02);
	}

	#[test]
	#[allow(clippy::float_cmp)]
	fn delta_e_is_symmetric_with_zero_identity() {
		let colors = (0..=255u8)
			.step_by(51)
			.flat_map(|r| (0..=255u8).step_by(85).map(move |g| Srgb::new(r, g, 255 - r)))
			.map(rgb_to_lab)
			.collect::<Vec<_>>();

		for &x in &colors {
			assert_eq!(delta_e(x, x), 0.0);
			for &y in &colors {
				assert_eq!(delta_e(x, y), delta_e(y, x));
				assert!(delta_e(x, y) >= 0.0);
			}
		}
	}

	#[test]
	fn hex_round_trips_every_color() {
		for r in 0..=255u8 {
			for g in 0..=255u8 {
				for b in 0..=255u8 {
					let color = Srgb::new(r, g, b);
					assert_eq!(hex_to_rgb(&rgb_to_hex(color)), Ok(color));
				}
			}
		}
	}

	#[test]
	fn hex_output_is_lowercase_and_padded() {
		assert_eq!(rgb_to_hex(Srgb::new(0, 10, 255)), "#000aff");
		assert_eq!(rgb_to_hex(Srgb::new(171, 205, 239)), "#abcdef");
	}

	#[test]
	fn hex_input_is_case_insensitive() {
		assert_eq!(hex_to_rgb("#ABcdEF"), Ok(Srgb::new(171, 205, 239)));
	}

	#[test]
	fn malformed_hex_is_rejected() {
		for input in ["", "#", "ffffff", "#fff", "#fffffff", "#ggffff", "# fffff", "#+fffff", "##ffffff", "#ffff\u{e9}"] {
			assert_eq!(hex_to_rgb(input), Err(FormatError::new(input)), "{input:?}");
		}
	}

	#[test]
	fn rgb_distance_is_squared_euclidean() {
		assert_eq!(rgb_distance_squared([0, 0, 0], Srgb::new(255, 255, 255)), 3 * 255 * 255);
		assert_eq!(rgb_distance_squared([10, 20, 30], Srgb::new(13, 16, 30)), 25);
	}
}
