//! Computed and actual (material) palettes

use crate::{
	color::{self, Color},
	FormatError,
};
use std::ops::Deref;

/// Implements the parts shared by both palette types
macro_rules! palette_common {
	($name: ident) => {
		impl $name {
			/// Create a palette from the given colors
			#[must_use]
			pub fn from_colors(colors: Vec<Color>) -> Self {
				Self(colors)
			}

			/// Parse a palette from `#rrggbb` strings.
			///
			/// # Errors
			/// Returns the [`FormatError`] of the first malformed string.
			pub fn from_hex<S: AsRef<str>>(hex: impl IntoIterator<Item = S>) -> Result<Self, FormatError> {
				hex.into_iter()
					.map(|s| color::hex_to_rgb(s.as_ref()))
					.collect::<Result<_, _>>()
					.map(Self)
			}

			/// Format each color as a lowercase `#rrggbb` string
			#[must_use]
			pub fn to_hex(&self) -> Vec<String> {
				self.0.iter().copied().map(color::rgb_to_hex).collect()
			}

			/// The colors of this palette
			#[must_use]
			pub fn colors(&self) -> &[Color] {
				&self.0
			}

			/// Replace the color at `index`, leaving the palette unchanged if `index` is out of bounds
			#[must_use]
			pub fn with_color(mut self, index: usize, color: Color) -> Self {
				if let Some(slot) = self.0.get_mut(index) {
					*slot = color;
				}
				self
			}
		}

		impl Deref for $name {
			type Target = [Color];

			fn deref(&self) -> &[Color] {
				&self.0
			}
		}

		impl FromIterator<Color> for $name {
			fn from_iter<I: IntoIterator<Item = Color>>(iter: I) -> Self {
				Self(iter.into_iter().collect())
			}
		}
	};
}

/// A palette computed from an image.
///
/// Index 0 is the background color; the remaining entries are the foreground colors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Palette(Vec<Color>);

palette_common!(Palette);

impl Palette {
	/// Create a palette from a background color followed by foreground colors
	#[must_use]
	pub fn new(background: Color, foreground: impl IntoIterator<Item = Color>) -> Self {
		Self(std::iter::once(background).chain(foreground).collect())
	}

	/// The background color, if the palette is not empty
	#[must_use]
	pub fn background(&self) -> Option<Color> {
		self.0.first().copied()
	}

	/// The foreground colors, i.e., everything except the background
	#[must_use]
	pub fn foreground(&self) -> &[Color] {
		self.0.get(1..).unwrap_or_default()
	}

	/// Replace the background color. An empty palette stays empty.
	#[must_use]
	pub fn with_background(self, background: Color) -> Self {
		self.with_color(0, background)
	}
}

/// The colors of the physically available materials (e.g., thread spools).
///
/// Unlike [`Palette`], there is no reserved background slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActualPalette(Vec<Color>);

palette_common!(ActualPalette);

impl ActualPalette {
	/// Append a color
	#[must_use]
	pub fn with_added(mut self, color: Color) -> Self {
		self.0.push(color);
		self
	}

	/// Remove the color at `index`, leaving the palette unchanged if `index` is out of bounds
	#[must_use]
	pub fn without(mut self, index: usize) -> Self {
		if index < self.0.len() {
			self.0.remove(index);
		}
		self
	}

	/// A copy of the computed palette, background included
	#[must_use]
	pub fn synced_with(palette: &Palette) -> Self {
		Self(palette.0.clone())
	}
}
