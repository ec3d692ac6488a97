//! Session state and the single entry point through which it changes

use crate::{
	background,
	color::Color,
	extract::{self, ExtractOptions},
	mask::{MappedMask, Mask},
	matcher, ActualPalette, ColorMapping, Image, ImageSlot, MaskCache, Palette, PipelineError, RetryPolicy,
};
use palette::Srgb;
use std::sync::Arc;

/// Everything the pipeline knows about the current session
#[derive(Debug, Clone)]
pub struct State {
	/// The current source image, if one has been loaded
	pub image: Option<Image>,
	/// The background color, mirrored into index 0 of `palette`
	pub background: Color,
	/// The palette computed from the image
	pub palette: Palette,
	/// The user's material colors
	pub actual: ActualPalette,
	/// The nearest actual color for each computed color
	pub mapping: ColorMapping,
	/// Replace the actual palette with a copy of the computed palette whenever the latter changes
	pub sync_actual: bool,
	/// Recompute the mapping whenever either palette changes
	pub auto_match: bool,
}

impl Default for State {
	fn default() -> Self {
		Self {
			image: None,
			background: Srgb::new(255, 255, 255),
			palette: Palette::default(),
			actual: ActualPalette::default(),
			mapping: ColorMapping::default(),
			sync_actual: false,
			auto_match: true,
		}
	}
}

/// A change to the [`State`]
#[derive(Debug, Clone)]
pub enum Action {
	/// A new source image finished loading
	SetImage(Image),
	/// Set the background color
	SetBackground(Color),
	/// A new palette was computed
	PaletteExtracted(Palette),
	/// Edit one entry of the computed palette
	SetPaletteColor {
		/// Index into the computed palette
		index: usize,
		/// The new color
		color: Color,
	},
	/// Append a material color
	AddActual(Color),
	/// Remove the material color at the given index
	RemoveActual(usize),
	/// Edit one material color
	SetActualColor {
		/// Index into the actual palette
		index: usize,
		/// The new color
		color: Color,
	},
	/// Replace the actual palette with a copy of the computed palette
	SyncActual,
	/// Compute the mapping
	MatchColors,
	/// Toggle [`State::sync_actual`]
	SetSyncActual(bool),
	/// Toggle [`State::auto_match`]
	SetAutoMatch(bool),
	/// Forget the image, palettes, and mapping, keeping the toggles
	Reset,
}

impl State {
	/// Recompute the mapping if it is kept up to date, otherwise make sure it is not stale
	fn remap(mut self) -> Self {
		self.mapping = if self.auto_match || !self.mapping.is_empty() {
			matcher::match_palettes(&self.palette, &self.actual)
		} else {
			ColorMapping::default()
		};
		self
	}

	/// Copy the computed palette into the actual palette, unless there is nothing to copy
	fn sync(mut self) -> Self {
		if !self.palette.is_empty() {
			self.actual = ActualPalette::synced_with(&self.palette);
		}
		self
	}

	/// Follow-up after the computed palette changed
	fn palette_changed(self) -> Self {
		if self.sync_actual {
			self.sync().remap()
		} else {
			self.remap()
		}
	}
}

/// Apply an action to the state, returning the new state.
///
/// The mapping is always recomputed from scratch, never patched,
/// and is empty whenever either palette is empty.
#[must_use]
pub fn reduce(state: State, action: Action) -> State {
	use Action::*;
	match action {
		SetImage(image) => State { image: Some(image), ..state },
		SetBackground(color) => {
			let palette = state.palette.with_background(color);
			State { background: color, palette, ..state }.palette_changed()
		},
		PaletteExtracted(palette) => {
			let background = palette.background().unwrap_or(state.background);
			State { background, palette, ..state }.palette_changed()
		},
		SetPaletteColor { index, color } => {
			let background = if index == 0 && index < state.palette.len() { color } else { state.background };
			let palette = state.palette.with_color(index, color);
			State { background, palette, ..state }.palette_changed()
		},
		AddActual(color) => State { actual: state.actual.with_added(color), ..state }.remap(),
		RemoveActual(index) => State { actual: state.actual.without(index), ..state }.remap(),
		SetActualColor { index, color } => State { actual: state.actual.with_color(index, color), ..state }.remap(),
		SyncActual => state.sync().remap(),
		MatchColors => State {
			mapping: matcher::match_palettes(&state.palette, &state.actual),
			..state
		},
		SetSyncActual(sync_actual) => {
			let state = State { sync_actual, ..state };
			if sync_actual {
				state.sync().remap()
			} else {
				state
			}
		},
		SetAutoMatch(auto_match) => {
			let state = State { auto_match, ..state };
			if auto_match {
				state.remap()
			} else {
				state
			}
		},
		Reset => State {
			sync_actual: state.sync_actual,
			auto_match: state.auto_match,
			..State::default()
		},
	}
}

/// Drives the pipeline for one user: owns the [`State`], the [`MaskCache`], and the configuration.
///
/// Every change goes through [`reduce`]. A failed operation leaves the state untouched.
#[derive(Debug, Default)]
pub struct Session {
	/// The current state
	state: State,
	/// Cached masks for the current (and recent) images
	cache: MaskCache,
	/// Palette extraction parameters; the background is taken from the state
	options: ExtractOptions,
	/// How long to wait for a pending image
	retry: RetryPolicy,
}

impl Session {
	/// Create a session with the given configuration
	#[must_use]
	pub fn new(options: ExtractOptions, retry: RetryPolicy, cache_capacity: usize) -> Self {
		let state = State { background: options.background, ..State::default() };
		Self {
			state,
			cache: MaskCache::new(cache_capacity),
			options,
			retry,
		}
	}

	/// The current state
	#[must_use]
	pub const fn state(&self) -> &State {
		&self.state
	}

	/// The extraction parameters
	#[must_use]
	pub const fn options(&self) -> &ExtractOptions {
		&self.options
	}

	/// Change the extraction parameters for future extractions
	pub fn set_options(&mut self, options: ExtractOptions) {
		self.options = options;
	}

	/// Apply an action to the state
	pub fn dispatch(&mut self, action: Action) {
		if matches!(action, Action::SetImage(_) | Action::Reset) {
			if let Some(old) = &self.state.image {
				self.cache.invalidate_image(old.id());
			}
		}

		self.state = reduce(std::mem::take(&mut self.state), action);
	}

	/// The current image
	fn image(&self) -> Result<Image, PipelineError> {
		self.state.image.clone().ok_or(PipelineError::ImageUnavailable)
	}

	/// Wait for the slot's image according to the retry policy and make it the current image.
	///
	/// This blocks the calling thread for up to [`RetryPolicy::timeout`].
	/// Callers that must not block can poll [`ImageSlot::try_get`] and dispatch [`Action::SetImage`]
	/// themselves, or use [`RetryPolicy::IMMEDIATE`] and call again once the slot is resolved.
	///
	/// # Errors
	/// Returns [`PipelineError::ImageUnavailable`] if the image did not arrive in time.
	pub fn load(&mut self, slot: &ImageSlot) -> Result<(), PipelineError> {
		let image = slot.wait(&self.retry).map_err(|error| {
			tracing::warn!(%error, "could not load image");
			error
		})?;
		self.dispatch(Action::SetImage(image));
		Ok(())
	}

	/// Extract a palette from the current image using the current background.
	///
	/// # Errors
	/// Returns [`PipelineError::ImageUnavailable`] if no image has been loaded.
	pub fn extract(&mut self) -> Result<&Palette, PipelineError> {
		let image = self.image()?;
		let options = ExtractOptions { background: self.state.background, ..self.options };
		let palette = extract::extract_palette(&image, &options);
		self.dispatch(Action::PaletteExtracted(palette));
		Ok(&self.state.palette)
	}

	/// Load the slot's image and extract a palette from it.
	///
	/// Blocks while waiting for the image, like [`Session::load`].
	///
	/// # Errors
	/// See [`Session::load`]. On error, the previous image and palette are kept.
	pub fn extract_from(&mut self, slot: &ImageSlot) -> Result<&Palette, PipelineError> {
		self.load(slot)?;
		self.extract()
	}

	/// Set the background to the average border color of the current image.
	///
	/// # Errors
	/// Returns [`PipelineError::ImageUnavailable`] if no image has been loaded.
	pub fn detect_background(&mut self, percent: u32) -> Result<Color, PipelineError> {
		let color = background::edge_color(&self.image()?, percent);
		self.dispatch(Action::SetBackground(color));
		Ok(color)
	}

	/// One mask per computed palette color for the current image.
	///
	/// # Errors
	/// Returns [`PipelineError::ImageUnavailable`] if no image has been loaded.
	pub fn masks(&mut self) -> Result<Arc<Vec<Mask>>, PipelineError> {
		let image = self.image()?;
		Ok(self.cache.masks(&image, &self.state.palette))
	}

	/// One mask per used actual color for the current image.
	///
	/// # Errors
	/// Returns [`PipelineError::ImageUnavailable`] if no image has been loaded.
	pub fn mapped_masks(&mut self) -> Result<Arc<Vec<MappedMask>>, PipelineError> {
		let image = self.image()?;
		Ok(self.cache.mapped_masks(&image, &self.state.palette, &self.state.mapping))
	}
}
