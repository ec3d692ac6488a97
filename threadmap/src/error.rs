//! Error types shared by the pipeline stages

use thiserror::Error;

/// A color string was not `#` followed by exactly 6 hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid color {input:?}: expected '#' followed by 6 hex digits")]
pub struct FormatError {
	/// The rejected input
	input: String,
}

impl FormatError {
	/// Create a [`FormatError`] for the given input string
	pub(crate) fn new(input: &str) -> Self {
		Self { input: input.to_owned() }
	}

	/// The rejected input
	#[must_use]
	pub fn input(&self) -> &str {
		&self.input
	}
}

/// Failures that abort the current pipeline stage.
///
/// None of these invalidate previously computed palettes, mappings, or masks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
	/// A color string was malformed
	#[error(transparent)]
	Format(#[from] FormatError),
	/// The source image has not been decoded yet or could not be read
	#[error("the source image is not available yet")]
	ImageUnavailable,
	/// The source image is too large to process
	#[error("the image has {pixels} pixels, more than the limit of {limit}; try lowering the resolution")]
	ResourceExhausted {
		/// Number of pixels in the rejected image
		pixels: u64,
		/// The configured pixel limit
		limit: u64,
	},
}

impl PipelineError {
	/// Whether retrying the same operation later may succeed
	#[must_use]
	pub const fn is_retryable(&self) -> bool {
		matches!(self, Self::ImageUnavailable)
	}
}
