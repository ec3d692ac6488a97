//! Source images, their identity, and waiting for them to be decoded

use crate::PipelineError;
use image::RgbaImage;
use std::{
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc, Condvar, Mutex, PoisonError,
	},
	time::Duration,
};

/// Identity of a source image, used to key caches.
///
/// Every [`Image`] gets a fresh id, even if its pixels equal those of another image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(u64);

impl ImageId {
	/// Allocate a new, unique id
	fn next() -> Self {
		/// The next id to hand out
		static NEXT: AtomicU64 = AtomicU64::new(0);
		Self(NEXT.fetch_add(1, Ordering::Relaxed))
	}
}

/// Limits on the size of images accepted by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
	/// Maximum number of pixels (`width * height`)
	pub max_pixels: u64,
}

impl Default for ResourceLimits {
	fn default() -> Self {
		Self { max_pixels: 4096 * 4096 }
	}
}

impl ResourceLimits {
	/// Check that an image of the given dimensions is within these limits
	fn check(&self, width: u32, height: u32) -> Result<(), PipelineError> {
		let pixels = u64::from(width) * u64::from(height);
		if pixels > self.max_pixels {
			tracing::warn!(width, height, limit = self.max_pixels, "image exceeds pixel limit");
			Err(PipelineError::ResourceExhausted { pixels, limit: self.max_pixels })
		} else {
			Ok(())
		}
	}
}

/// A decoded, read-only RGBA source image.
///
/// Cloning is cheap and keeps the same [`ImageId`].
#[derive(Debug, Clone)]
pub struct Image {
	/// Identity of this image
	id: ImageId,
	/// The pixel data
	pixels: Arc<RgbaImage>,
}

impl Image {
	/// Wrap an already decoded image.
	///
	/// # Errors
	/// Returns [`PipelineError::ResourceExhausted`] if the image has more pixels than `limits` allow.
	pub fn new(pixels: RgbaImage, limits: &ResourceLimits) -> Result<Self, PipelineError> {
		limits.check(pixels.width(), pixels.height())?;
		Ok(Self { id: ImageId::next(), pixels: Arc::new(pixels) })
	}

	/// Create an image from a raw, row-major RGBA byte buffer.
	///
	/// # Errors
	/// Returns [`PipelineError::ResourceExhausted`] if the image is too large,
	/// or [`PipelineError::ImageUnavailable`] if `data` does not hold exactly `width * height` RGBA pixels.
	pub fn from_raw(width: u32, height: u32, data: Vec<u8>, limits: &ResourceLimits) -> Result<Self, PipelineError> {
		limits.check(width, height)?;
		let pixels = RgbaImage::from_raw(width, height, data).ok_or(PipelineError::ImageUnavailable)?;
		Self::new(pixels, limits)
	}

	/// The identity of this image
	#[must_use]
	pub const fn id(&self) -> ImageId {
		self.id
	}

	/// Width in pixels
	#[must_use]
	pub fn width(&self) -> u32 {
		self.pixels.width()
	}

	/// Height in pixels
	#[must_use]
	pub fn height(&self) -> u32 {
		self.pixels.height()
	}

	/// Total number of pixels
	#[must_use]
	pub fn pixel_count(&self) -> usize {
		self.pixels.as_raw().len() / 4
	}

	/// The underlying RGBA buffer
	#[must_use]
	pub fn pixels(&self) -> &RgbaImage {
		&self.pixels
	}

	/// The RGB channels of each pixel in row-major order, ignoring alpha
	pub(crate) fn rgb(&self) -> impl Iterator<Item = [u8; 3]> + '_ {
		self.pixels.as_raw().chunks_exact(4).map(|px| [px[0], px[1], px[2]])
	}
}

/// How long to wait for a pending image before reporting it as unavailable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Number of intervals to wait
	pub attempts: u32,
	/// Length of each interval
	pub interval: Duration,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self { attempts: 15, interval: Duration::from_millis(50) }
	}
}

impl RetryPolicy {
	/// A policy that never waits
	pub const IMMEDIATE: Self = Self { attempts: 0, interval: Duration::ZERO };

	/// Total time to wait
	#[must_use]
	pub fn timeout(&self) -> Duration {
		self.interval.saturating_mul(self.attempts)
	}
}

/// A one-shot slot that the image acquisition side fills once decoding has finished.
#[derive(Debug, Default)]
pub struct ImageSlot {
	/// The image, once resolved
	image: Mutex<Option<Image>>,
	/// Notified on resolution
	ready: Condvar,
}

impl ImageSlot {
	/// Create an unresolved slot
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Provide the decoded image.
	///
	/// Returns `false` and leaves the slot unchanged if it was already resolved.
	pub fn resolve(&self, image: Image) -> bool {
		let mut slot = self.image.lock().unwrap_or_else(PoisonError::into_inner);
		if slot.is_some() {
			return false;
		}
		*slot = Some(image);
		drop(slot);
		self.ready.notify_all();
		true
	}

	/// Get the image without blocking.
	///
	/// # Errors
	/// Returns [`PipelineError::ImageUnavailable`] if the slot has not been resolved yet.
	pub fn try_get(&self) -> Result<Image, PipelineError> {
		self.image
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
			.ok_or(PipelineError::ImageUnavailable)
	}

	/// Block until the image is resolved or the policy's timeout elapses.
	///
	/// # Errors
	/// Returns [`PipelineError::ImageUnavailable`] if the timeout elapsed first.
	pub fn wait(&self, policy: &RetryPolicy) -> Result<Image, PipelineError> {
		let slot = self.image.lock().unwrap_or_else(PoisonError::into_inner);
		let (slot, timeout) = self
			.ready
			.wait_timeout_while(slot, policy.timeout(), |image| image.is_none())
			.unwrap_or_else(PoisonError::into_inner);

		if timeout.timed_out() {
			tracing::warn!(timeout = ?policy.timeout(), "gave up waiting for the source image");
		}

		slot.clone().ok_or(PipelineError::ImageUnavailable)
	}
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
	use super::*;
	use std::thread;

	fn image(width: u32, height: u32) -> Image {
		Image::new(RgbaImage::new(width, height), &ResourceLimits::default()).unwrap()
	}

	#[test]
	fn images_get_distinct_ids() {
		let x = image(1, 1);
		let y = image(1, 1);
		assert_ne!(x.id(), y.id());
		assert_eq!(x.id(), x.clone().id());
	}

	#[test]
	fn too_many_pixels_is_resource_exhausted() {
		let limits = ResourceLimits { max_pixels: 99 };
		assert_eq!(
			Image::new(RgbaImage::new(10, 10), &limits).unwrap_err(),
			PipelineError::ResourceExhausted { pixels: 100, limit: 99 }
		);
		assert!(Image::new(RgbaImage::new(9, 11), &limits).is_ok());
	}

	#[test]
	fn oversized_raw_buffer_is_checked_before_allocation() {
		let limits = ResourceLimits { max_pixels: 1 << 20 };
		let result = Image::from_raw(u32::MAX, u32::MAX, Vec::new(), &limits);
		assert!(matches!(result, Err(PipelineError::ResourceExhausted { .. })));
	}

	#[test]
	fn short_raw_buffer_is_unavailable() {
		let result = Image::from_raw(2, 2, vec![0; 15], &ResourceLimits::default());
		assert_eq!(result.unwrap_err(), PipelineError::ImageUnavailable);
	}

	#[test]
	fn rgb_ignores_alpha() {
		let image = Image::from_raw(2, 1, vec![1, 2, 3, 0, 4, 5, 6, 255], &ResourceLimits::default()).unwrap();
		assert_eq!(image.rgb().collect::<Vec<_>>(), vec![[1, 2, 3], [4, 5, 6]]);
		assert_eq!(image.pixel_count(), 2);
	}

	#[test]
	fn unresolved_slot_is_unavailable() {
		let slot = ImageSlot::new();
		assert_eq!(slot.try_get().unwrap_err(), PipelineError::ImageUnavailable);
		assert_eq!(slot.wait(&RetryPolicy::IMMEDIATE).unwrap_err(), PipelineError::ImageUnavailable);
	}

	#[test]
	fn slot_resolves_once() {
		let slot = ImageSlot::new();
		let first = image(1, 1);
		assert!(slot.resolve(first.clone()));
		assert!(!slot.resolve(image(2, 2)));
		assert_eq!(slot.try_get().unwrap().id(), first.id());
	}

	#[test]
	fn wait_returns_image_resolved_from_another_thread() {
		let slot = Arc::new(ImageSlot::new());
		let expected = image(3, 3);

		let resolver = {
			let slot = Arc::clone(&slot);
			let image = expected.clone();
			thread::spawn(move || {
				thread::sleep(Duration::from_millis(10));
				slot.resolve(image);
			})
		};

		let policy = RetryPolicy { attempts: 200, interval: Duration::from_millis(50) };
		assert_eq!(slot.wait(&policy).unwrap().id(), expected.id());
		resolver.join().unwrap();
	}
}
