//! Memoization of generated masks

use crate::{
	color::{self, Color},
	mask::{self, MappedMask, Mask},
	ColorMapping, Image, ImageId,
};
use std::{
	collections::{HashMap, VecDeque},
	hash::Hash,
	sync::Arc,
};

/// Structural identity of a [`mask::generate_masks`] call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MaskKey {
	/// The source image
	image: ImageId,
	/// The packed palette colors
	palette: Vec<u32>,
}

/// Structural identity of a [`mask::generate_mapped_masks`] call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MappedKey {
	/// The source image and computed palette
	masks: MaskKey,
	/// Actual index and packed actual color of each mapping entry
	mapping: Vec<(usize, u32)>,
}

/// A key that belongs to a single image
trait ImageKey: Clone + Eq + Hash {
	/// The image this key refers to
	fn image(&self) -> ImageId;
}

impl ImageKey for MaskKey {
	fn image(&self) -> ImageId {
		self.image
	}
}

impl ImageKey for MappedKey {
	fn image(&self) -> ImageId {
		self.masks.image
	}
}

/// A bounded table that evicts the oldest entry first
#[derive(Debug)]
struct Table<K, V> {
	/// Cached values
	entries: HashMap<K, Arc<V>>,
	/// Keys in insertion order
	order: VecDeque<K>,
}

impl<K, V> Default for Table<K, V> {
	fn default() -> Self {
		Self { entries: HashMap::new(), order: VecDeque::new() }
	}
}

impl<K: ImageKey, V> Table<K, V> {
	/// Get the cached value for `key`, or compute and store it
	fn get_or_insert_with(&mut self, key: K, capacity: usize, compute: impl FnOnce() -> V) -> Arc<V> {
		if let Some(value) = self.entries.get(&key) {
			tracing::trace!(image = ?key.image(), "mask cache hit");
			return Arc::clone(value);
		}

		tracing::trace!(image = ?key.image(), "mask cache miss");
		let value = Arc::new(compute());

		if capacity > 0 {
			while self.order.len() >= capacity {
				if let Some(oldest) = self.order.pop_front() {
					self.entries.remove(&oldest);
				}
			}
			self.order.push_back(key.clone());
			self.entries.insert(key, Arc::clone(&value));
		}

		value
	}

	/// Drop all entries for the given image
	fn invalidate(&mut self, image: ImageId) {
		self.order.retain(|key| key.image() != image);
		self.entries.retain(|key, _| key.image() != image);
	}

	/// Drop all entries
	fn clear(&mut self) {
		self.order.clear();
		self.entries.clear();
	}

	/// Number of entries
	fn len(&self) -> usize {
		self.order.len()
	}
}

/// Caches the output of [`mask::generate_masks`] and [`mask::generate_mapped_masks`].
///
/// Entries are keyed by the image's [`ImageId`] and the contents of the palette (and mapping),
/// so a hit returns exactly what a fresh computation would.
/// Each kind of mask keeps at most `capacity` entries, evicting the oldest first.
#[derive(Debug)]
pub struct MaskCache {
	/// Maximum number of entries per table
	capacity: usize,
	/// Direct masks
	masks: Table<MaskKey, Vec<Mask>>,
	/// Mapped masks
	mapped: Table<MappedKey, Vec<MappedMask>>,
}

impl Default for MaskCache {
	fn default() -> Self {
		Self::new(Self::DEFAULT_CAPACITY)
	}
}

impl MaskCache {
	/// The capacity used by [`MaskCache::default`]
	pub const DEFAULT_CAPACITY: usize = 8;

	/// Create an empty cache holding at most `capacity` results of each kind.
	///
	/// A capacity of `0` disables caching.
	#[must_use]
	pub fn new(capacity: usize) -> Self {
		Self {
			capacity,
			masks: Table::default(),
			mapped: Table::default(),
		}
	}

	/// The key for masks of `image` under `palette`
	fn mask_key(image: &Image, palette: &[Color]) -> MaskKey {
		MaskKey {
			image: image.id(),
			palette: palette.iter().map(|c| color::pack([c.red, c.green, c.blue])).collect(),
		}
	}

	/// Cached [`mask::generate_masks`]
	pub fn masks(&mut self, image: &Image, palette: &[Color]) -> Arc<Vec<Mask>> {
		let key = Self::mask_key(image, palette);
		self.masks
			.get_or_insert_with(key, self.capacity, || mask::generate_masks(image, palette))
	}

	/// Cached [`mask::generate_mapped_masks`]
	pub fn mapped_masks(&mut self, image: &Image, palette: &[Color], mapping: &ColorMapping) -> Arc<Vec<MappedMask>> {
		let key = MappedKey {
			masks: Self::mask_key(image, palette),
			mapping: mapping.key(),
		};

		self.mapped
			.get_or_insert_with(key, self.capacity, || mask::generate_mapped_masks(image, palette, mapping))
	}

	/// Drop every cached result computed from the given image
	pub fn invalidate_image(&mut self, image: ImageId) {
		self.masks.invalidate(image);
		self.mapped.invalidate(image);
	}

	/// Drop all cached results
	pub fn clear(&mut self) {
		self.masks.clear();
		self.mapped.clear();
	}

	/// Total number of cached results
	#[must_use]
	pub fn len(&self) -> usize {
		self.masks.len() + self.mapped.len()
	}

	/// Whether nothing is cached
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
