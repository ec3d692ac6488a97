//! Reduce an image to a small palette, map the palette onto physically available material colors,
//! and render one black/white mask per color for thread-art style layouts.
//!
//! # Examples
//!
//! ## Extract a palette and render masks.
//!
//! ```no_run
//! use threadmap::{ExtractOptions, Image, ResourceLimits};
//!
//! let pixels = image::open("some image").unwrap().into_rgba8();
//! let image = Image::new(pixels, &ResourceLimits::default()).unwrap();
//!
//! let palette = threadmap::extract_palette(&image, &ExtractOptions::default());
//! let masks = threadmap::generate_masks(&image, &palette);
//! assert_eq!(masks.len(), palette.len());
//! ```
//!
//! ## Map the palette onto the thread spools you own.
//!
//! ```no_run
//! use threadmap::{ActualPalette, ExtractOptions, Image, ResourceLimits};
//!
//! # let pixels = image::open("some image").unwrap().into_rgba8();
//! # let image = Image::new(pixels, &ResourceLimits::default()).unwrap();
//! let palette = threadmap::extract_palette(&image, &ExtractOptions::default());
//! let actual = ActualPalette::from_hex(["#111111", "#ee0000", "#f4f4f0"]).unwrap();
//!
//! let mapping = threadmap::match_palettes(&palette, &actual);
//! for mask in threadmap::generate_mapped_masks(&image, &palette, &mapping) {
//!     println!("{}", threadmap::rgb_to_hex(mask.color));
//! }
//! ```
//!
//! ## Drive everything through a [`Session`].
//!
//! ```no_run
//! use threadmap::{Action, ImageSlot, Session};
//!
//! let slot = ImageSlot::new();
//! // ...the decoding side eventually calls `slot.resolve(image)`
//!
//! let mut session = Session::default();
//! session.extract_from(&slot).unwrap();
//! session.dispatch(Action::SyncActual);
//! let masks = session.mapped_masks().unwrap();
//! ```
//!
//! # Pipeline
//!
//! Each step is a plain function of its inputs.
//!
//! 1. [`extract_palette`] samples the image according to a [`SampleBudget`],
//!    clusters the samples with k-means (or picks them by tone),
//!    and drops colors that are too similar. The background color is placed at index 0.
//! 2. [`match_palettes`] assigns every computed color the actual color with the smallest Delta-E.
//! 3. [`generate_masks`] and [`generate_mapped_masks`] assign every pixel its nearest palette color
//!    and render the assignment as black/white masks.
//!
//! ## Color Difference
//!
//! Colors are compared in CIELAB (D65) using the CIE76 Delta-E, i.e., the euclidean distance.
//! Assigning pixels to palette colors for the masks is the exception:
//! it uses plain squared RGB distance, as it runs once per pixel.
//!
//! ## K
//!
//! This is the maximum number of foreground colors.
//!
//! Fewer colors may be returned, since colors closer than the minimum Delta-E to a lighter color are dropped.
//! Clusters that end up without any samples collapse to black (see [`EmptyClusters`]).
//!
//! ## Minimum Delta-E
//!
//! A Delta-E of about `2.3` is a just noticeable difference.
//! The default of `10.0` keeps colors that are clearly distinct when made from thread.
//!
//! ## Seed
//!
//! This is the value used to seed the random number generator which is used to choose the initial centroids.
//!
//! Provide any arbitrary value like `0`, `42`, or `123456789`.

#![deny(unsafe_code)]
#![warn(clippy::pedantic, clippy::cargo)]
#![warn(clippy::use_debug, clippy::dbg_macro, clippy::todo, clippy::unimplemented)]
#![warn(clippy::unwrap_used, clippy::unwrap_in_result)]
#![warn(clippy::unneeded_field_pattern, clippy::rest_pat_in_fully_bound_structs)]
#![warn(clippy::unnecessary_self_imports)]
#![warn(clippy::str_to_string, clippy::string_to_string, clippy::string_slice)]
#![warn(missing_docs, clippy::missing_docs_in_private_items, rustdoc::all)]
#![warn(clippy::float_cmp_const, clippy::lossy_float_literal)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::enum_glob_use)]
#![allow(clippy::unreadable_literal)]

pub mod background;
mod cache;
pub mod color;
mod error;
pub mod extract;
pub mod kmeans;
pub mod mask;
mod matcher;
mod palettes;
mod sample;
mod source;
mod state;

pub use cache::MaskCache;
pub use color::{delta_e, hex_to_rgb, rgb_to_hex, rgb_to_lab, Color, LabColor};
pub use error::{FormatError, PipelineError};
pub use extract::{extract_palette, ExtractMethod, ExtractOptions, Tones};
pub use kmeans::{EmptyClusters, KmeansResult};
pub use mask::{generate_mapped_masks, generate_masks, MappedMask, Mask};
pub use matcher::{match_palettes, ColorMapping, MappingEntry};
pub use palettes::{ActualPalette, Palette};
pub use sample::{SampleBudget, SampleCounts};
pub use source::{Image, ImageId, ImageSlot, ResourceLimits, RetryPolicy};
pub use state::{reduce, Action, Session, State};
