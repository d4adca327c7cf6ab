//! Photo to cross-stitch pattern.
//!
//! The core is the adaptive palette search in [`reducer`]: quantize, match
//! every representative to its nearest DMC thread ([`resolver`]), collapse
//! duplicates, and raise the quantization level until the pattern uses the
//! requested number of distinct threads.

pub mod catalog;
pub mod error;
pub mod key;
pub mod pipeline;
pub mod quantize;
pub mod reducer;
pub mod remap;
pub mod render;
pub mod resolver;

pub use catalog::{Catalog, CatalogEntry};
pub use error::{PatternError, Result};
pub use pipeline::{generate, run, Pattern, PatternReport, PatternSettings};
pub use quantize::{MedianCut, Palette, QuantizedImage, Quantizer};
pub use reducer::{reduce, MatchedColor, MatchedPalette, Reduction, ReductionStatus};
pub use remap::remap;
pub use resolver::resolve;
