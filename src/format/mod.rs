//! Pixel conversion utilities.
//!
//! Helpers for turning raw frame bytes into values a consumer can use:
//! - 16-bit little-endian pixels (disparity, chroma)
//! - Sub-pixel disparity to floating point
//! - Min-max normalization to 8-bit for display

mod convert;

pub use convert::{disparity_to_f32, normalize_to_u8, u16_pixels, DISPARITY_SUBPIXELS};
