//! Pixel format conversion.

/// Sub-pixel steps per pixel in a disparity map.
pub const DISPARITY_SUBPIXELS: f32 = 16.0;

/// Reads little-endian 16-bit pixels.
///
/// A trailing odd byte is ignored.
pub fn u16_pixels(data: &[u8]) -> Vec<u16> {
    data.chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Converts a 16-bit disparity map to disparities in pixels.
///
/// The sensor reports disparity in 1/16 pixel units.
///
/// # Example
///
/// ```
/// use stereo_sync::format::disparity_to_f32;
///
/// let raw = [0x20, 0x00, 0x08, 0x00]; // 32 and 8 sub-pixels
/// assert_eq!(disparity_to_f32(&raw), vec![2.0, 0.5]);
/// ```
pub fn disparity_to_f32(data: &[u8]) -> Vec<f32> {
    u16_pixels(data)
        .into_iter()
        .map(|d| f32::from(d) / DISPARITY_SUBPIXELS)
        .collect()
}

/// Stretches values to the full 0..=255 range for display.
///
/// The minimum maps to 0 and the maximum to 255. Constant input maps to 0,
/// and NaN is treated as the minimum.
pub fn normalize_to_u8(values: &[f32]) -> Vec<u8> {
    let (min, max) = values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });

    let range = max - min;
    if range <= 0.0 || !range.is_finite() {
        return vec![0; values.len()];
    }

    values
        .iter()
        .map(|&v| {
            if v.is_nan() {
                0
            } else {
                ((v - min) / range * 255.0).round().clamp(0.0, 255.0) as u8
            }
        })
        .collect()
}
