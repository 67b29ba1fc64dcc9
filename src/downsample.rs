//! Nearest-neighbour resampling to a target grid width.
//!
//! Every output pixel copies exactly one source pixel, so no color appears
//! in the output that was not already in the input. Interpolating filters
//! would blend neighbours into new colors that then compete for palette
//! slots during clustering.

use image::RgbImage;

use crate::error::PatternError;

/// Height of the pattern for a source of `src_w`×`src_h` resampled to
/// `width` columns: `round(width * src_h / src_w)`, halves rounding up.
///
/// # Errors
///
/// Returns [`PatternError::InvalidParameter`] if `width` is zero or the
/// rounded height is zero, and [`PatternError::InvalidImage`] if the
/// source has a zero dimension.
pub fn target_height(src_w: u32, src_h: u32, width: u32) -> Result<u32, PatternError> {
    if width == 0 {
        return Err(PatternError::InvalidParameter(
            "width must be a positive integer".into(),
        ));
    }
    if src_w == 0 || src_h == 0 {
        return Err(PatternError::InvalidImage(format!(
            "image has zero size ({src_w}x{src_h})"
        )));
    }

    let (w, sw, sh) = (u64::from(width), u64::from(src_w), u64::from(src_h));
    let rounded = (2 * w * sh + sw) / (2 * sw);
    let height = u32::try_from(rounded).map_err(|_| {
        PatternError::InvalidParameter(format!("pattern height {rounded} is too large"))
    })?;
    if height == 0 {
        return Err(PatternError::InvalidParameter(format!(
            "width {width} gives a pattern height of 0 for a {src_w}x{src_h} image"
        )));
    }
    Ok(height)
}

/// Resample `img` to `width` columns, keeping the aspect ratio.
///
/// # Errors
///
/// Same conditions as [`target_height`].
pub fn downsample_nearest(img: &RgbImage, width: u32) -> Result<RgbImage, PatternError> {
    let (in_w, in_h) = img.dimensions();
    let out_h = target_height(in_w, in_h, width)?;

    // Fast path - no scaling required.
    if width == in_w && out_h == in_h {
        return Ok(img.clone());
    }

    // Source column/row for each output column/row, sampled at cell centres.
    let cols = nearest_indices(in_w, width);
    let rows = nearest_indices(in_h, out_h);

    let out = RgbImage::from_fn(width, out_h, |x, y| {
        *img.get_pixel(cols[x as usize], rows[y as usize])
    });

    tracing::debug!(
        from_width = in_w,
        from_height = in_h,
        width,
        height = out_h,
        "Downsampled image"
    );
    Ok(out)
}

/// `floor((i + 0.5) * len_in / len_out)` for each output index, clamped to
/// the last source index.
fn nearest_indices(len_in: u32, len_out: u32) -> Vec<u32> {
    let (len_in64, len_out64) = (u64::from(len_in), u64::from(len_out));
    (0..len_out64)
        .map(|i| {
            let src = ((2 * i + 1) * len_in64) / (2 * len_out64);
            // src < len_in always holds here, the clamp only guards the cast.
            u32::try_from(src).map_or(len_in - 1, |s| s.min(len_in - 1))
        })
        .collect()
}
