//! Rendering a pattern back into a raster chart preview.
//!
//! Every grid cell becomes a `cell_size`×`cell_size` block of its palette
//! color, which is the same as a nearest-neighbour upscale of the
//! quantized grid.

use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage};

use crate::encode::{Pattern, parse_hex};
use crate::error::PatternError;

/// Paint `pattern` with square cells of `cell_size` pixels.
///
/// # Errors
///
/// Returns [`PatternError::InvalidParameter`] if `cell_size` is zero, the
/// image would be too large, the grid does not match the stated
/// dimensions, a palette entry is not a hex color, or a grid value has no
/// palette entry.
pub fn render_pattern(pattern: &Pattern, cell_size: u32) -> Result<RgbImage, PatternError> {
    if cell_size == 0 {
        return Err(PatternError::InvalidParameter(
            "cell size must be a positive integer".into(),
        ));
    }
    let colors: Vec<Rgb<u8>> = pattern
        .palette
        .iter()
        .map(|hex| parse_hex(hex).map(Rgb))
        .collect::<Result<_, _>>()?;

    let cols = pattern.dimensions.width;
    let rows = pattern.dimensions.height;
    let grid_ok = pattern.grid.len() == rows as usize
        && pattern.grid.iter().all(|row| row.len() == cols as usize);
    if !grid_ok {
        return Err(PatternError::InvalidParameter(format!(
            "grid does not match dimensions {cols}x{rows}"
        )));
    }
    if let Some(&bad) = pattern.grid.iter().flatten().find(|&&i| i >= colors.len()) {
        return Err(PatternError::InvalidParameter(format!(
            "grid index {bad} has no palette entry (palette has {})",
            colors.len()
        )));
    }

    let (Some(out_w), Some(out_h)) = (cols.checked_mul(cell_size), rows.checked_mul(cell_size))
    else {
        return Err(PatternError::InvalidParameter(format!(
            "{cols}x{rows} cells of {cell_size}px is too large to render"
        )));
    };

    Ok(RgbImage::from_fn(out_w, out_h, |x, y| {
        let index = pattern.grid[(y / cell_size) as usize][(x / cell_size) as usize];
        colors[index]
    }))
}

/// PNG-encode a rendered chart.
///
/// # Errors
///
/// Returns [`PatternError::Processing`] if the encoder fails.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>, PatternError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| PatternError::processing(format!("PNG encode error: {e}")))?;
    Ok(buf)
}
