//! Convert raster images into stitchable pixel-art patterns.
//!
//! The pipeline is strictly sequential:
//!
//! 1. [`decode`]: raw bytes to an RGB pixel buffer.
//! 2. [`downsample`]: nearest-neighbour resample to the target width.
//! 3. [`quantize`]: k-means clustering down to `num_colors` colors.
//! 4. [`encode`]: palette hex strings plus a 2-D grid of palette indices.
//!
//! Each call is a pure, CPU-bound function of its inputs. Nothing is cached
//! between calls, so concurrent invocations need no coordination, but a
//! call can take hundreds of milliseconds for large widths and color counts
//! and should be kept off any single-threaded dispatch loop.

use js_sys::{Array, Object, Reflect};
use wasm_bindgen::prelude::*;

pub mod decode;
pub mod downsample;
pub mod encode;
pub mod error;
pub mod options;
pub mod quantize;
pub mod render;

pub use encode::{Dimensions, Pattern};
pub use error::PatternError;
pub use options::{ColorSpace, PatternOptions};

/// Convert `image_bytes` into a pattern `width` cells wide with
/// `num_colors` palette entries, using the default clustering options.
///
/// # Errors
///
/// See [`convert_with_options`].
pub fn convert(
    image_bytes: &[u8],
    width: u32,
    num_colors: usize,
) -> Result<Pattern, PatternError> {
    convert_with_options(image_bytes, &PatternOptions::new(width, num_colors))
}

/// Run the full pipeline with explicit options.
///
/// # Errors
///
/// - [`PatternError::InvalidImage`] if the bytes are not a decodable image.
/// - [`PatternError::InvalidParameter`] if the width or color count is zero
///   or above a configured cap, the resampled height rounds to zero, or the
///   color count exceeds the number of resampled pixels.
/// - [`PatternError::Processing`] if clustering fails numerically.
pub fn convert_with_options(
    image_bytes: &[u8],
    opts: &PatternOptions,
) -> Result<Pattern, PatternError> {
    opts.validate()?;

    let img = decode::decode_rgb(image_bytes)?;
    if let Some(max) = opts.max_height {
        let height = downsample::target_height(img.width(), img.height(), opts.width)?;
        if height > max {
            return Err(PatternError::InvalidParameter(format!(
                "pattern height {height} exceeds the maximum of {max}"
            )));
        }
    }
    let small = downsample::downsample_nearest(&img, opts.width)?;
    let (width, height) = small.dimensions();

    let pixels = width as usize * height as usize;
    if opts.num_colors > pixels {
        return Err(PatternError::InvalidParameter(format!(
            "color count {} exceeds pixel count {pixels} of the {width}x{height} pattern",
            opts.num_colors
        )));
    }

    let clustering = quantize::quantize(&small, opts)?;
    let pattern = encode::encode_pattern(&clustering, width, height)?;

    tracing::debug!(
        width,
        height,
        colors = pattern.palette.len(),
        color_space = %opts.color_space,
        "Pattern generated"
    );
    Ok(pattern)
}

// ------------------------------------------------------------
// WebAssembly entry point
// ------------------------------------------------------------

/// Largest grid side accepted from the browser.
pub const BROWSER_MAX_SIDE: u32 = 1000;

/// Options used by [`convert_image`]: defaults plus size caps, since a
/// browser caller has no other way to bound the work.
#[must_use]
pub fn browser_options(width: u32, num_colors: usize) -> PatternOptions {
    PatternOptions {
        max_width: Some(BROWSER_MAX_SIDE),
        max_height: Some(BROWSER_MAX_SIDE),
        ..PatternOptions::new(width, num_colors)
    }
}

/// Browser entry point: convert `input` and return
/// `{ dimensions: { width, height }, palette: string[], grid: number[][] }`.
///
/// Errors are thrown as strings. Validation errors carry their specific
/// message; processing errors only a generic one.
#[wasm_bindgen(js_name = convertImage)]
pub fn convert_image(input: Vec<u8>, width: i32, n_colors: i32) -> Result<Object, JsValue> {
    let to_js = |err: PatternError| JsValue::from_str(&err.public_message());

    let width = u32::try_from(width)
        .map_err(|_| PatternError::InvalidParameter("width must be a positive integer".into()))
        .map_err(to_js)?;
    let n_colors = usize::try_from(n_colors)
        .map_err(|_| {
            PatternError::InvalidParameter("color count must be a positive integer".into())
        })
        .map_err(to_js)?;

    let pattern =
        convert_with_options(&input, &browser_options(width, n_colors)).map_err(to_js)?;
    pattern_to_js(&pattern)
}

fn pattern_to_js(pattern: &Pattern) -> Result<Object, JsValue> {
    let dimensions = Object::new();
    Reflect::set(&dimensions, &"width".into(), &pattern.dimensions.width.into())?;
    Reflect::set(&dimensions, &"height".into(), &pattern.dimensions.height.into())?;

    let palette_js = Array::new();
    for hex in &pattern.palette {
        palette_js.push(&JsValue::from_str(hex));
    }

    let grid_js = Array::new();
    for row in &pattern.grid {
        let row_js = Array::new();
        for &index in row {
            row_js.push(&JsValue::from(index));
        }
        grid_js.push(&row_js);
    }

    let result = Object::new();
    Reflect::set(&result, &JsValue::from_str("dimensions"), &dimensions)?;
    Reflect::set(&result, &JsValue::from_str("palette"), &palette_js)?;
    Reflect::set(&result, &JsValue::from_str("grid"), &grid_js)?;
    Ok(result)
}
