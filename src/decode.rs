//! Decoding raw bytes into an RGB pixel buffer.
//!
//! Whatever the source format (PNG, JPEG, BMP, GIF, ...), the output is an
//! 8-bit three-channel [`RgbImage`]. Alpha is dropped and palette or
//! grayscale images are expanded to RGB. Animated GIFs yield their first
//! frame.

use std::io::Cursor;

use image::{ImageReader, RgbImage};

use crate::error::PatternError;

/// Decode `bytes` into an RGB pixel buffer.
///
/// # Errors
///
/// Returns [`PatternError::InvalidImage`] if the bytes are empty, the
/// format cannot be recognized, decoding fails, or the image has a zero
/// dimension.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, PatternError> {
    if bytes.is_empty() {
        return Err(PatternError::InvalidImage("input image data is empty".into()));
    }

    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PatternError::InvalidImage(e.to_string()))?;
    let Some(format) = reader.format() else {
        return Err(PatternError::InvalidImage("unrecognized image format".into()));
    };

    let img = reader.decode()?;
    if img.width() == 0 || img.height() == 0 {
        return Err(PatternError::InvalidImage(format!(
            "image has zero size ({}x{})",
            img.width(),
            img.height()
        )));
    }

    tracing::debug!(
        ?format,
        width = img.width(),
        height = img.height(),
        color = ?img.color(),
        "Decoded image"
    );
    Ok(img.to_rgb8())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    #[test]
    fn empty_input_is_invalid_image() {
        assert!(matches!(decode_rgb(&[]), Err(PatternError::InvalidImage(_))));
    }

    #[test]
    fn garbage_bytes_are_invalid_image() {
        let result = decode_rgb(b"definitely not an image");
        assert!(matches!(result, Err(PatternError::InvalidImage(_))));
    }

    #[test]
    fn truncated_png_is_invalid_image() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, image::Rgb([1, 2, 3])));
        let bytes = encode(img, ImageFormat::Png);
        let result = decode_rgb(&bytes[..bytes.len() / 2]);
        assert!(matches!(result, Err(PatternError::InvalidImage(_))));
    }

    #[test]
    fn rgba_png_drops_alpha() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 40]));
        let bytes = encode(DynamicImage::ImageRgba8(img), ImageFormat::Png);
        let rgb = decode_rgb(&bytes).unwrap();
        assert_eq!(rgb.dimensions(), (3, 2));
        assert!(rgb.pixels().all(|p| p.0 == [10, 20, 30]));
    }

    #[test]
    fn grayscale_is_expanded_to_rgb() {
        let img = image::GrayImage::from_pixel(4, 4, image::Luma([77]));
        let bytes = encode(DynamicImage::ImageLuma8(img), ImageFormat::Png);
        let rgb = decode_rgb(&bytes).unwrap();
        assert!(rgb.pixels().all(|p| p.0 == [77, 77, 77]));
    }

    #[test]
    fn bmp_decodes_exactly() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(5, 7, image::Rgb([0, 0, 255])));
        let rgb = decode_rgb(&encode(img, ImageFormat::Bmp)).unwrap();
        assert_eq!(rgb.dimensions(), (5, 7));
        assert_eq!(rgb.get_pixel(2, 3).0, [0, 0, 255]);
    }

    #[test]
    fn gif_and_jpeg_decode_to_same_shape() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(5, 7, Rgba([0, 0, 255, 255])));
        let gif = decode_rgb(&encode(img.clone(), ImageFormat::Gif)).unwrap();
        assert_eq!(gif.dimensions(), (5, 7));

        let jpeg = encode(DynamicImage::ImageRgb8(img.to_rgb8()), ImageFormat::Jpeg);
        assert_eq!(decode_rgb(&jpeg).unwrap().dimensions(), (5, 7));
    }
}
