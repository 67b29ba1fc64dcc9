//! Turning a clustering into a display-ready pattern.

use serde::{Deserialize, Serialize};

use crate::error::PatternError;
use crate::quantize::Clustering;

/// Size of the pattern grid in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// A palette plus a grid of palette indices.
///
/// `grid` has `dimensions.height` rows of `dimensions.width` entries, and
/// every entry indexes into `palette`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    pub dimensions: Dimensions,
    /// `#rrggbb` strings, in cluster order.
    pub palette: Vec<String>,
    pub grid: Vec<Vec<usize>>,
}

/// Format a real-valued RGB triple as `#rrggbb`.
///
/// Each channel is clamped to `0..=255` and rounded to the nearest integer.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn to_hex(color: [f32; 3]) -> String {
    let [r, g, b] = color.map(|v| v.clamp(0.0, 255.0).round() as u8);
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// Parse a `#rrggbb` (or bare `rrggbb`) string into an RGB triple.
///
/// # Errors
///
/// Returns [`PatternError::InvalidParameter`] if the string is not six hex
/// digits.
pub fn parse_hex(s: &str) -> Result<[u8; 3], PatternError> {
    let hex = s.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(PatternError::InvalidParameter(format!(
            "hex color must be 6 characters: {s:?}"
        )));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16)
            .map_err(|_| PatternError::InvalidParameter(format!("invalid hex color: {s:?}")))
    };
    Ok([channel(0..2)?, channel(2..4)?, channel(4..6)?])
}

/// Build a [`Pattern`] from cluster centers and row-major labels.
///
/// # Errors
///
/// Returns [`PatternError::Processing`] if the number of labels does not
/// match `width * height` or a label has no center. Both indicate a bug
/// upstream rather than bad user input.
pub fn encode_pattern(
    clustering: &Clustering,
    width: u32,
    height: u32,
) -> Result<Pattern, PatternError> {
    let cells = width as usize * height as usize;
    if width == 0 || clustering.labels.len() != cells {
        return Err(PatternError::processing(format!(
            "{} labels cannot fill a {width}x{height} grid",
            clustering.labels.len()
        )));
    }
    let k = clustering.centers.len();
    if let Some(label) = clustering.labels.iter().find(|&&l| usize::from(l) >= k) {
        return Err(PatternError::processing(format!(
            "label {label} has no center among {k}"
        )));
    }

    let palette = clustering.centers.iter().copied().map(to_hex).collect();
    let grid = clustering
        .labels
        .chunks(width as usize)
        .map(|row| row.iter().map(|&l| usize::from(l)).collect())
        .collect();

    Ok(Pattern {
        dimensions: Dimensions { width, height },
        palette,
        grid,
    })
}
