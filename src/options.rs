//! Pipeline configuration.
//!
//! [`PatternOptions`] carries the two user-facing knobs (target width and
//! color count) together with the clustering parameters that make the
//! output reproducible. Every field has a default, so a partial JSON
//! document deserializes into a complete configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PatternError;

/// Default target width of the pattern grid, in cells.
pub const DEFAULT_WIDTH: u32 = 50;
/// Default number of palette colors.
pub const DEFAULT_NUM_COLORS: usize = 5;
/// Fixed seed for the clustering initialization.
pub const DEFAULT_SEED: u64 = 42;
/// Number of independently seeded k-means runs.
pub const DEFAULT_RESTARTS: u32 = 10;
/// Iteration cap for a single k-means run.
pub const DEFAULT_MAX_ITERATIONS: usize = 300;
/// Centroid shift below which a run is considered converged.
pub const DEFAULT_CONVERGENCE: f32 = 1e-4;
/// Cluster labels are stored as bytes, so no more than this many colors.
pub const MAX_SUPPORTED_COLORS: usize = 256;

/// Color space in which pixel colors are clustered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorSpace {
    /// Plain sRGB channel distance.
    #[default]
    Rgb,
    /// CIE L*a*b*, perceptually more uniform.
    Lab,
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rgb => f.write_str("rgb"),
            Self::Lab => f.write_str("lab"),
        }
    }
}

/// Options for a single conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternOptions {
    /// Width of the output grid.
    pub width: u32,
    /// Number of palette entries (k).
    pub num_colors: usize,
    /// Base seed; restart `r` uses `seed + r`.
    pub seed: u64,
    /// Number of k-means restarts, the lowest-score run wins.
    pub restarts: u32,
    pub max_iterations: usize,
    pub convergence: f32,
    pub color_space: ColorSpace,
    /// Optional caller-imposed cap on `width`.
    pub max_width: Option<u32>,
    /// Optional cap on the resampled height, checked once the source
    /// aspect ratio is known.
    pub max_height: Option<u32>,
    /// Optional caller-imposed cap on `num_colors`.
    pub max_colors: Option<usize>,
}

impl Default for PatternOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            num_colors: DEFAULT_NUM_COLORS,
            seed: DEFAULT_SEED,
            restarts: DEFAULT_RESTARTS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            convergence: DEFAULT_CONVERGENCE,
            color_space: ColorSpace::default(),
            max_width: None,
            max_height: None,
            max_colors: None,
        }
    }
}

impl PatternOptions {
    /// Default options with the given width and color count.
    #[must_use]
    pub fn new(width: u32, num_colors: usize) -> Self {
        Self {
            width,
            num_colors,
            ..Self::default()
        }
    }

    /// Check everything that does not depend on the image itself.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::InvalidParameter`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), PatternError> {
        if self.width == 0 {
            return Err(invalid("width must be a positive integer"));
        }
        if let Some(max) = self.max_width {
            if self.width > max {
                return Err(invalid(format!(
                    "width {} exceeds the maximum of {max}",
                    self.width
                )));
            }
        }
        if self.num_colors == 0 {
            return Err(invalid("color count must be a positive integer"));
        }
        let color_cap = self
            .max_colors
            .map_or(MAX_SUPPORTED_COLORS, |max| max.min(MAX_SUPPORTED_COLORS));
        if self.num_colors > color_cap {
            return Err(invalid(format!(
                "color count {} exceeds the maximum of {color_cap}",
                self.num_colors
            )));
        }
        if self.restarts == 0 {
            return Err(invalid("restarts must be at least 1"));
        }
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations must be at least 1"));
        }
        if !self.convergence.is_finite() || self.convergence < 0.0 {
            return Err(invalid("convergence must be a finite, non-negative number"));
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> PatternError {
    PatternError::InvalidParameter(msg.into())
}
