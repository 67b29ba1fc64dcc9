//! Error taxonomy for the image-to-pattern pipeline.

/// Message handed to callers in place of internal processing details.
pub const GENERIC_PROCESSING_MESSAGE: &str = "internal processing error";

/// Errors produced by [`crate::convert`] and its stages.
///
/// `InvalidImage` and `InvalidParameter` are validation failures the caller
/// can fix. `Processing` covers numeric failures inside the pipeline and is
/// only ever reported generically to the outside.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    /// The input bytes could not be decoded as a supported raster image.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// A width, color count or other option is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Clustering or another internal computation failed.
    #[error("processing failed: {0}")]
    Processing(String),
}

impl PatternError {
    /// Build a [`PatternError::Processing`], logging the detail that
    /// [`Self::public_message`] later withholds.
    #[must_use]
    pub fn processing(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        tracing::error!(%detail, "Pattern processing failed");
        Self::Processing(detail)
    }

    /// True for errors caused by the caller's input.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidImage(_) | Self::InvalidParameter(_))
    }

    /// Message safe to show to a client.
    #[must_use]
    pub fn public_message(&self) -> String {
        if self.is_validation() {
            self.to_string()
        } else {
            GENERIC_PROCESSING_MESSAGE.to_owned()
        }
    }
}

impl From<image::ImageError> for PatternError {
    fn from(err: image::ImageError) -> Self {
        Self::InvalidImage(err.to_string())
    }
}
