use std::collections::TryReserveError;

use thiserror::Error;

/// Everything that can go wrong while quantizing, dithering, or encoding.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("image dimensions cannot be zero")]
    ZeroDimension,

    #[error("pixel buffer length {len} does not match dimensions {width}x{height}")]
    DimensionMismatch {
        len: usize,
        width: usize,
        height: usize,
    },

    #[error("dither strength must be between 0.0 and 1.0, got {0}")]
    InvalidStrength(f32),

    #[error("failed to allocate {bytes} bytes of working memory")]
    Allocation {
        bytes: usize,
        #[source]
        source: TryReserveError,
    },

    #[error("compression produced no output for a non-empty image")]
    Compression,

    #[error("truecolor output requires the `truecolor` feature")]
    EncoderUnavailable,

    #[cfg(feature = "truecolor")]
    #[error("png encoding failed: {0}")]
    Truecolor(#[from] png::EncodingError),
}
