//! Error types for mask file operations.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised when reading a mask or source image.
/// Callers recover by falling back to a blank mask.
#[derive(Error, Debug)]
pub enum MaskDecodeError {
    /// File does not exist
    #[error("File not found: {path:?}")]
    NotFound {
        /// Path that was looked up
        path: PathBuf,
    },

    /// File exists but could not be decoded
    #[error("Failed to decode {path:?}: {source}")]
    Decode {
        /// Path of the undecodable file
        path: PathBuf,
        /// Decoder error
        source: image::ImageError,
    },

    /// Decoded image has no pixels
    #[error("Degenerate geometry {width}x{height} in {path:?}")]
    Degenerate {
        /// Path of the file
        path: PathBuf,
        /// Decoded width
        width: u32,
        /// Decoded height
        height: u32,
    },
}

/// Errors raised when writing a mask or overlay.
#[derive(Error, Debug)]
pub enum MaskEncodeError {
    /// Encoder failure (unknown extension, unsupported pixel layout, I/O)
    #[error("Failed to encode {path:?}: {source}")]
    Encode {
        /// Destination path
        path: PathBuf,
        /// Encoder error
        source: image::ImageError,
    },

    /// Destination format would alter label ids
    #[error("Refusing lossy format for label data: {path:?}")]
    LossyFormat {
        /// Destination path
        path: PathBuf,
    },

    /// Filesystem error outside the encoder
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
