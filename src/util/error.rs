//! Error types for regionmatch.

use crate::lint::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias for regionmatch operations.
pub type RegionMatchResult<T> = std::result::Result<T, RegionMatchError>;

/// Errors that can occur when loading configuration or evaluating frames.
#[derive(Debug, Error, PartialEq)]
pub enum RegionMatchError {
    /// The image dimensions are invalid (zero or overflowing).
    #[error("invalid image dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },
    /// The stride is smaller than the row width.
    #[error("invalid stride {stride} for width {width}")]
    InvalidStride { width: usize, stride: usize },
    /// The backing buffer is too small for the described image.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// A requested ROI does not fit inside the image.
    #[error("roi {width}x{height} at ({x}, {y}) out of bounds for {img_width}x{img_height} image")]
    RoiOutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        img_width: usize,
        img_height: usize,
    },
    /// A reference template has no usable signal.
    #[error("degenerate template: {reason}")]
    DegenerateTemplate { reason: &'static str },
    /// Reading or decoding an image file failed.
    #[error("image io failed: {reason}")]
    ImageIo { reason: String },
    /// Reading a configuration file failed.
    #[error("failed to read {}: {reason}", .path.display())]
    ConfigIo { path: PathBuf, reason: String },
    /// Parsing a configuration file failed.
    #[error("failed to parse {}: {reason}", .path.display())]
    ConfigParse { path: PathBuf, reason: String },
    /// A region definition cannot be compiled into the typed model.
    #[error("invalid region '{region}': {reason}")]
    InvalidRegion { region: String, reason: String },
    /// A policy definition cannot be compiled into the typed model.
    #[error("invalid policy '{policy}': {reason}")]
    InvalidPolicy { policy: String, reason: String },
    /// The region or policy set was rejected at error level.
    ///
    /// Carries the complete diagnostic list, warnings included, so callers
    /// can report every finding instead of only the first one.
    #[error("configuration rejected with {} error-level diagnostics", .diagnostics.iter().filter(|d| d.is_error()).count())]
    LintRejected { diagnostics: Vec<Diagnostic> },
}
