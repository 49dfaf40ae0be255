//! Convenience helpers for loading frames and templates via the `image` crate.

use crate::image::OwnedImage;
use crate::util::{RegionMatchError, RegionMatchResult};
use std::path::Path;

/// Creates an owned image from a grayscale image buffer.
pub fn owned_from_gray_image(img: &image::GrayImage) -> RegionMatchResult<OwnedImage> {
    let width = img.width() as usize;
    let height = img.height() as usize;
    OwnedImage::new(img.as_raw().clone(), width, height)
}

/// Loads an image from disk and converts it to a grayscale owned image.
pub fn load_gray_image<P: AsRef<Path>>(path: P) -> RegionMatchResult<OwnedImage> {
    let img = image::open(path).map_err(|err| RegionMatchError::ImageIo {
        reason: err.to_string(),
    })?;
    owned_from_gray_image(&img.to_luma8())
}
