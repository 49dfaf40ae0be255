//! Image views and owned grayscale buffers.
//!
//! `ImageView` is a borrowed 2D view into a 1D buffer with an explicit
//! stride, so region crops are zero-copy slices into the captured frame.
//! `OwnedImage` is a contiguous grayscale buffer used for frames and
//! reference templates.

use crate::util::{RegionMatchError, RegionMatchResult};

pub mod io;

/// Borrowed 2D image view with an explicit stride.
#[derive(Copy, Clone, Debug)]
pub struct ImageView<'a, T> {
    data: &'a [T],
    width: usize,
    height: usize,
    stride: usize,
}

impl<'a, T> ImageView<'a, T> {
    /// Creates a contiguous view with `stride == width`.
    pub fn from_slice(data: &'a [T], width: usize, height: usize) -> RegionMatchResult<Self> {
        Self::new(data, width, height, width)
    }

    /// Creates a view with an explicit stride.
    pub fn new(
        data: &'a [T],
        width: usize,
        height: usize,
        stride: usize,
    ) -> RegionMatchResult<Self> {
        if width == 0 || height == 0 {
            return Err(RegionMatchError::InvalidDimensions { width, height });
        }
        if stride < width {
            return Err(RegionMatchError::InvalidStride { width, stride });
        }
        let needed = (height - 1)
            .checked_mul(stride)
            .and_then(|v| v.checked_add(width))
            .ok_or(RegionMatchError::InvalidDimensions { width, height })?;
        if data.len() < needed {
            return Err(RegionMatchError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            stride,
        })
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the stride in elements between row starts.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Returns a contiguous slice for row `y` with length `width`.
    pub fn row(&self, y: usize) -> Option<&'a [T]> {
        if y >= self.height {
            return None;
        }
        let start = y * self.stride;
        self.data.get(start..start + self.width)
    }

    /// Returns a zero-copy ROI view into the same backing buffer.
    pub fn roi(
        &self,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) -> RegionMatchResult<ImageView<'a, T>> {
        if width == 0 || height == 0 {
            return Err(RegionMatchError::InvalidDimensions { width, height });
        }
        let fits_x = x.checked_add(width).is_some_and(|e| e <= self.width);
        let fits_y = y.checked_add(height).is_some_and(|e| e <= self.height);
        if !fits_x || !fits_y {
            return Err(RegionMatchError::RoiOutOfBounds {
                x,
                y,
                width,
                height,
                img_width: self.width,
                img_height: self.height,
            });
        }
        let start = y * self.stride + x;
        ImageView::new(&self.data[start..], width, height, self.stride)
    }
}

/// Owned contiguous grayscale image buffer.
#[derive(Clone, Debug)]
pub struct OwnedImage {
    data: Vec<u8>,
    width: usize,
    height: usize,
}

impl OwnedImage {
    /// Creates an owned image from an exactly-sized contiguous buffer.
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> RegionMatchResult<Self> {
        if width == 0 || height == 0 {
            return Err(RegionMatchError::InvalidDimensions { width, height });
        }
        let needed = width
            .checked_mul(height)
            .ok_or(RegionMatchError::InvalidDimensions { width, height })?;
        if data.len() != needed {
            return Err(RegionMatchError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    /// Converts an interleaved 3-channel BGR buffer to grayscale.
    ///
    /// Uses Rec.601 luma weights, matching the usual BGR capture pipeline.
    pub fn from_bgr(data: &[u8], width: usize, height: usize) -> RegionMatchResult<Self> {
        let pixels = width
            .checked_mul(height)
            .ok_or(RegionMatchError::InvalidDimensions { width, height })?;
        let needed = pixels
            .checked_mul(3)
            .ok_or(RegionMatchError::InvalidDimensions { width, height })?;
        if data.len() < needed {
            return Err(RegionMatchError::BufferTooSmall {
                needed,
                got: data.len(),
            });
        }
        let mut gray = Vec::with_capacity(pixels);
        for bgr in data[..needed].chunks_exact(3) {
            let luma =
                0.114f32 * bgr[0] as f32 + 0.587f32 * bgr[1] as f32 + 0.299f32 * bgr[2] as f32;
            gray.push(luma.round().clamp(0.0, 255.0) as u8);
        }
        Self::new(gray, width, height)
    }

    /// Returns the image width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the image height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns a borrowed view of the image.
    pub fn view(&self) -> ImageView<'_, u8> {
        ImageView {
            data: &self.data,
            width: self.width,
            height: self.height,
            stride: self.width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roi_is_zero_copy_and_keeps_stride() {
        let data: Vec<u8> = (0u8..16).collect();
        let view = ImageView::from_slice(&data, 4, 4).unwrap();

        let roi = view.roi(1, 1, 2, 2).unwrap();
        assert_eq!(roi.stride(), 4);
        assert_eq!(roi.row(0).unwrap(), &[5u8, 6u8]);
        assert_eq!(roi.row(1).unwrap(), &[9u8, 10u8]);

        let err = view.roi(3, 3, 2, 2).unwrap_err();
        assert!(matches!(err, RegionMatchError::RoiOutOfBounds { .. }));
    }

    #[test]
    fn bgr_conversion_uses_luma_weights() {
        // Pure blue, green, red pixels.
        let data = vec![255u8, 0, 0, 0, 255, 0, 0, 0, 255];
        let gray = OwnedImage::from_bgr(&data, 3, 1).unwrap();
        assert_eq!(gray.view().row(0).unwrap(), &[29u8, 150, 76]);
    }

    #[test]
    fn owned_image_rejects_wrong_buffer_size() {
        let err = OwnedImage::new(vec![0u8; 3], 2, 2).unwrap_err();
        assert_eq!(err, RegionMatchError::BufferTooSmall { needed: 4, got: 3 });
    }
}
