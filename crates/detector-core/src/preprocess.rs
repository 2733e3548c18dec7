//! Image preprocessing for model input.
//!
//! Each image file → fixed tensor of shape (3, S, S):
//! - Decode with the `image` crate (any raster format it supports)
//! - Stretch-resize to S×S (non-aspect-preserving), S taken from the
//!   model's declared input resolution
//! - Convert to RGB and scale 0–255 channel values into [0, 1] floats,
//!   channels-first

use std::path::Path;

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array3;

use crate::error::{DetectorError, DetectorResult};

/// Converts image files into normalized tensors of one fixed shape.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    target_size: u32,
}

impl Preprocessor {
    /// `target_size` must match the resolution the model was trained on;
    /// callers obtain it from the model's config rather than hardcoding it.
    pub fn new(target_size: u32) -> Self {
        Self { target_size }
    }

    pub fn target_size(&self) -> u32 {
        self.target_size
    }

    /// Structural validity check without a full decode.
    ///
    /// Probes the image header for dimensions, which is enough to reject
    /// non-image files before the expensive decode/resize path runs.
    pub fn verify(path: &Path) -> DetectorResult<()> {
        image::image_dimensions(path)
            .map(|_| ())
            .map_err(|e| DetectorError::InvalidImage(e.to_string()))
    }

    /// Decode and stretch-resize an image to the target square resolution.
    pub fn resized_rgb(&self, path: &Path) -> DetectorResult<RgbImage> {
        let img = image::open(path).map_err(|e| DetectorError::Preprocessing(e.to_string()))?;
        Ok(img
            .resize_exact(self.target_size, self.target_size, FilterType::Lanczos3)
            .to_rgb8())
    }

    /// Scale an RGB image into a channels-first [0, 1] float tensor.
    pub fn normalize(&self, img: &RgbImage) -> Array3<f32> {
        let (width, height) = img.dimensions();
        let mut tensor = Array3::<f32>::zeros((3, height as usize, width as usize));

        for (x, y, pixel) in img.enumerate_pixels() {
            for c in 0..3 {
                tensor[[c, y as usize, x as usize]] = pixel.0[c] as f32 / 255.0;
            }
        }

        tensor
    }

    /// Full preprocessing path: decode → resize → normalize.
    pub fn tensor_from_path(&self, path: &Path) -> DetectorResult<Array3<f32>> {
        Ok(self.normalize(&self.resized_rgb(path)?))
    }
}
