//! Labeled dataset discovery and batch loading for training.
//!
//! Expects the directory layout:
//!
//! ```text
//! dataset/
//!   train/  valid/  test/
//!     fake/  real/        (raster images, any format the image crate reads)
//! ```
//!
//! Labels are fixed: fake = 0, real = 1.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use burn::tensor::backend::Backend;
use burn::tensor::{Int, Tensor, TensorData};
use ndarray::Array3;
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::augment;
use crate::error::DetectorResult;
use crate::preprocess::Preprocessor;

/// Class subdirectory names, index = label.
pub const CLASS_NAMES: [&str; 2] = ["fake", "real"];

pub const SPLIT_NAMES: [&str; 3] = ["train", "valid", "test"];

#[derive(Debug, Clone)]
pub struct LabeledImage {
    pub path: PathBuf,
    pub label: u8,
}

/// Per-class image counts of one split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitCounts {
    pub fake: usize,
    pub real: usize,
}

impl SplitCounts {
    pub fn total(&self) -> usize {
        self.fake + self.real
    }

    /// Inverse-frequency class weights `[fake, real]` to counteract label
    /// imbalance in the loss. `None` when either class is empty.
    pub fn class_weights(&self) -> Option<[f32; 2]> {
        if self.fake == 0 || self.real == 0 {
            return None;
        }
        let total = self.total() as f32;
        Some([
            total / (2.0 * self.fake as f32),
            total / (2.0 * self.real as f32),
        ])
    }
}

pub fn count_labels(images: &[LabeledImage]) -> SplitCounts {
    let real = images.iter().filter(|i| i.label == 1).count();
    SplitCounts {
        fake: images.len() - real,
        real,
    }
}

/// Collect the labeled images of one split directory.
pub fn discover_split(dir: &Path) -> Result<Vec<LabeledImage>> {
    let mut images = Vec::new();

    for (label, class) in CLASS_NAMES.iter().enumerate() {
        let class_dir = dir.join(class);
        if !class_dir.is_dir() {
            bail!("Missing class directory {}", class_dir.display());
        }
        for entry in WalkDir::new(&class_dir).follow_links(false).into_iter().flatten() {
            let path = entry.into_path();
            if path.is_file() {
                images.push(LabeledImage {
                    path,
                    label: label as u8,
                });
            }
        }
    }

    Ok(images)
}

/// The three dataset splits used by a training run.
#[derive(Debug, Clone)]
pub struct DatasetSplits {
    pub train: Vec<LabeledImage>,
    pub valid: Vec<LabeledImage>,
    pub test: Vec<LabeledImage>,
}

impl DatasetSplits {
    pub fn discover(root: &Path) -> Result<Self> {
        let missing: Vec<String> = SPLIT_NAMES
            .iter()
            .filter(|name| !root.join(name).is_dir())
            .map(|name| format!("- {}", root.join(name).display()))
            .collect();
        if !missing.is_empty() {
            bail!(
                "Dataset directories not found. Please ensure the following directories exist:\n{}\nEach should contain 'real/' and 'fake/' subdirectories.",
                missing.join("\n")
            );
        }

        Ok(Self {
            train: discover_split(&root.join("train"))?,
            valid: discover_split(&root.join("valid"))?,
            test: discover_split(&root.join("test"))?,
        })
    }
}

/// One fixed-size batch of preprocessed images.
#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    /// Shape [batch, 3, S, S].
    pub images: Tensor<B, 4>,
    /// Shape [batch], values 0 (fake) or 1 (real).
    pub targets: Tensor<B, 1, Int>,
}

/// Loads labeled images into batches, optionally augmenting each one.
pub struct BatchLoader {
    preprocessor: Preprocessor,
    batch_size: usize,
    augment: bool,
}

impl BatchLoader {
    pub fn new(preprocessor: Preprocessor, batch_size: usize, augment: bool) -> Self {
        Self {
            preprocessor,
            batch_size,
            augment,
        }
    }

    /// Split `items` into fixed-size batches in order. Call after shuffling.
    ///
    /// Unreadable images are skipped with a warning rather than aborting a
    /// long offline run, so a batch may come out smaller than `batch_size`.
    pub fn batches<B: Backend>(
        &self,
        items: &[LabeledImage],
        device: &B::Device,
    ) -> Vec<ImageBatch<B>> {
        items
            .chunks(self.batch_size)
            .filter_map(|chunk| self.load_batch(chunk, device))
            .collect()
    }

    fn load_batch<B: Backend>(
        &self,
        chunk: &[LabeledImage],
        device: &B::Device,
    ) -> Option<ImageBatch<B>> {
        let loaded: Vec<(Array3<f32>, u8)> = chunk
            .par_iter()
            .filter_map(|item| match self.load_one(item) {
                Ok(tensor) => Some((tensor, item.label)),
                Err(e) => {
                    log::warn!("Skipping {}: {e}", item.path.display());
                    None
                }
            })
            .collect();

        if loaded.is_empty() {
            return None;
        }

        let size = self.preprocessor.target_size() as usize;
        let mut pixels = Vec::with_capacity(loaded.len() * 3 * size * size);
        let mut labels = Vec::with_capacity(loaded.len());
        for (tensor, label) in &loaded {
            pixels.extend(tensor.iter().copied());
            labels.push(*label as i64);
        }

        let images = Tensor::from_data(
            TensorData::new(pixels, [loaded.len(), 3, size, size]),
            device,
        );
        let targets = Tensor::from_data(TensorData::new(labels, [loaded.len()]), device);

        Some(ImageBatch { images, targets })
    }

    fn load_one(&self, item: &LabeledImage) -> DetectorResult<Array3<f32>> {
        let rgb = self.preprocessor.resized_rgb(&item.path)?;
        let rgb = if self.augment {
            augment::random_transform(&rgb, &mut rand::thread_rng())
        } else {
            rgb
        };
        Ok(self.preprocessor.normalize(&rgb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArrayDevice;
    use burn::backend::NdArray;
    use image::{Rgb, RgbImage};

    type TestBackend = NdArray<f32>;

    fn write_images(dir: &Path, class: &str, count: usize, color: [u8; 3]) {
        let class_dir = dir.join(class);
        std::fs::create_dir_all(&class_dir).unwrap();
        for i in 0..count {
            RgbImage::from_pixel(10, 10, Rgb(color))
                .save(class_dir.join(format!("{i}.png")))
                .unwrap();
        }
    }

    #[test]
    fn discover_split_labels_both_classes() {
        let dir = tempfile::tempdir().unwrap();
        write_images(dir.path(), "fake", 2, [10, 10, 10]);
        write_images(dir.path(), "real", 3, [200, 200, 200]);

        let images = discover_split(dir.path()).unwrap();
        let counts = count_labels(&images);

        assert_eq!(counts, SplitCounts { fake: 2, real: 3 });
        for image in &images {
            let parent = image.path.parent().unwrap().file_name().unwrap();
            assert_eq!(parent, CLASS_NAMES[image.label as usize]);
        }
    }

    #[test]
    fn discover_split_rejects_missing_class_dir() {
        let dir = tempfile::tempdir().unwrap();
        write_images(dir.path(), "fake", 1, [0, 0, 0]);

        let err = discover_split(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Missing class directory"));
    }

    #[test]
    fn discover_splits_reports_expected_layout() {
        let dir = tempfile::tempdir().unwrap();

        let err = DatasetSplits::discover(dir.path()).unwrap_err();
        let message = err.to_string();

        assert!(message.contains("Dataset directories not found"));
        assert!(message.contains("train"));
        assert!(message.contains("'real/' and 'fake/'"));
    }

    #[test]
    fn class_weights_use_inverse_frequency() {
        let counts = SplitCounts { fake: 10, real: 30 };
        let [fake_w, real_w] = counts.class_weights().unwrap();

        assert!((fake_w - 2.0).abs() < 1e-6); // 40 / (2 * 10)
        assert!((real_w - 40.0 / 60.0).abs() < 1e-6);
    }

    #[test]
    fn class_weights_absent_for_empty_class() {
        assert!(SplitCounts { fake: 0, real: 5 }.class_weights().is_none());
        assert!(SplitCounts { fake: 5, real: 0 }.class_weights().is_none());
    }

    #[test]
    fn batches_have_fixed_shape_with_trailing_remainder() {
        let dir = tempfile::tempdir().unwrap();
        write_images(dir.path(), "fake", 2, [0, 0, 0]);
        write_images(dir.path(), "real", 1, [255, 255, 255]);

        let items = discover_split(dir.path()).unwrap();
        let loader = BatchLoader::new(Preprocessor::new(8), 2, false);
        let device = NdArrayDevice::default();

        let batches = loader.batches::<TestBackend>(&items, &device);

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].images.dims(), [2, 3, 8, 8]);
        assert_eq!(batches[0].targets.dims(), [2]);
        assert_eq!(batches[1].images.dims(), [1, 3, 8, 8]);
    }

    #[test]
    fn unreadable_images_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write_images(dir.path(), "fake", 1, [0, 0, 0]);
        write_images(dir.path(), "real", 1, [255, 255, 255]);
        std::fs::write(dir.path().join("real").join("broken.png"), b"not an image").unwrap();

        let items = discover_split(dir.path()).unwrap();
        assert_eq!(items.len(), 3);

        let loader = BatchLoader::new(Preprocessor::new(8), 8, false);
        let device = NdArrayDevice::default();
        let batches = loader.batches::<TestBackend>(&items, &device);

        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].images.dims()[0], 2);
    }

    #[test]
    fn augmented_batches_stay_normalized() {
        let dir = tempfile::tempdir().unwrap();
        write_images(dir.path(), "fake", 1, [30, 60, 90]);
        write_images(dir.path(), "real", 1, [90, 60, 30]);

        let items = discover_split(dir.path()).unwrap();
        let loader = BatchLoader::new(Preprocessor::new(8), 2, true);
        let device = NdArrayDevice::default();

        let batches = loader.batches::<TestBackend>(&items, &device);
        let data = batches[0].images.to_data();

        for v in data.iter::<f32>() {
            assert!((0.0..=1.0).contains(&v));
        }
    }
}
