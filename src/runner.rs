use std::path::Path;

use image::DynamicImage;
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::prelude::*;

use crate::errors::{CellSegError, Result};
use crate::traits::{CellSegmentationModel, EvalOptions, Segmentation};

/// Results of a completed run: four sequences aligned by index, so entry
/// `i` of each describes the image at `filenames[i]`. Alignment holds by
/// construction; entries only enter through [`SegmentationBatch::push`].
#[derive(Debug, Default)]
pub struct SegmentationBatch {
    pub filenames: Vec<String>,
    pub masks: Vec<Array2<u32>>,
    pub flows: Vec<Array3<f32>>,
    pub styles: Vec<Array1<f32>>,
}

impl SegmentationBatch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            filenames: Vec::with_capacity(capacity),
            masks: Vec::with_capacity(capacity),
            flows: Vec::with_capacity(capacity),
            styles: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, filename: String, segmentation: Segmentation) {
        let Segmentation { mask, flow, style } = segmentation;
        self.filenames.push(filename);
        self.masks.push(mask);
        self.flows.push(flow);
        self.styles.push(style);
    }

    /// Number of processed images.
    pub fn len(&self) -> usize {
        self.filenames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filenames.is_empty()
    }
}

/// Segment every file of `files` in order, reporting progress on the way.
///
/// Returns the accumulated batch together with the raw pixel buffer of the
/// last processed image: downstream rendering reuses that single buffer as
/// the backdrop for every composite, mirroring the behavior of the system
/// this pipeline replaces. A decode or model failure aborts the whole run;
/// no partial batch escapes.
pub fn run<M: CellSegmentationModel>(
    files: &[String],
    image_dir: &Path,
    model: &M,
    options: &EvalOptions,
) -> Result<(SegmentationBatch, Option<DynamicImage>)> {
    let mut batch = SegmentationBatch::with_capacity(files.len());
    let mut last_image = None;

    let progress_bar = ProgressBar::new(files.len() as u64);
    progress_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec} {eta})",
        )
        .unwrap()
        .progress_chars("#>-"),
    );

    for filename in files {
        let path = image_dir.join(filename);
        let image = image::open(&path).map_err(|e| CellSegError::ImageProcessing {
            path: path.display().to_string(),
            operation: "image decode".to_string(),
            source: Box::new(e),
        })?;

        let segmentation = model.evaluate(&image, options)?;
        batch.push(filename.clone(), segmentation);
        last_image = Some(image);
        progress_bar.inc(1);
    }

    progress_bar.finish();
    Ok((batch, last_image))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_segmentation() -> Segmentation {
        Segmentation {
            mask: Array2::zeros((4, 4)),
            flow: Array3::zeros((2, 4, 4)),
            style: Array1::zeros(8),
        }
    }

    #[test]
    fn push_keeps_sequences_aligned() {
        let mut batch = SegmentationBatch::with_capacity(2);
        batch.push("pic1.jpg".to_string(), dummy_segmentation());
        batch.push("pic2.jpg".to_string(), dummy_segmentation());

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.filenames.len(), batch.masks.len());
        assert_eq!(batch.masks.len(), batch.flows.len());
        assert_eq!(batch.flows.len(), batch.styles.len());
        assert_eq!(batch.filenames, ["pic1.jpg", "pic2.jpg"]);
    }

    #[test]
    fn empty_batch_reports_empty() {
        let batch = SegmentationBatch::default();
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
    }
}
