use std::sync::atomic::{AtomicUsize, Ordering};

use image::{DynamicImage, RgbImage};
use ndarray::prelude::*;
use parking_lot::Mutex;

use crate::errors::Result;
use crate::traits::{CellSegmentationModel, EvalOptions, Segmentation};
use crate::viewer::CompositeViewer;

/// Deterministic stand-in for the ONNX model.
///
/// Every evaluation returns a fixed-size result with a single square
/// region labeled 1 in the middle of the mask, a unit flow inside that
/// region, and a zero style vector. Invocations are counted so tests can
/// assert the model was (or was not) called.
#[derive(Debug)]
pub struct MockCellModel {
    mask_size: (usize, usize),
    calls: AtomicUsize,
}

impl MockCellModel {
    pub const fn new(mask_size: (usize, usize)) -> Self {
        Self {
            mask_size,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CellSegmentationModel for MockCellModel {
    fn evaluate(&self, _image: &DynamicImage, _options: &EvalOptions) -> Result<Segmentation> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let (height, width) = self.mask_size;
        let mask = Array2::from_shape_fn((height, width), |(y, x)| {
            let inside = y >= height / 4 && y < 3 * height / 4 && x >= width / 4 && x < 3 * width / 4;
            u32::from(inside)
        });
        let mut flow = Array3::<f32>::zeros((2, height, width));
        flow.index_axis_mut(Axis(0), 0)
            .zip_mut_with(&mask.mapv(|v| v as f32), |f, &m| *f = m);
        let style = Array1::<f32>::zeros(64);

        Ok(Segmentation { mask, flow, style })
    }
}

pub const fn create_mock_model() -> MockCellModel {
    MockCellModel::new((16, 16))
}

/// Viewer double that records the title of every composite it is asked to
/// show, in order.
#[derive(Debug, Default)]
pub struct CollectingViewer {
    titles: Mutex<Vec<String>>,
}

impl CollectingViewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn titles(&self) -> Vec<String> {
        self.titles.lock().clone()
    }
}

impl CompositeViewer for CollectingViewer {
    fn view(&self, _composite: &RgbImage, title: &str) -> Result<()> {
        self.titles.lock().push(title.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn mock_model_counts_invocations() {
        let mock = create_mock_model();
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([0, 0, 0])));

        assert_eq!(mock.call_count(), 0);
        mock.evaluate(&img, &EvalOptions::default()).unwrap();
        mock.evaluate(&img, &EvalOptions::default()).unwrap();
        assert_eq!(mock.call_count(), 2);
    }

    #[test]
    fn mock_model_labels_a_center_region() {
        let mock = create_mock_model();
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([0, 0, 0])));

        let segmentation = mock.evaluate(&img, &EvalOptions::default()).unwrap();
        assert_eq!(segmentation.mask.dim(), (16, 16));
        assert_eq!(segmentation.mask[[8, 8]], 1);
        assert_eq!(segmentation.mask[[0, 0]], 0);
        assert_eq!(segmentation.flow.shape(), &[2, 16, 16]);
        assert_eq!(segmentation.style.len(), 64);
    }

    #[test]
    fn collecting_viewer_records_in_order() {
        let viewer = CollectingViewer::new();
        let composite = RgbImage::new(4, 4);

        viewer.view(&composite, "pic1.jpg").unwrap();
        viewer.view(&composite, "pic2.jpg").unwrap();
        assert_eq!(viewer.titles(), ["pic1.jpg", "pic2.jpg"]);
    }
}
