use image::DynamicImage;
use ndarray::prelude::*;

use crate::config::Config;
use crate::errors::Result;

/// Per-image parameters handed to the model on every invocation.
///
/// Defaults carry the pipeline's stock configuration: grayscale fed to both
/// model channels, flow threshold 0.4, flat 2-D frames, auto-estimated
/// diameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalOptions {
    /// Expected cell diameter in pixels; 0 requests auto-estimation.
    pub diameter: f32,
    /// Channel selectors: 0 = grayscale luma, 1..=3 = R/G/B.
    pub channels: [u8; 2],
    /// Flow error threshold above which candidate masks are rejected.
    pub flow_threshold: f32,
    /// Volumetric evaluation of image stacks.
    pub do_3d: bool,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            diameter: 0.0,
            channels: [0, 0],
            flow_threshold: 0.4,
            do_3d: false,
        }
    }
}

impl EvalOptions {
    pub fn from_config(config: &Config) -> Self {
        let channels = match config.channels.as_slice() {
            [first, second] => [*first, *second],
            [first] => [*first, *first],
            _ => [0, 0],
        };
        Self {
            diameter: config.diameter,
            channels,
            flow_threshold: config.flow_threshold,
            do_3d: config.do_3d,
        }
    }
}

/// Output of one model evaluation.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Per-pixel region labels; 0 is background.
    pub mask: Array2<u32>,
    /// Predicted flow field, shape `(2, height, width)` (y and x components).
    pub flow: Array3<f32>,
    /// Style embedding vector for the image.
    pub style: Array1<f32>,
}

/// Abstraction over the pretrained segmentation model so the pipeline can be
/// exercised against mocks without an ONNX runtime.
pub trait CellSegmentationModel: Send + Sync {
    /// Run inference on a single decoded image.
    fn evaluate(&self, image: &DynamicImage, options: &EvalOptions) -> Result<Segmentation>;
}

impl<M: CellSegmentationModel> CellSegmentationModel for &M {
    fn evaluate(&self, image: &DynamicImage, options: &EvalOptions) -> Result<Segmentation> {
        (**self).evaluate(image, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_match_stock_parameters() {
        let options = EvalOptions::default();
        assert_eq!(options.diameter, 0.0);
        assert_eq!(options.channels, [0, 0]);
        assert_eq!(options.flow_threshold, 0.4);
        assert!(!options.do_3d);
    }
}
