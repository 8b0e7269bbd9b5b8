use std::path::Path;

use image::DynamicImage;
use ndarray::{azip, prelude::*};
use nshare::AsNdarray3;
use ort::value::TensorRef;
use ort::{
    execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider},
    session::{builder::SessionBuilder, Session},
};
use parking_lot::Mutex;

use crate::errors::{CellSegError, Result};
use crate::traits::{CellSegmentationModel, EvalOptions, Segmentation};

const WARMUP_SIZE: usize = 64;

/// Pretrained Cellpose-style model behind an ONNX Runtime session.
///
/// The exported graph takes a 2-channel image tensor `img` of shape
/// `(1, 2, height, width)` plus scalar `diameter` and `flow_threshold`
/// inputs, and emits `masks` (int64 labels), `flows` (y/x components) and
/// `styles` (embedding vector). The session is created once per run and
/// reused for every image.
pub struct CellposeModel {
    session: Mutex<Session>,
}

impl CellposeModel {
    pub fn new(model_path: &Path, device_id: i32) -> Result<Self> {
        let mut session = SessionBuilder::new()
            .map_err(|e| CellSegError::Model {
                operation: "session builder init".to_string(),
                source: Box::new(e),
            })?
            .with_execution_providers([
                TensorRTExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
                CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build(),
            ])
            .map_err(|e| CellSegError::Model {
                operation: "execution provider setup".to_string(),
                source: Box::new(e),
            })?
            .with_memory_pattern(true)
            .map_err(|e| CellSegError::Model {
                operation: "memory pattern setup".to_string(),
                source: Box::new(e),
            })?
            .commit_from_file(model_path)
            .map_err(|e| CellSegError::Model {
                operation: format!("model load: {}", model_path.display()),
                source: Box::new(e),
            })?;

        // initialize model
        let img = Array4::<f32>::zeros((1, 2, WARMUP_SIZE, WARMUP_SIZE));
        let diameter = arr1(&[0.0_f32]);
        let flow_threshold = arr1(&[0.4_f32]);
        session
            .run(ort::inputs![
                "img" => TensorRef::from_array_view(&img).map_err(|e| CellSegError::Model {
                    operation: "warm-up tensor creation".to_string(),
                    source: Box::new(e),
                })?,
                "diameter" => TensorRef::from_array_view(&diameter)?,
                "flow_threshold" => TensorRef::from_array_view(&flow_threshold)?,
            ])
            .map_err(|e| CellSegError::Model {
                operation: "warm-up run".to_string(),
                source: Box::new(e),
            })?;

        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl CellSegmentationModel for CellposeModel {
    fn evaluate(&self, image: &DynamicImage, options: &EvalOptions) -> Result<Segmentation> {
        if options.do_3d {
            return Err(CellSegError::Model {
                operation: "3-D evaluation".to_string(),
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "the exported graph handles flat 2-D frames only",
                )),
            });
        }

        let tensor = preprocess(image, options.channels);
        let diameter = arr1(&[options.diameter]);
        let flow_threshold = arr1(&[options.flow_threshold]);

        let mut session = self.session.lock();
        let outputs = session.run(ort::inputs![
            "img" => TensorRef::from_array_view(&tensor)?,
            "diameter" => TensorRef::from_array_view(&diameter)?,
            "flow_threshold" => TensorRef::from_array_view(&flow_threshold)?,
        ])?;

        let mask = outputs["masks"]
            .try_extract_array::<i64>()?
            .into_dimensionality::<Ix3>()?
            .index_axis(Axis(0), 0)
            .mapv(|label| label as u32);
        let flow = outputs["flows"]
            .try_extract_array::<f32>()?
            .into_dimensionality::<Ix4>()?
            .index_axis(Axis(0), 0)
            .to_owned();
        let style = outputs["styles"]
            .try_extract_array::<f32>()?
            .into_dimensionality::<Ix2>()?
            .index_axis(Axis(0), 0)
            .to_owned();

        Ok(Segmentation { mask, flow, style })
    }
}

/// Build the model input tensor from a decoded image.
///
/// Each of the two slots is filled from its channel selector (0 = grayscale
/// luma, 1..=3 = R/G/B) and normalized to its 1st..99th percentile range,
/// shape `(1, 2, height, width)`. The stock `[0, 0]` configuration feeds
/// the grayscale plane to both slots.
pub fn preprocess(image: &DynamicImage, channels: [u8; 2]) -> Array4<f32> {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    let planes = rgb.as_ndarray3();

    let mut tensor = Array4::<f32>::zeros((1, 2, height as usize, width as usize));
    for (slot, &selector) in channels.iter().enumerate() {
        let plane = normalize_percentile(channel_plane(&planes, selector));
        tensor.slice_mut(s![0, slot, .., ..]).assign(&plane);
    }
    tensor
}

fn channel_plane(planes: &ArrayView3<u8>, selector: u8) -> Array2<f32> {
    match selector {
        1..=3 => planes
            .index_axis(Axis(0), usize::from(selector) - 1)
            .mapv(|v| f32::from(v) / 255.0),
        _ => {
            // Rec. 601 luma
            let r = planes.index_axis(Axis(0), 0);
            let g = planes.index_axis(Axis(0), 1);
            let b = planes.index_axis(Axis(0), 2);
            let mut gray = Array2::<f32>::zeros(r.raw_dim());
            azip!((out in &mut gray, &r in &r, &g in &g, &b in &b) {
                *out = (0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b)) / 255.0;
            });
            gray
        }
    }
}

/// Rescale a plane so its 1st percentile maps to 0 and its 99th to 1,
/// clamped. A flat plane is returned unchanged.
fn normalize_percentile(plane: Array2<f32>) -> Array2<f32> {
    let mut values: Vec<f32> = plane.iter().copied().collect();
    if values.is_empty() {
        return plane;
    }
    values.sort_by(f32::total_cmp);
    let lo = values[(values.len() - 1) / 100];
    let hi = values[(values.len() - 1) * 99 / 100];
    if hi - lo <= f32::EPSILON {
        return plane;
    }
    plane.mapv(|v| ((v - lo) / (hi - lo)).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn preprocess_produces_two_channel_tensor() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(12, 8, Rgb([64, 128, 192])));
        let tensor = preprocess(&img, [0, 0]);
        assert_eq!(tensor.shape(), &[1, 2, 8, 12]);
        // both slots carry the same grayscale plane
        assert_eq!(
            tensor.index_axis(Axis(1), 0),
            tensor.index_axis(Axis(1), 1)
        );
    }

    #[test]
    fn channel_selector_picks_rgb_plane() {
        let mut img = RgbImage::from_pixel(4, 4, Rgb([255, 0, 0]));
        img.put_pixel(0, 0, Rgb([0, 255, 0]));
        let img = DynamicImage::ImageRgb8(img);

        let tensor = preprocess(&img, [1, 2]);
        // red plane: bright everywhere except the green pixel
        assert!(tensor[[0, 0, 1, 1]] > tensor[[0, 0, 0, 0]]);
        // green plane: bright only at the green pixel
        assert!(tensor[[0, 1, 0, 0]] > tensor[[0, 1, 1, 1]]);
    }

    #[test]
    fn normalization_spans_unit_interval() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(16, 16, |x, y| {
            let v = (x * 16 + y) as u8;
            Rgb([v, v, v])
        }));
        let tensor = preprocess(&img, [0, 0]);
        let max = tensor.iter().copied().fold(f32::MIN, f32::max);
        let min = tensor.iter().copied().fold(f32::MAX, f32::min);
        assert!(max <= 1.0 && max > 0.99);
        assert!(min >= 0.0 && min < 0.01);
    }

    #[test]
    fn flat_plane_survives_normalization() {
        let plane = Array2::<f32>::from_elem((4, 4), 0.5);
        let normalized = normalize_percentile(plane.clone());
        assert_eq!(normalized, plane);
    }
}
