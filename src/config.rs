use clap::Parser;
use std::path::PathBuf;

use crate::errors::{CellSegError, Result};

#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Directory containing the microscope images to segment
    pub image_dir: PathBuf,

    /// Pretrained Cellpose-style ONNX model file
    #[arg(short, long)]
    pub model_path: PathBuf,

    /// Expected cell diameter in pixels; 0 lets the model estimate it
    #[arg(short, long, default_value_t = 0.0)]
    pub diameter: f32,

    /// Flow error threshold above which candidate masks are rejected
    #[arg(long, default_value_t = 0.4)]
    pub flow_threshold: f32,

    /// Channel pair fed to the model: 0 = grayscale, 1-3 = R/G/B
    #[arg(long, num_args = 2, default_values_t = [0, 0],
          value_parser = clap::value_parser!(u8).range(0..=3))]
    pub channels: Vec<u8>,

    /// Treat inputs as 3-D volumetric stacks
    #[arg(long)]
    pub do_3d: bool,

    /// Ask for confirmation when more than this many images are queued
    #[arg(long, default_value_t = 1)]
    pub confirm_threshold: usize,

    /// Execution provider device id
    #[arg(long, default_value_t = 0)]
    pub device_id: i32,

    /// Program used to display composites; defaults to the platform opener
    #[arg(long)]
    pub viewer: Option<String>,
}

impl Config {
    /// Eager path validation. Both locations are checked up front so a bad
    /// invocation fails before any model loading or discovery happens.
    pub fn validate(&self) -> Result<()> {
        if !self.image_dir.is_dir() {
            return Err(CellSegError::Validation {
                field: "image_dir".to_string(),
                reason: format!(
                    "{} does not exist or is not a directory",
                    self.image_dir.display()
                ),
            });
        }
        if !self.model_path.is_file() {
            return Err(CellSegError::Validation {
                field: "model_path".to_string(),
                reason: format!(
                    "{} does not exist or is not a file",
                    self.model_path.display()
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config_with(image_dir: PathBuf, model_path: PathBuf) -> Config {
        Config {
            image_dir,
            model_path,
            diameter: 0.0,
            flow_threshold: 0.4,
            channels: vec![0, 0],
            do_3d: false,
            confirm_threshold: 1,
            device_id: 0,
            viewer: None,
        }
    }

    #[test]
    fn validate_accepts_existing_paths() {
        let temp_dir = TempDir::new().unwrap();
        let model_path = temp_dir.path().join("model.onnx");
        fs::write(&model_path, b"dummy_model").unwrap();

        let config = config_with(temp_dir.path().to_path_buf(), model_path);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_image_dir() {
        let temp_dir = TempDir::new().unwrap();
        let model_path = temp_dir.path().join("model.onnx");
        fs::write(&model_path, b"dummy_model").unwrap();

        let config = config_with(temp_dir.path().join("missing"), model_path);
        assert!(matches!(
            config.validate(),
            Err(CellSegError::Validation { field, .. }) if field == "image_dir"
        ));
    }

    #[test]
    fn validate_rejects_model_path_that_is_a_directory() {
        let temp_dir = TempDir::new().unwrap();

        let config = config_with(
            temp_dir.path().to_path_buf(),
            temp_dir.path().to_path_buf(),
        );
        assert!(matches!(
            config.validate(),
            Err(CellSegError::Validation { field, .. }) if field == "model_path"
        ));
    }
}
