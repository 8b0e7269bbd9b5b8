use std::path::PathBuf;
use thiserror::Error;

/// Structured error types for the segmentation pipeline.
///
/// Each variant captures context specific to its error domain (filesystem,
/// image decoding, model inference, etc.) so failures surface with the path
/// and operation that produced them instead of a bare message. No variant is
/// retried; every one of them is fatal for the run.
#[derive(Error, Debug)]
pub enum CellSegError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Validation error: {field} {reason}")]
    Validation { field: String, reason: String },

    #[error("Filesystem error: {operation} failed for {path:?}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot derive a numeric sort key for {filename:?}: {reason}")]
    SortKey { filename: String, reason: String },

    #[error("Image processing error: {operation} failed (file: {path})")]
    ImageProcessing {
        path: String,
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Model error: {operation} failed")]
    Model {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Viewer error: `{command}` failed")]
    Viewer {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CellSegError>;

/// Convert anyhow errors to configuration errors at crate boundaries.
impl From<anyhow::Error> for CellSegError {
    fn from(err: anyhow::Error) -> Self {
        CellSegError::Configuration {
            message: err.to_string(),
        }
    }
}

/// Fallback conversion for I/O errors that occur without path context.
/// Code that has context constructs `CellSegError::FileSystem` directly.
impl From<std::io::Error> for CellSegError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("unknown"),
            operation: "unknown".to_string(),
            source: err,
        }
    }
}

impl From<image::ImageError> for CellSegError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageProcessing {
            path: "unknown".to_string(),
            operation: "image processing".to_string(),
            source: Box::new(err),
        }
    }
}

impl From<ort::Error> for CellSegError {
    fn from(err: ort::Error) -> Self {
        Self::Model {
            operation: "ort operation".to_string(),
            source: Box::new(err),
        }
    }
}

/// Shape errors occur during tensor extraction, which is part of model
/// inference, so they land in the model error domain.
impl From<ndarray::ShapeError> for CellSegError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::Model {
            operation: "tensor shape conversion".to_string(),
            source: Box::new(err),
        }
    }
}
