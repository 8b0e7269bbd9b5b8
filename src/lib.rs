pub mod composite;
pub mod config;
pub mod discovery;
pub mod errors;
pub mod gate;
pub mod model;
pub mod runner;
pub mod sink;
pub mod traits;
pub mod viewer;

pub mod mocks;

use std::io::{BufRead, Write};

use crate::gate::Decision;

pub use config::Config;
pub use errors::{CellSegError, Result};
pub use model::CellposeModel;
pub use runner::SegmentationBatch;
pub use traits::{CellSegmentationModel, EvalOptions, Segmentation};
pub use viewer::{CompositeViewer, SystemViewer};

/// How a run ended. Refusal at the confirmation gate is a normal, expected
/// outcome; the binary maps it to a non-zero exit without treating it as a
/// program error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { processed: usize },
    Aborted,
}

/// Batch segmentation pipeline: discovery, confirmation gate, sequential
/// model evaluation, then the save-or-display decision.
///
/// Generic over the model so tests substitute [`mocks::MockCellModel`];
/// the binary uses [`SegmentationPipeline::with_onnx_model`].
pub struct SegmentationPipeline<M: CellSegmentationModel> {
    model: M,
    config: Config,
}

impl<M: CellSegmentationModel> SegmentationPipeline<M> {
    /// Build a pipeline over an already-constructed model. The image
    /// directory and model path are validated here, before any work.
    pub fn new(model: M, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { model, config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the whole pipeline against the given console and viewer.
    ///
    /// Strictly sequential: one image at a time, one composite at a time.
    /// The only suspension points are the two prompts and the blocking
    /// viewer.
    pub fn run<R: BufRead, W: Write, V: CompositeViewer>(
        &self,
        input: &mut R,
        output: &mut W,
        viewer: &V,
    ) -> Result<RunOutcome> {
        let files = discovery::discover(&self.config.image_dir)?;
        if files.is_empty() {
            writeln!(output, "No image files to process")?;
            return Ok(RunOutcome::Completed { processed: 0 });
        }

        if gate::confirm(files.len(), self.config.confirm_threshold, input, output)?
            == Decision::Abort
        {
            return Ok(RunOutcome::Aborted);
        }

        let options = EvalOptions::from_config(&self.config);
        let (batch, last_image) =
            runner::run(&files, &self.config.image_dir, &self.model, &options)?;
        let processed = batch.len();

        if let Some(context) = last_image {
            sink::resolve(
                &batch,
                &context,
                &self.config.image_dir,
                input,
                output,
                viewer,
            )?;
        }

        Ok(RunOutcome::Completed { processed })
    }
}

impl SegmentationPipeline<CellposeModel> {
    /// Construct the production pipeline: validate the configuration, then
    /// load the ONNX session once for the whole run.
    pub fn with_onnx_model(config: Config) -> Result<Self> {
        config.validate()?;
        let model = CellposeModel::new(&config.model_path, config.device_id)?;
        Ok(Self { model, config })
    }
}
