use std::io;

use anyhow::Result;
use clap::Parser;

use cellseg_rs::{Config, RunOutcome, SegmentationPipeline, SystemViewer};

fn main() -> Result<()> {
    let config = Config::parse();
    let viewer = SystemViewer::new(config.viewer.clone());

    let pipeline = SegmentationPipeline::with_onnx_model(config)?;

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();

    match pipeline.run(&mut input, &mut output, &viewer)? {
        RunOutcome::Completed { processed } => {
            println!("Number of segmented images: {processed}");
            Ok(())
        }
        RunOutcome::Aborted => {
            eprintln!("Segmentation aborted.");
            std::process::exit(1);
        }
    }
}
