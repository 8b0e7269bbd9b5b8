use std::fs;
use std::io::{BufRead, Write};
use std::path::Path;

use image::{DynamicImage, ImageFormat};

use crate::composite;
use crate::errors::{CellSegError, Result};
use crate::gate::read_affirmative;
use crate::runner::SegmentationBatch;
use crate::viewer::CompositeViewer;

/// Subdirectory of the image directory that receives saved composites.
/// Created on first save and reused as-is afterwards.
pub const OUTPUT_DIR_NAME: &str = "segmented_images";

/// Resolve a finished batch: ask once whether to save or display, then emit
/// every composite in batch order.
///
/// `context` is the raw pixel buffer of the last processed image; it is the
/// backdrop for every composite regardless of which source image a result
/// belongs to (the preserved contract of [`crate::runner::run`]).
pub fn resolve<R: BufRead, W: Write, V: CompositeViewer>(
    batch: &SegmentationBatch,
    context: &DynamicImage,
    image_dir: &Path,
    input: &mut R,
    output: &mut W,
    viewer: &V,
) -> Result<()> {
    write!(
        output,
        "Do you want to save the segmented images? If you choose 'y', the images \
         will be saved into a folder called '{OUTPUT_DIR_NAME}' in your image \
         directory. Otherwise, they will be displayed here. Save images? (y/n): "
    )?;
    output.flush()?;

    if read_affirmative(input)? {
        save_composites(batch, context, image_dir, output)
    } else {
        display_composites(batch, context, viewer)
    }
}

/// Write `segmented_<i>.png` (1-based, no gaps) into the output
/// subdirectory, overwriting whatever a previous session left under the
/// same names.
fn save_composites<W: Write>(
    batch: &SegmentationBatch,
    context: &DynamicImage,
    image_dir: &Path,
    output: &mut W,
) -> Result<()> {
    let save_dir = image_dir.join(OUTPUT_DIR_NAME);
    fs::create_dir_all(&save_dir).map_err(|e| CellSegError::FileSystem {
        path: save_dir.clone(),
        operation: "output directory creation".to_string(),
        source: e,
    })?;

    for (index, filename) in batch.filenames.iter().enumerate() {
        let rendered = composite::render(context, &batch.masks[index], &batch.flows[index], filename);
        let save_path = save_dir.join(format!("segmented_{}.png", index + 1));
        rendered
            .save_with_format(&save_path, ImageFormat::Png)
            .map_err(|e| CellSegError::ImageProcessing {
                path: save_path.display().to_string(),
                operation: "composite save".to_string(),
                source: Box::new(e),
            })?;
        writeln!(output, "Segmented image saved in: {}", save_path.display())?;
    }
    Ok(())
}

/// Show each composite through the blocking viewer, one at a time, in
/// batch order.
fn display_composites<V: CompositeViewer>(
    batch: &SegmentationBatch,
    context: &DynamicImage,
    viewer: &V,
) -> Result<()> {
    for (index, filename) in batch.filenames.iter().enumerate() {
        let rendered = composite::render(context, &batch.masks[index], &batch.flows[index], filename);
        viewer.view(&rendered, filename)?;
    }
    Ok(())
}
