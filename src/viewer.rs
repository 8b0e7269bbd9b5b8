use std::path::PathBuf;
use std::process::Command;
use std::{env, fs, process};

use image::{ImageFormat, RgbImage};

use crate::errors::{CellSegError, Result};

/// Blocking composite display. `view` must not return until the user has
/// dismissed the image; the pipeline shows composites strictly one at a
/// time.
pub trait CompositeViewer {
    fn view(&self, composite: &RgbImage, title: &str) -> Result<()>;
}

/// Displays composites through the platform image viewer.
///
/// Each composite is written to a per-process scratch directory under the
/// OS temp dir and handed to the viewer command (`open` on macOS,
/// `xdg-open` elsewhere, or whatever `--viewer` names); the call blocks on
/// the spawned process.
pub struct SystemViewer {
    command: String,
    scratch_dir: PathBuf,
}

impl SystemViewer {
    pub fn new(command: Option<String>) -> Self {
        Self {
            command: command.unwrap_or_else(|| default_viewer_command().to_string()),
            scratch_dir: env::temp_dir().join(format!("cellseg-view-{}", process::id())),
        }
    }
}

fn default_viewer_command() -> &'static str {
    if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    }
}

impl CompositeViewer for SystemViewer {
    fn view(&self, composite: &RgbImage, title: &str) -> Result<()> {
        fs::create_dir_all(&self.scratch_dir).map_err(|e| CellSegError::FileSystem {
            path: self.scratch_dir.clone(),
            operation: "scratch directory creation".to_string(),
            source: e,
        })?;

        let path = self.scratch_dir.join(format!("{title}.png"));
        composite
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| CellSegError::ImageProcessing {
                path: path.display().to_string(),
                operation: "composite save".to_string(),
                source: Box::new(e),
            })?;

        let status = Command::new(&self.command)
            .arg(&path)
            .status()
            .map_err(|e| CellSegError::Viewer {
                command: self.command.clone(),
                source: e,
            })?;
        if !status.success() {
            return Err(CellSegError::Viewer {
                command: self.command.clone(),
                source: std::io::Error::other(format!("viewer exited with {status}")),
            });
        }
        Ok(())
    }
}
