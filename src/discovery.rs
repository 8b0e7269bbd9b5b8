use std::path::Path;

use walkdir::WalkDir;

use crate::errors::{CellSegError, Result};

/// Extensions admitted into a batch. Matching is a case-sensitive suffix
/// check, so `pic1.JPG` is not picked up.
pub const IMAGE_EXTENSIONS: [&str; 3] = [".jpg", ".png", ".tif"];

/// List the image files of `image_dir` in segmentation order.
///
/// Ordering is by the numeric key of each filename (see [`sort_key`]), with
/// the filename itself as tie-breaker, so the result is reproducible across
/// operating systems regardless of directory-listing order. Subdirectories
/// are not descended into; the batch contract is a flat directory.
pub fn discover(image_dir: &Path) -> Result<Vec<String>> {
    let mut keyed = Vec::new();

    for entry in WalkDir::new(image_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| CellSegError::FileSystem {
            path: image_dir.to_path_buf(),
            operation: "directory listing".to_string(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if IMAGE_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
            keyed.push((sort_key(name)?, name.to_owned()));
        }
    }

    keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    Ok(keyed.into_iter().map(|(_, name)| name).collect())
}

/// Numeric sort key of a filename: every ASCII digit in the name,
/// concatenated in order and parsed as an integer (`pic10.jpg` -> 10,
/// `well2_site03.tif` -> 203). A name without digits cannot be ordered and
/// fails the whole discovery.
pub fn sort_key(filename: &str) -> Result<u64> {
    let digits: String = filename.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(CellSegError::SortKey {
            filename: filename.to_string(),
            reason: "filename contains no digits".to_string(),
        });
    }
    digits.parse().map_err(|_| CellSegError::SortKey {
        filename: filename.to_string(),
        reason: format!("digit run `{digits}` does not fit in 64 bits"),
    })
}
