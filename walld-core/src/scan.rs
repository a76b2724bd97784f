use std::path::{Path, PathBuf};

use image::ImageFormat;
use walkdir::WalkDir;

use crate::error::{Result, WalldError};

/// Whether `path` names an image file, judged by its extension.
pub fn is_image(path: &Path) -> bool {
    ImageFormat::from_path(path).is_ok()
}

/// Collect the image files under `root` as sorted absolute paths.
/// Only the top level is read unless `recursive` is set. Paths that are
/// not valid UTF-8 are skipped: they cannot be passed through the JSON
/// protocol or substituted into a command template unchanged.
pub fn scan_directory(root: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let root = std::fs::canonicalize(root)
        .map_err(|e| WalldError::Scan(format!("cannot open {}: {e}", root.display())))?;
    if !root.is_dir() {
        return Err(WalldError::Scan(format!(
            "not a directory: {}",
            root.display()
        )));
    }

    let mut walker = WalkDir::new(&root).min_depth(1).follow_links(true);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!("skipping unreadable entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_image(entry.path()) {
            continue;
        }
        if entry.path().to_str().is_none() {
            tracing::warn!(path = %entry.path().display(), "skipping non UTF-8 path");
            continue;
        }
        files.push(entry.into_path());
    }
    files.sort();
    Ok(files)
}
