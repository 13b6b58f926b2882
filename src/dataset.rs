//! Caption files next to images.
//!
//! A caption lives in a UTF-8 `.txt` file with the image's stem. A missing or
//! empty caption file means the image is unlabeled.

use std::{
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

use crate::error::Result;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Folder, inside the image directory, that removed images are moved into.
pub const DELETED_DIR: &str = "deleted";

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map_or(false, |ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// Images directly inside `dir`, sorted by file name.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() && is_image(entry.path()) {
            images.push(entry.into_path());
        }
    }
    Ok(images)
}

pub fn caption_path(image: &Path) -> PathBuf {
    image.with_extension("txt")
}

/// Reads the trimmed caption of `image`, `None` when there is no caption file.
pub fn read_caption(image: &Path) -> Result<Option<String>> {
    let path = caption_path(image);
    if !path.exists() {
        return Ok(None);
    }
    Ok(Some(fs::read_to_string(path)?.trim().to_string()))
}

/// Writes the trimmed caption; an empty caption removes the caption file.
pub fn write_caption(image: &Path, caption: &str) -> Result<()> {
    let path = caption_path(image);
    let caption = caption.trim();
    if caption.is_empty() {
        if path.exists() {
            fs::remove_file(path)?;
        }
    } else {
        fs::write(path, caption)?;
    }
    Ok(())
}

pub fn is_labeled(image: &Path) -> bool {
    fs::metadata(caption_path(image)).map_or(false, |m| m.len() > 0)
}

/// Index of the first unlabeled image after position `after`.
pub fn next_unlabeled(images: &[PathBuf], after: Option<usize>) -> Option<usize> {
    let start = after.map_or(0, |i| i + 1);
    (start..images.len()).find(|&i| !is_labeled(&images[i]))
}

/// Moves `image` and its caption file into the `deleted` folder next to it.
///
/// Returns the new image path.
pub fn move_to_deleted(image: &Path) -> Result<PathBuf> {
    let parent = image.parent().unwrap_or_else(|| Path::new("."));
    let deleted = parent.join(DELETED_DIR);
    fs::create_dir_all(&deleted)?;

    let file_name = image
        .file_name()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file path"))?;
    let target = deleted.join(file_name);
    fs::rename(image, &target)?;

    let caption = caption_path(image);
    if caption.exists() {
        fs::rename(&caption, caption_path(&target))?;
    }
    tracing::info!("Moved {} to {}", image.display(), deleted.display());
    Ok(target)
}
