//! Discovery of input image files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Camera RAW file extensions.
pub const RAW_EXTENSIONS: &[&str] = &[
    "raf", "cr2", "cr3", "nef", "arw", "dng", "orf", "rw2", "pef",
];

/// Raster formats decodable without a RAW pipeline.
pub const RASTER_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "bmp", "webp"];

/// Lower-cased extension of `path`, empty when there is none.
pub fn extension_lowercase(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase()
}

pub fn is_raw_file(path: &Path) -> bool {
    RAW_EXTENSIONS.contains(&extension_lowercase(path).as_str())
}

pub fn is_image_file(path: &Path) -> bool {
    let ext = extension_lowercase(path);
    RAW_EXTENSIONS.contains(&ext.as_str()) || RASTER_EXTENSIONS.contains(&ext.as_str())
}

/// Files in `dir` whose extension matches one of `extensions`, case-insensitively,
/// sorted by path so frame order is stable.
pub fn files_with_extensions(dir: &Path, extensions: &[&str]) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && extensions.contains(&extension_lowercase(&path).as_str()) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// All RAW and raster image files in `dir`.
pub fn image_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let extensions: Vec<&str> = RAW_EXTENSIONS
        .iter()
        .chain(RASTER_EXTENSIONS.iter())
        .copied()
        .collect();
    files_with_extensions(dir, &extensions)
}
