//! The outcome of a successful run and helpers around writing it.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::codec::{CodecError, ImageCodec};
use crate::frame::{ImageDimensions, RgbBuffer};
use crate::stacking::CombineMethod;

/// Counts describing how a composite was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSummary {
    pub frames_requested: usize,
    pub frames_loaded: usize,
    /// Frames in the composite, reference included.
    pub frames_stacked: usize,
    /// Loaded frames that failed detection or alignment.
    pub frames_dropped: usize,
    pub reference_stars: usize,
    pub method: CombineMethod,
    pub dimensions: ImageDimensions,
}

/// The enhanced composite, in the reference frame's dimensions.
#[derive(Debug, Clone)]
pub struct StackResult {
    pub pixels: RgbBuffer,
    pub summary: StackSummary,
}

impl StackResult {
    pub fn pixels(&self) -> &RgbBuffer {
        &self.pixels
    }

    pub fn into_pixels(self) -> RgbBuffer {
        self.pixels
    }

    pub fn dimensions(&self) -> ImageDimensions {
        ImageDimensions::new(self.pixels.width(), self.pixels.height())
    }

    /// Encode the composite to `path`; format follows the extension.
    pub fn save<C: ImageCodec + ?Sized>(
        &self,
        codec: &C,
        path: impl AsRef<Path>,
        quality: u8,
    ) -> Result<(), CodecError> {
        let path = path.as_ref();
        codec.encode(&self.pixels, path, quality)?;
        tracing::info!(
            path = %path.display(),
            quality,
            dimensions = %self.dimensions(),
            "Saved stacked image"
        );
        Ok(())
    }
}

/// `<directory of first_input>/stacked_<unix_seconds>.jpg`.
pub fn default_output_path(first_input: &Path, unix_seconds: u64) -> PathBuf {
    let dir = first_input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    dir.join(format!("stacked_{unix_seconds}.jpg"))
}

/// Rough wall-clock estimate: two seconds per frame per 1920x1080 pixels.
pub fn estimate_processing_time(frame_count: usize, width: usize, height: usize) -> Duration {
    const REFERENCE_PIXELS: f64 = 1920.0 * 1080.0;
    const SECONDS_PER_FRAME: f64 = 2.0;

    let scale = (width * height) as f64 / REFERENCE_PIXELS;
    Duration::from_secs_f64(frame_count as f64 * SECONDS_PER_FRAME * scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("/photos/night/IMG_001.jpg"), 1_700_000_000),
            PathBuf::from("/photos/night/stacked_1700000000.jpg")
        );
        assert_eq!(
            default_output_path(Path::new("IMG_001.jpg"), 5),
            PathBuf::from("./stacked_5.jpg")
        );
    }

    #[test]
    fn test_estimate_processing_time() {
        assert_eq!(estimate_processing_time(10, 1920, 1080), Duration::from_secs(20));
        assert_eq!(estimate_processing_time(4, 960, 540), Duration::from_secs(2));
        assert_eq!(estimate_processing_time(0, 1920, 1080), Duration::ZERO);
    }
}
