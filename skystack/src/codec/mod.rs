//! Image codec boundary: decoding input files into [`Frame`]s and writing
//! the composite back to disk.

mod error;
mod raw;

pub use error::CodecError;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use common::file_utils::{extension_lowercase, is_raw_file};
use image::codecs::jpeg::JpegEncoder;

use crate::frame::{Frame, ImageDimensions, RgbBuffer};

/// JPEG quality used when the caller has no preference.
pub const DEFAULT_QUALITY: u8 = 95;

/// Decodes input files into frames and encodes buffers to files.
pub trait ImageCodec: Send + Sync {
    fn decode(&self, path: &Path) -> Result<Frame, CodecError>;

    /// Encode `pixels` to `path`. `quality` (1..=100) applies to lossy formats.
    fn encode(&self, pixels: &RgbBuffer, path: &Path, quality: u8) -> Result<(), CodecError>;

    /// Dimensions of the image at `path`. Decodes the whole file unless the
    /// codec can read them from the header.
    fn dimensions(&self, path: &Path) -> Result<ImageDimensions, CodecError> {
        self.decode(path).map(|frame| frame.dimensions())
    }
}

/// Codec backed by the filesystem: raster formats through `image`, camera
/// RAW formats through `rawloader`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCodec;

impl ImageCodec for FileCodec {
    fn decode(&self, path: &Path) -> Result<Frame, CodecError> {
        let frame = if is_raw_file(path) {
            raw::decode_raw(path)?
        } else {
            let rgb = image::open(path)
                .map_err(|source| CodecError::Image {
                    path: path.to_path_buf(),
                    source,
                })?
                .to_rgb8();
            let (width, height) = rgb.dimensions();
            Frame::from_packed_rgb(path, width as usize, height as usize, rgb.as_raw()).map_err(
                |e| CodecError::Raw {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                },
            )?
        };

        if frame.dimensions().is_empty() {
            return Err(CodecError::EmptyImage {
                path: path.to_path_buf(),
            });
        }

        tracing::debug!(
            path = %path.display(),
            dimensions = %frame.dimensions(),
            "Decoded frame"
        );
        Ok(frame)
    }

    fn encode(&self, pixels: &RgbBuffer, path: &Path, quality: u8) -> Result<(), CodecError> {
        if !(1..=100).contains(&quality) {
            return Err(CodecError::InvalidQuality { quality });
        }
        if pixels.is_empty() {
            return Err(CodecError::EmptyImage {
                path: path.to_path_buf(),
            });
        }

        let extension = extension_lowercase(path);
        let packed: Vec<u8> = pixels.iter().flatten().copied().collect();
        let image = image::RgbImage::from_raw(pixels.width() as u32, pixels.height() as u32, packed)
            .ok_or_else(|| CodecError::EmptyImage {
                path: path.to_path_buf(),
            })?;

        let image_err = |source| CodecError::Image {
            path: path.to_path_buf(),
            source,
        };

        match extension.as_str() {
            "jpg" | "jpeg" => {
                let file = File::create(path).map_err(|source| CodecError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                let encoder = JpegEncoder::new_with_quality(BufWriter::new(file), quality);
                image.write_with_encoder(encoder).map_err(image_err)?;
            }
            "png" | "tif" | "tiff" | "bmp" => {
                image.save(path).map_err(image_err)?;
            }
            _ => return Err(CodecError::UnsupportedFormat { extension }),
        }

        tracing::info!(path = %path.display(), quality, "Wrote image");
        Ok(())
    }

    fn dimensions(&self, path: &Path) -> Result<ImageDimensions, CodecError> {
        if is_raw_file(path) {
            return self.decode(path).map(|frame| frame.dimensions());
        }
        let (width, height) =
            image::image_dimensions(path).map_err(|source| CodecError::Image {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(ImageDimensions::new(width as usize, height as usize))
    }
}
