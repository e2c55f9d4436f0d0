//! Decoded frames and the ordered store that holds them during a run.

use std::path::{Path, PathBuf};

use common::Buffer2;
use common::buffer2::BufferSizeError;
use rayon::prelude::*;

/// One 8-bit RGB sample.
pub type Rgb8 = [u8; 3];

/// Row-major RGB pixel buffer.
pub type RgbBuffer = Buffer2<Rgb8>;

/// Image width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ImageDimensions {
    pub width: usize,
    pub height: usize,
}

impl ImageDimensions {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for ImageDimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A decoded input photograph.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    path: PathBuf,
    pixels: RgbBuffer,
}

impl Frame {
    pub fn new(path: impl Into<PathBuf>, pixels: RgbBuffer) -> Self {
        Self {
            path: path.into(),
            pixels,
        }
    }

    /// Build a frame from packed `RGBRGB...` bytes.
    pub fn from_packed_rgb(
        path: impl Into<PathBuf>,
        width: usize,
        height: usize,
        data: &[u8],
    ) -> Result<Self, BufferSizeError> {
        if data.len() % 3 != 0 {
            return Err(BufferSizeError {
                width,
                height,
                len: data.len() / 3,
            });
        }
        let pixels: Vec<Rgb8> = data
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        Ok(Self::new(path, Buffer2::try_new(width, height, pixels)?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn width(&self) -> usize {
        self.pixels.width()
    }

    pub fn height(&self) -> usize {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> ImageDimensions {
        ImageDimensions::new(self.width(), self.height())
    }

    pub fn pixels(&self) -> &RgbBuffer {
        &self.pixels
    }

    pub fn into_pixels(self) -> RgbBuffer {
        self.pixels
    }

    pub fn luminance(&self) -> Buffer2<f32> {
        luminance(&self.pixels)
    }
}

/// ITU-R BT.601 luma of an RGB sample, in 0..=255.
#[inline]
pub fn luma(p: Rgb8) -> f32 {
    0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32
}

/// Single-channel luminance of an RGB buffer.
pub fn luminance(pixels: &RgbBuffer) -> Buffer2<f32> {
    let out: Vec<f32> = pixels.pixels().par_iter().map(|&p| luma(p)).collect();
    Buffer2::new(pixels.width(), pixels.height(), out)
}

/// Ordered frames of one run. Index 0 is the reference frame.
#[derive(Debug, Default)]
pub struct FrameStore {
    frames: Vec<Frame>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame, returning its index.
    pub fn push(&mut self, frame: Frame) -> usize {
        self.frames.push(frame);
        self.frames.len() - 1
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The first loaded frame, which defines the output coordinate space.
    pub fn reference(&self) -> Option<&Frame> {
        self.frames.first()
    }

    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    /// Frames after the reference, in load order.
    pub fn targets(&self) -> impl Iterator<Item = &Frame> {
        self.frames.iter().skip(1)
    }

    pub fn reference_dimensions(&self) -> Option<ImageDimensions> {
        self.reference().map(Frame::dimensions)
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }
}
