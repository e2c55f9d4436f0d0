//! Synthetic fixtures for skystack tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use common::Buffer2;
use glam::DVec2;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::codec::{CodecError, ImageCodec};
use crate::frame::{Frame, RgbBuffer};
use crate::registration::Transform;
use crate::star_detection::StarPoint;

/// Initialize tracing subscriber for tests.
/// Safe to call multiple times - will only initialize once.
/// Respects RUST_LOG env var, defaults to "info".
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Parameters of a synthetic star field.
#[derive(Debug, Clone)]
pub struct StarField {
    pub width: usize,
    pub height: usize,
    pub background: f32,
    pub amplitude: f32,
    pub sigma: f32,
    pub noise_sigma: f32,
    pub stars: Vec<DVec2>,
}

impl StarField {
    pub fn new(width: usize, height: usize, stars: Vec<DVec2>) -> Self {
        Self {
            width,
            height,
            background: 20.0,
            amplitude: 200.0,
            sigma: 1.2,
            noise_sigma: 0.0,
            stars,
        }
    }

    pub fn with_noise(mut self, noise_sigma: f32) -> Self {
        self.noise_sigma = noise_sigma;
        self
    }

    pub fn with_background(mut self, background: f32) -> Self {
        self.background = background;
        self
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Noise-free value of one channel at pixel (x, y).
    pub fn value_at(&self, x: usize, y: usize) -> f32 {
        let two_sigma_sq = 2.0 * self.sigma * self.sigma;
        let p = DVec2::new(x as f64, y as f64);
        let stars: f32 = self
            .stars
            .iter()
            .map(|s| {
                let d2 = p.distance_squared(*s) as f32;
                if d2 > 36.0 * self.sigma * self.sigma {
                    0.0
                } else {
                    self.amplitude * (-d2 / two_sigma_sq).exp()
                }
            })
            .sum();
        self.background + stars
    }

    /// Render as an RGB frame with independent per-channel Gaussian noise.
    pub fn render(&self, path: impl Into<PathBuf>, seed: u64) -> Frame {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let pixels = Buffer2::from_fn(self.width, self.height, |x, y| {
            let v = self.value_at(x, y);
            [0usize; 3].map(|_| quantize(v + self.noise_sigma * gaussian(&mut rng)))
        });
        Frame::new(path, pixels)
    }

    /// Noise-free luminance buffer.
    pub fn luminance(&self) -> Buffer2<f32> {
        Buffer2::from_fn(self.width, self.height, |x, y| self.value_at(x, y))
    }
}

/// Standard normal sample via Box-Muller.
pub fn gaussian(rng: &mut ChaCha8Rng) -> f32 {
    let u1: f64 = rng.random::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.random();
    ((-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()) as f32
}

fn quantize(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// `cols x rows` star positions starting at `origin` with the given spacing.
pub fn grid_stars(cols: usize, rows: usize, origin: DVec2, spacing: DVec2) -> Vec<DVec2> {
    (0..rows)
        .flat_map(|j| {
            (0..cols).map(move |i| origin + DVec2::new(i as f64 * spacing.x, j as f64 * spacing.y))
        })
        .collect()
}

/// Uniformly scattered positions kept `margin` pixels away from the border.
pub fn scattered_stars(count: usize, width: f64, height: f64, margin: f64, seed: u64) -> Vec<DVec2> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            DVec2::new(
                rng.random_range(margin..width - margin),
                rng.random_range(margin..height - margin),
            )
        })
        .collect()
}

pub fn star_points(positions: &[DVec2]) -> Vec<StarPoint> {
    positions.iter().map(|p| StarPoint::new(p.x, p.y)).collect()
}

pub fn transform_points(positions: &[DVec2], transform: &Transform) -> Vec<DVec2> {
    positions.iter().map(|&p| transform.apply(p)).collect()
}

/// Population standard deviation of channel 0 over pixels farther than
/// `exclusion` from every star.
pub fn background_std(pixels: &RgbBuffer, stars: &[DVec2], exclusion: f64) -> f64 {
    let mut values = Vec::new();
    for y in 0..pixels.height() {
        for x in 0..pixels.width() {
            let p = DVec2::new(x as f64, y as f64);
            if stars.iter().all(|s| s.distance(p) > exclusion) {
                values.push(pixels[(x, y)][0] as f64);
            }
        }
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// In-memory codec: decodes from a preloaded map, records encodes.
#[derive(Debug, Default)]
pub struct MemoryCodec {
    frames: HashMap<PathBuf, RgbBuffer>,
    written: Mutex<Vec<(PathBuf, u8)>>,
    fail_encode: bool,
}

impl MemoryCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frame(mut self, frame: Frame) -> Self {
        let path = frame.path().to_path_buf();
        self.frames.insert(path, frame.into_pixels());
        self
    }

    pub fn with_frames(self, frames: impl IntoIterator<Item = Frame>) -> Self {
        frames.into_iter().fold(self, Self::with_frame)
    }

    pub fn failing_encode(mut self) -> Self {
        self.fail_encode = true;
        self
    }

    pub fn written(&self) -> Vec<(PathBuf, u8)> {
        self.written.lock().unwrap().clone()
    }
}

impl ImageCodec for MemoryCodec {
    fn decode(&self, path: &Path) -> Result<Frame, CodecError> {
        self.frames
            .get(path)
            .map(|pixels| Frame::new(path, pixels.clone()))
            .ok_or_else(|| CodecError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not in memory codec"),
            })
    }

    fn encode(&self, _pixels: &RgbBuffer, path: &Path, quality: u8) -> Result<(), CodecError> {
        if self.fail_encode {
            return Err(CodecError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::other("disk full"),
            });
        }
        self.written
            .lock()
            .unwrap()
            .push((path.to_path_buf(), quality));
        Ok(())
    }
}
