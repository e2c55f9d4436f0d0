//! Star detection: point-source centroids from a single frame.
//!
//! The frame is reduced to luminance, smoothed with a Gaussian to suppress
//! single-pixel noise, thresholded, and split into 8-connected blobs. Each blob
//! yields one intensity-weighted centroid. Blobs outside the configured area
//! range are rejected before the result is truncated to the brightest
//! `max_features` points.


pub(crate) mod convolution;
mod labeling;

use common::Buffer2;
use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::frame::Frame;
use crate::pipeline::InvalidParameter;

pub use convolution::{gaussian_blur, gaussian_kernel_1d};

/// Star detection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Luminance (0..=255) a smoothed pixel must exceed to be part of a star.
    pub threshold: f32,
    /// Gaussian sigma of the smoothing pass, in pixels. Zero disables it.
    pub blur_radius: f32,
    /// Smallest accepted blob, in pixels.
    pub min_area: usize,
    /// Largest accepted blob, in pixels.
    pub max_area: usize,
    /// Upper bound on returned stars; the brightest are kept.
    pub max_features: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold: 50.0,
            blur_radius: 1.5,
            min_area: 3,
            max_area: 100,
            max_features: 500,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), InvalidParameter> {
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(InvalidParameter::new(
                "threshold",
                format!("must be positive, got {}", self.threshold),
            ));
        }
        if !(self.blur_radius.is_finite() && self.blur_radius >= 0.0) {
            return Err(InvalidParameter::new(
                "blur_radius",
                format!("must be non-negative, got {}", self.blur_radius),
            ));
        }
        if self.min_area > self.max_area {
            return Err(InvalidParameter::new(
                "min_area",
                format!(
                    "min_area {} exceeds max_area {}",
                    self.min_area, self.max_area
                ),
            ));
        }
        if self.max_features == 0 {
            return Err(InvalidParameter::new("max_features", "must be at least 1"));
        }
        Ok(())
    }
}

/// A detected star.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StarPoint {
    /// Sub-pixel centroid; pixel centres sit on integer coordinates.
    pub pos: DVec2,
    /// Unsmoothed luminance at the pixel containing the centroid.
    pub brightness: f32,
    /// Blob size in pixels.
    pub area: usize,
}

impl StarPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            pos: DVec2::new(x, y),
            brightness: 0.0,
            area: 0,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct BlobStats {
    area: usize,
    weight: f64,
    sum_x: f64,
    sum_y: f64,
}

/// Stateless star detector; one per configuration.
#[derive(Debug, Clone, Default)]
pub struct StarDetector {
    config: Config,
}

impl StarDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Detect stars in an RGB frame.
    pub fn detect(&self, frame: &Frame) -> Vec<StarPoint> {
        self.detect_luminance(&frame.luminance())
    }

    /// Detect stars in a luminance buffer (0..=255 scale).
    ///
    /// Never fails: degenerate input yields an empty list.
    pub fn detect_luminance(&self, luminance: &Buffer2<f32>) -> Vec<StarPoint> {
        let (width, height) = luminance.dimensions();
        if width == 0 || height == 0 {
            return Vec::new();
        }

        let smoothed = gaussian_blur(luminance, self.config.blur_radius);
        let mask = smoothed.map(|&v| v > self.config.threshold);
        let components = labeling::label_components(&mask);

        let mut blobs = vec![BlobStats::default(); components.count];
        for (idx, (&label, &value)) in components
            .labels
            .pixels()
            .iter()
            .zip(smoothed.pixels())
            .enumerate()
        {
            if label == 0 {
                continue;
            }
            let (x, y) = ((idx % width) as f64, (idx / width) as f64);
            let w = value as f64;
            let blob = &mut blobs[label as usize - 1];
            blob.area += 1;
            blob.weight += w;
            blob.sum_x += w * x;
            blob.sum_y += w * y;
        }

        let blob_count = blobs.len();
        let mut stars: Vec<StarPoint> = blobs
            .into_iter()
            .filter(|b| (self.config.min_area..=self.config.max_area).contains(&b.area))
            .filter(|b| b.weight > 0.0)
            .map(|b| {
                let pos = DVec2::new(b.sum_x / b.weight, b.sum_y / b.weight);
                let px = (pos.x as usize).min(width - 1);
                let py = (pos.y as usize).min(height - 1);
                StarPoint {
                    pos,
                    brightness: luminance[(px, py)],
                    area: b.area,
                }
            })
            .collect();

        let accepted = stars.len();
        if stars.len() > self.config.max_features {
            stars.sort_by(|a, b| b.brightness.total_cmp(&a.brightness));
            stars.truncate(self.config.max_features);
        }

        tracing::debug!(
            blobs = blob_count,
            accepted,
            returned = stars.len(),
            "Star detection on {}x{}",
            width,
            height
        );

        stars
    }
}
