//! Frame registration: star matching, robust transform fitting, and
//! resampling onto the reference frame.
//!
//! Two-phase: each reference star is greedily paired with its nearest target
//! star, then RANSAC fits a transform to the pairs while rejecting the
//! mismatches that greedy pairing inevitably produces.


pub mod matching;
pub mod ransac;
mod transform;
mod warp;

use glam::DVec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frame::{Frame, ImageDimensions, RgbBuffer};
use crate::pipeline::InvalidParameter;
use crate::star_detection::StarPoint;

pub use matching::{StarMatch, match_nearest};
pub use ransac::{RansacConfig, RansacEstimator, RansacResult};
pub use transform::{Transform, TransformModel};
pub use warp::warp_bilinear;

/// Fewest stars or star pairs an alignment can be built from.
pub const MIN_CORRESPONDENCES: usize = 3;

/// Registration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Largest accepted nearest-neighbour distance, in pixels (exclusive).
    pub max_match_distance: f64,
    /// RANSAC reprojection error threshold, in pixels.
    pub ransac_threshold: f64,
    pub ransac_max_iterations: usize,
    /// Confidence for adaptive early termination, in (0, 1).
    pub ransac_confidence: f64,
    /// RANSAC random seed.
    pub seed: u64,
    pub model: TransformModel,
    /// Minimum detected stars in the reference and in every target.
    pub min_stars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_match_distance: 100.0,
            ransac_threshold: 5.0,
            ransac_max_iterations: 2000,
            ransac_confidence: 0.99,
            seed: 0,
            model: TransformModel::Affine,
            min_stars: MIN_CORRESPONDENCES,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), InvalidParameter> {
        if !(self.max_match_distance.is_finite() && self.max_match_distance > 0.0) {
            return Err(InvalidParameter::new(
                "max_match_distance",
                format!("must be positive, got {}", self.max_match_distance),
            ));
        }
        if !(self.ransac_threshold.is_finite() && self.ransac_threshold > 0.0) {
            return Err(InvalidParameter::new(
                "ransac_threshold",
                format!("must be positive, got {}", self.ransac_threshold),
            ));
        }
        if self.ransac_max_iterations == 0 {
            return Err(InvalidParameter::new(
                "ransac_max_iterations",
                "must be at least 1",
            ));
        }
        if !(self.ransac_confidence > 0.0 && self.ransac_confidence < 1.0) {
            return Err(InvalidParameter::new(
                "ransac_confidence",
                format!("must be within (0, 1), got {}", self.ransac_confidence),
            ));
        }
        if self.min_stars < MIN_CORRESPONDENCES {
            return Err(InvalidParameter::new(
                "min_stars",
                format!(
                    "must be at least {MIN_CORRESPONDENCES}, got {}",
                    self.min_stars
                ),
            ));
        }
        Ok(())
    }

    pub fn ransac(&self) -> RansacConfig {
        RansacConfig {
            max_iterations: self.ransac_max_iterations,
            inlier_threshold: self.ransac_threshold,
            confidence: self.ransac_confidence,
            seed: self.seed,
        }
    }
}

/// Why a target frame could not be registered.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AlignmentFailure {
    #[error("Too few stars to align: reference {reference}, target {target}")]
    TooFewStars { reference: usize, target: usize },

    #[error("Only {matches} star pairs within the match distance")]
    TooFewMatches { matches: usize },

    #[error("No consistent transform among {matches} star pairs")]
    RansacFailed { matches: usize },
}

/// A successful registration of a target frame onto the reference.
#[derive(Debug, Clone)]
pub struct Alignment {
    /// Maps target pixel coordinates onto reference pixel coordinates.
    pub transform: Transform,
    pub matches: usize,
    pub inliers: usize,
    /// RMS reprojection error over the inliers, in pixels.
    pub rms_error: f64,
}

/// Registers target frames onto a reference frame.
#[derive(Debug, Clone, Default)]
pub struct FrameAligner {
    config: Config,
    ransac: RansacEstimator,
}

impl FrameAligner {
    pub fn new(config: Config) -> Self {
        let ransac = RansacEstimator::new(config.ransac());
        Self { config, ransac }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fit the transform carrying `target` stars onto `reference` stars.
    ///
    /// `width`/`height` are the image dimensions. Partial overlap is not a
    /// failure; it is only noted in the log.
    pub fn align(
        &self,
        reference: &[StarPoint],
        target: &[StarPoint],
        width: usize,
        height: usize,
    ) -> Result<Alignment, AlignmentFailure> {
        let min_stars = self.config.min_stars.max(MIN_CORRESPONDENCES);
        if reference.len() < min_stars || target.len() < min_stars {
            return Err(AlignmentFailure::TooFewStars {
                reference: reference.len(),
                target: target.len(),
            });
        }

        let matches = match_nearest(reference, target, self.config.max_match_distance);
        if matches.len() < MIN_CORRESPONDENCES {
            return Err(AlignmentFailure::TooFewMatches {
                matches: matches.len(),
            });
        }

        let from: Vec<DVec2> = matches.iter().map(|m| target[m.target].pos).collect();
        let to: Vec<DVec2> = matches.iter().map(|m| reference[m.reference].pos).collect();

        // warp needs the inverse
        let result = self
            .ransac
            .estimate(&from, &to, self.config.model)
            .filter(|r| r.transform.is_finite() && r.transform.inverse().is_some())
            .ok_or(AlignmentFailure::RansacFailed {
                matches: matches.len(),
            })?;

        let centre = DVec2::new(width as f64 / 2.0, height as f64 / 2.0);
        let mapped = result.transform.apply(centre);
        if !(0.0..width as f64).contains(&mapped.x) || !(0.0..height as f64).contains(&mapped.y) {
            tracing::debug!(
                x = mapped.x,
                y = mapped.y,
                "Target centre lands outside the reference, frames overlap partially"
            );
        }

        let sum_sq: f64 = result
            .inliers
            .iter()
            .map(|&i| result.transform.apply(from[i]).distance_squared(to[i]))
            .sum();
        let rms_error = (sum_sq / result.inliers.len() as f64).sqrt();

        tracing::debug!(
            matches = matches.len(),
            inliers = result.inliers.len(),
            rms_error,
            "Aligned with {}",
            result.transform
        );

        Ok(Alignment {
            transform: result.transform,
            matches: matches.len(),
            inliers: result.inliers.len(),
            rms_error,
        })
    }

    /// Resample `frame` into the reference grid of size `output`.
    ///
    /// `transform` maps target coordinates onto the reference, as returned by
    /// [`FrameAligner::align`]. `None` when it is not invertible.
    pub fn warp(
        &self,
        frame: &Frame,
        transform: &Transform,
        output: ImageDimensions,
    ) -> Option<RgbBuffer> {
        let to_target = transform.inverse()?;
        Some(warp_bilinear(frame.pixels(), &to_target, output))
    }
}
