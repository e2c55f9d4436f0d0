//! RANSAC (Random Sample Consensus) for robust transform estimation.
//!
//! 1. Randomly sample minimal point sets
//! 2. Fit a candidate transform to the sample
//! 3. Count correspondences within the reprojection threshold
//! 4. Keep the model with the most inliers, lowest residual on ties
//! 5. Refine with least squares on the final inlier set


pub(crate) mod estimate;

use glam::DVec2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::registration::transform::{Transform, TransformModel};

pub(crate) use estimate::estimate_transform;

/// RANSAC configuration.
#[derive(Debug, Clone)]
pub struct RansacConfig {
    /// Maximum iterations.
    pub max_iterations: usize,
    /// Inlier distance threshold in pixels.
    pub inlier_threshold: f64,
    /// Target confidence for early termination.
    pub confidence: f64,
    /// Random seed; identical inputs and seeds give identical results.
    pub seed: u64,
}

impl Default for RansacConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            inlier_threshold: 5.0,
            confidence: 0.99,
            seed: 0,
        }
    }
}

/// Result of RANSAC estimation.
#[derive(Debug, Clone)]
pub struct RansacResult {
    /// Best transformation found, refined on its inliers.
    pub transform: Transform,
    /// Indices of inlier correspondences.
    pub inliers: Vec<usize>,
    /// Number of hypotheses evaluated.
    pub iterations: usize,
}

/// RANSAC estimator for robust transformation fitting.
#[derive(Debug, Clone, Default)]
pub struct RansacEstimator {
    config: RansacConfig,
}

impl RansacEstimator {
    pub fn new(config: RansacConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RansacConfig {
        &self.config
    }

    /// Estimate the transform mapping `from[i]` onto `to[i]`.
    ///
    /// Returns `None` when fewer correspondences than the model needs are
    /// given or no sample yields a non-degenerate model.
    pub fn estimate(
        &self,
        from: &[DVec2],
        to: &[DVec2],
        model: TransformModel,
    ) -> Option<RansacResult> {
        assert_eq!(from.len(), to.len(), "Correspondence count mismatch");

        let n = from.len();
        let min_samples = model.min_points();
        if n < min_samples {
            return None;
        }

        let threshold_sq = self.config.inlier_threshold * self.config.inlier_threshold;
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);

        let mut best: Option<Hypothesis> = None;
        let mut sample_from: Vec<DVec2> = Vec::with_capacity(min_samples);
        let mut sample_to: Vec<DVec2> = Vec::with_capacity(min_samples);

        let mut iterations = 0;
        let mut max_iter = self.config.max_iterations.max(1);

        while iterations < max_iter {
            iterations += 1;

            sample_from.clear();
            sample_to.clear();
            for i in rand::seq::index::sample(&mut rng, n, min_samples) {
                sample_from.push(from[i]);
                sample_to.push(to[i]);
            }

            let Some(transform) = estimate_transform(&sample_from, &sample_to, model) else {
                continue;
            };

            let candidate = Hypothesis::score(transform, from, to, threshold_sq);
            if best.as_ref().is_none_or(|b| candidate.beats(b)) {
                let inlier_ratio = candidate.inliers.len() as f64 / n as f64;
                max_iter = max_iter.min(adaptive_iterations(
                    inlier_ratio,
                    min_samples,
                    self.config.confidence,
                ));
                best = Some(candidate);
            }
        }

        let best = best?;
        if best.inliers.len() < min_samples {
            return None;
        }

        // least-squares refinement on the consensus set
        let inlier_from: Vec<DVec2> = best.inliers.iter().map(|&i| from[i]).collect();
        let inlier_to: Vec<DVec2> = best.inliers.iter().map(|&i| to[i]).collect();
        let best = match estimate_transform(&inlier_from, &inlier_to, model) {
            Some(refined) => {
                let refined = Hypothesis::score(refined, from, to, threshold_sq);
                if refined.inliers.len() >= best.inliers.len() {
                    refined
                } else {
                    best
                }
            }
            None => best,
        };

        tracing::debug!(
            iterations,
            inliers = best.inliers.len(),
            correspondences = n,
            "RANSAC finished"
        );

        Some(RansacResult {
            transform: best.transform,
            inliers: best.inliers,
            iterations,
        })
    }
}

struct Hypothesis {
    transform: Transform,
    inliers: Vec<usize>,
    residual: f64,
}

impl Hypothesis {
    fn score(transform: Transform, from: &[DVec2], to: &[DVec2], threshold_sq: f64) -> Self {
        let mut inliers = Vec::new();
        let mut residual = 0.0;
        for (i, (f, t)) in from.iter().zip(to).enumerate() {
            let err = transform.apply(*f).distance_squared(*t);
            if err < threshold_sq {
                inliers.push(i);
                residual += err;
            }
        }
        Self {
            transform,
            inliers,
            residual,
        }
    }

    fn beats(&self, other: &Hypothesis) -> bool {
        self.inliers.len() > other.inliers.len()
            || (self.inliers.len() == other.inliers.len() && self.residual < other.residual)
    }
}

/// Iterations needed to draw one all-inlier sample with the given confidence.
pub(crate) fn adaptive_iterations(inlier_ratio: f64, sample_size: usize, confidence: f64) -> usize {
    if inlier_ratio <= 0.0 {
        return usize::MAX;
    }
    if inlier_ratio >= 1.0 {
        return 1;
    }

    // N = log(1 - confidence) / log(1 - w^n)
    let w_n = inlier_ratio.powi(sample_size as i32);
    let log_outlier = (1.0 - w_n).ln();
    if log_outlier >= 0.0 {
        return usize::MAX;
    }

    ((1.0 - confidence).ln() / log_outlier).ceil().max(1.0) as usize
}
