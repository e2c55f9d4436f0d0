//! 2D affine transforms between frame coordinate spaces.

use glam::DVec2;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Transformation model fitted by RANSAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformModel {
    /// Rotation, uniform scale and translation (4 DOF).
    Similarity,
    /// Full affine: adds shear and differential scale (6 DOF).
    #[default]
    Affine,
}

impl TransformModel {
    /// Minimum number of correspondences that determine the model.
    pub fn min_points(&self) -> usize {
        match self {
            TransformModel::Similarity => 2,
            TransformModel::Affine => 3,
        }
    }
}

/// Affine map `p' = A p + t`.
///
/// Stored row-major as `[a, b, tx, c, d, ty]`:
/// ```text
/// x' = a*x + b*y + tx
/// y' = c*x + d*y + ty
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub matrix: [f64; 6],
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::fmt::Display for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let t = self.translation_components();
        write!(
            f,
            "Affine(dx={:.2}, dy={:.2}, rot={:.3}°, scale={:.4})",
            t.x,
            t.y,
            self.rotation_angle().to_degrees(),
            self.scale_factor()
        )
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self::from_matrix([1.0, 0.0, 0.0, 0.0, 1.0, 0.0])
    }

    pub fn from_matrix(matrix: [f64; 6]) -> Self {
        Self { matrix }
    }

    pub fn translation(t: DVec2) -> Self {
        Self::from_matrix([1.0, 0.0, t.x, 0.0, 1.0, t.y])
    }

    /// Rotation by `angle` radians and uniform `scale` about the origin,
    /// followed by translation `t`.
    pub fn similarity(t: DVec2, angle: f64, scale: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::from_matrix([
            scale * cos,
            -scale * sin,
            t.x,
            scale * sin,
            scale * cos,
            t.y,
        ])
    }

    #[inline]
    pub fn apply(&self, p: DVec2) -> DVec2 {
        let [a, b, tx, c, d, ty] = self.matrix;
        DVec2::new(a * p.x + b * p.y + tx, c * p.x + d * p.y + ty)
    }

    pub fn determinant(&self) -> f64 {
        let [a, b, _, c, d, _] = self.matrix;
        a * d - b * c
    }

    /// Inverse map, or `None` when the linear part is singular.
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if det.abs() < f64::EPSILON || !det.is_finite() {
            return None;
        }
        let [a, b, tx, c, d, ty] = self.matrix;
        let ia = d / det;
        let ib = -b / det;
        let ic = -c / det;
        let id = a / det;
        Some(Self::from_matrix([
            ia,
            ib,
            -(ia * tx + ib * ty),
            ic,
            id,
            -(ic * tx + id * ty),
        ]))
    }

    /// `self` applied after `first`: `p -> self(first(p))`.
    pub fn compose(&self, first: &Transform) -> Self {
        let [a1, b1, tx1, c1, d1, ty1] = first.matrix;
        let [a2, b2, tx2, c2, d2, ty2] = self.matrix;
        Self::from_matrix([
            a2 * a1 + b2 * c1,
            a2 * b1 + b2 * d1,
            a2 * tx1 + b2 * ty1 + tx2,
            c2 * a1 + d2 * c1,
            c2 * b1 + d2 * d1,
            c2 * tx1 + d2 * ty1 + ty2,
        ])
    }

    pub fn translation_components(&self) -> DVec2 {
        DVec2::new(self.matrix[2], self.matrix[5])
    }

    /// Rotation of the x axis, in radians.
    pub fn rotation_angle(&self) -> f64 {
        self.matrix[3].atan2(self.matrix[0])
    }

    /// Geometric mean scale, `sqrt(|det|)`.
    pub fn scale_factor(&self) -> f64 {
        self.determinant().abs().sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.matrix.iter().all(|v| v.is_finite())
    }
}
