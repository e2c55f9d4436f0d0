//! Least-squares transform fits from point correspondences.

use glam::DVec2;

use crate::registration::transform::{Transform, TransformModel};

/// Relative tolerance below which the normal matrix counts as singular.
const SINGULAR_TOLERANCE: f64 = 1e-10;

pub(crate) fn estimate_transform(
    from: &[DVec2],
    to: &[DVec2],
    model: TransformModel,
) -> Option<Transform> {
    debug_assert_eq!(from.len(), to.len());
    match model {
        TransformModel::Similarity => estimate_similarity(from, to),
        TransformModel::Affine => estimate_affine(from, to),
    }
}

fn centroid(points: &[DVec2]) -> DVec2 {
    points.iter().copied().sum::<DVec2>() / points.len() as f64
}

/// Full affine least squares on centred coordinates.
pub(crate) fn estimate_affine(from: &[DVec2], to: &[DVec2]) -> Option<Transform> {
    if from.len() < 3 {
        return None;
    }

    let from_c = centroid(from);
    let to_c = centroid(to);

    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    let (mut sx_u, mut sy_u, mut sx_v, mut sy_v) = (0.0, 0.0, 0.0, 0.0);
    for (f, t) in from.iter().zip(to) {
        let p = *f - from_c;
        let q = *t - to_c;
        sxx += p.x * p.x;
        sxy += p.x * p.y;
        syy += p.y * p.y;
        sx_u += p.x * q.x;
        sy_u += p.y * q.x;
        sx_v += p.x * q.y;
        sy_v += p.y * q.y;
    }

    // collinear or coincident points leave the system underdetermined
    let det = sxx * syy - sxy * sxy;
    let scale = sxx * syy;
    if scale <= 0.0 || det <= SINGULAR_TOLERANCE * scale {
        return None;
    }

    let a = (sx_u * syy - sy_u * sxy) / det;
    let b = (sy_u * sxx - sx_u * sxy) / det;
    let c = (sx_v * syy - sy_v * sxy) / det;
    let d = (sy_v * sxx - sx_v * sxy) / det;

    let tx = to_c.x - a * from_c.x - b * from_c.y;
    let ty = to_c.y - c * from_c.x - d * from_c.y;

    let transform = Transform::from_matrix([a, b, tx, c, d, ty]);
    transform.is_finite().then_some(transform)
}

/// Rotation + uniform scale + translation least squares (Umeyama without
/// reflection).
pub(crate) fn estimate_similarity(from: &[DVec2], to: &[DVec2]) -> Option<Transform> {
    if from.len() < 2 {
        return None;
    }

    let from_c = centroid(from);
    let to_c = centroid(to);

    let (mut var, mut dot, mut cross) = (0.0, 0.0, 0.0);
    for (f, t) in from.iter().zip(to) {
        let p = *f - from_c;
        let q = *t - to_c;
        var += p.length_squared();
        dot += p.dot(q);
        cross += p.perp_dot(q);
    }

    if var <= f64::EPSILON {
        return None;
    }

    let a = dot / var;
    let b = cross / var;
    let tx = to_c.x - (a * from_c.x - b * from_c.y);
    let ty = to_c.y - (b * from_c.x + a * from_c.y);

    let transform = Transform::from_matrix([a, -b, tx, b, a, ty]);
    (transform.is_finite() && transform.determinant() > 0.0).then_some(transform)
}
