//! Greedy nearest-neighbour star matching.

use crate::star_detection::StarPoint;

/// A reference star paired with its nearest target star.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StarMatch {
    pub reference: usize,
    pub target: usize,
    pub distance: f64,
}

/// Pair every reference star with the nearest target star closer than
/// `max_distance` pixels.
///
/// Pairs are produced in reference order. The relation is not a bijection:
/// several reference stars may claim the same target star.
pub fn match_nearest(
    reference: &[StarPoint],
    target: &[StarPoint],
    max_distance: f64,
) -> Vec<StarMatch> {
    let max_sq = max_distance * max_distance;

    reference
        .iter()
        .enumerate()
        .filter_map(|(ri, r)| {
            let (ti, dist_sq) = target
                .iter()
                .enumerate()
                .map(|(ti, t)| (ti, r.pos.distance_squared(t.pos)))
                .min_by(|a, b| a.1.total_cmp(&b.1))?;
            (dist_sq < max_sq).then(|| StarMatch {
                reference: ri,
                target: ti,
                distance: dist_sq.sqrt(),
            })
        })
        .collect()
}
