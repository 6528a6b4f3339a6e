//! Nearest-candidate selection shared by the cart and control-point queries.

use capture_env::Position;
use nalgebra::{distance_squared, Point3};

/// Returns the candidate with the smallest squared distance to `source`.
///
/// Ties keep the first candidate in iteration order. Candidates at a
/// non-finite distance are never selected.
pub fn closest_position<I>(source: &Position, candidates: I) -> Option<Position>
where
    I: IntoIterator<Item = Position>,
{
    let mut best: Option<(f32, Position)> = None;
    for candidate in candidates {
        let dist_sq = distance_squared(&Point3::from(*source), &Point3::from(candidate));
        if !dist_sq.is_finite() {
            continue;
        }
        if best.map_or(true, |(best_dist, _)| dist_sq < best_dist) {
            best = Some((dist_sq, candidate));
        }
    }
    best.map(|(_, pos)| pos)
}
