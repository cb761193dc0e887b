use crate::Point;

/// Index of the centroid closest to `point` by squared Euclidean distance.
///
/// Ties go to the lowest index: a later centroid only wins when it is strictly
/// closer. `positions` must not be empty.
#[inline]
pub fn nearest(point: &Point, positions: &[Point]) -> usize {
    debug_assert!(!positions.is_empty());

    let mut min_index = 0;
    let mut min_dist = f64::INFINITY;
    for (k, centroid) in positions.iter().enumerate() {
        let dist = centroid.squared_distance(point);
        if dist < min_dist {
            min_index = k;
            min_dist = dist;
        }
    }
    min_index
}

/// Squared distance from `point` to its nearest centroid.
pub fn nearest_distance(point: &Point, positions: &[Point]) -> f64 {
    positions
        .iter()
        .map(|c| c.squared_distance(point))
        .fold(f64::INFINITY, f64::min)
}
