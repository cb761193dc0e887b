use {
    crate::{LocalAccumulator, Point},
    itertools::Itertools,
    std::sync::Arc,
};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Centroid {
    pub position: Point,
    pub accumulated_sum: Point,
    pub accumulated_count: u64,
}

impl Centroid {
    pub fn at(position: Point) -> Centroid {
        Centroid {
            position,
            ..Default::default()
        }
    }
}

/// An immutable snapshot of every cluster, tagged with the number of
/// recomputes that produced it. Cloning shares the underlying array.
#[derive(Debug, Clone, PartialEq)]
pub struct CentroidState {
    version: u64,
    centroids: Arc<[Centroid]>,
}

impl CentroidState {
    pub fn seeded(positions: impl IntoIterator<Item = Point>) -> CentroidState {
        CentroidState {
            version: 0,
            centroids: positions.into_iter().map(Centroid::at).collect(),
        }
    }

    /// A copy of another worker's positions, without its accumulated totals.
    pub fn replica(version: u64, positions: Vec<Point>) -> CentroidState {
        CentroidState {
            version,
            centroids: positions.into_iter().map(Centroid::at).collect(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn centroids(&self) -> &[Centroid] {
        &self.centroids
    }

    pub fn positions(&self) -> Vec<Point> {
        self.centroids.iter().map(|c| c.position).collect()
    }

    pub fn counts(&self) -> Vec<u64> {
        self.centroids.iter().map(|c| c.accumulated_count).collect()
    }

    /// Clusters that received no points in the merge behind this snapshot.
    pub fn empty_clusters(&self) -> Vec<usize> {
        self.centroids
            .iter()
            .positions(|c| c.accumulated_count == 0)
            .collect()
    }

    /// Builds the next snapshot from a complete merge. The merged totals
    /// replace the previous ones outright; a cluster with no points keeps its
    /// old position.
    pub fn recompute(&self, merged: &LocalAccumulator) -> CentroidState {
        let centroids = self
            .centroids
            .iter()
            .zip_eq(merged.slots())
            .map(|(old, slot)| {
                let position = if slot.count > 0 {
                    let n = slot.count as f64;
                    Point::new(slot.sum.x / n, slot.sum.y / n)
                } else {
                    old.position
                };
                Centroid {
                    position,
                    accumulated_sum: slot.sum,
                    accumulated_count: slot.count,
                }
            })
            .collect();

        CentroidState {
            version: self.version + 1,
            centroids,
        }
    }
}

/// Total squared movement from `previous` to `current`, cluster by cluster.
pub fn displacement(current: &[Point], previous: &[Point]) -> f64 {
    current
        .iter()
        .zip_eq(previous)
        .map(|(a, b)| a.squared_distance(b))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merged(slots: &[(Point, u64)]) -> LocalAccumulator {
        let mut acc = LocalAccumulator::zeroed(slots.len());
        for (k, &(point, count)) in slots.iter().enumerate() {
            // spread the sum over `count` identical adds
            for _ in 0..count {
                acc.add(k, &Point::new(point.x / count as f64, point.y / count as f64));
            }
        }
        acc
    }

    #[test]
    fn recompute_divides_sums_by_counts() {
        let state = CentroidState::seeded([Point::ORIGIN, Point::new(0.0, 1.0)]);
        let next = state.recompute(&merged(&[
            (Point::new(0.0, 1.0), 2),
            (Point::new(20.0, 21.0), 2),
        ]));

        assert_eq!(next.version(), 1);
        assert_eq!(next.positions(), vec![Point::new(0.0, 0.5), Point::new(10.0, 10.5)]);
        assert_eq!(next.counts(), vec![2, 2]);
        assert!(next.empty_clusters().is_empty());
    }

    #[test]
    fn empty_cluster_keeps_its_position() {
        let state = CentroidState::seeded([Point::new(5.0, 5.0), Point::new(-7.0, 3.0)]);
        let next = state.recompute(&merged(&[(Point::new(10.0, 10.0), 2), (Point::ORIGIN, 0)]));

        assert_eq!(next.positions()[1], Point::new(-7.0, 3.0));
        assert!(next.positions().iter().all(Point::is_finite));
        assert_eq!(next.empty_clusters(), vec![1]);
    }

    #[test]
    fn recompute_does_not_carry_totals_over() {
        let state = CentroidState::seeded([Point::ORIGIN]);
        let first = state.recompute(&merged(&[(Point::new(4.0, 4.0), 4)]));
        let second = first.recompute(&merged(&[(Point::new(2.0, 2.0), 1)]));

        assert_eq!(second.centroids()[0].accumulated_count, 1);
        assert_eq!(second.centroids()[0].accumulated_sum, Point::new(2.0, 2.0));
        assert_eq!(second.version(), 2);
    }

    #[test]
    fn snapshots_are_independent() {
        let state = CentroidState::seeded([Point::ORIGIN]);
        let next = state.recompute(&merged(&[(Point::new(3.0, 4.0), 1)]));

        assert_eq!(state.positions(), vec![Point::ORIGIN]);
        assert_eq!(displacement(&next.positions(), &state.positions()), 25.0);
    }
}
