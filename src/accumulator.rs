use {
    crate::{Point, PointSet, assign::nearest},
    itertools::Itertools,
};

/// Partial sum and count for one cluster.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Slot {
    pub sum: Point,
    pub count: u64,
}

impl Slot {
    fn add(&mut self, point: &Point) {
        self.sum.x += point.x;
        self.sum.y += point.y;
        self.count += 1;
    }

    fn merge(&mut self, other: &Slot) {
        self.sum.x += other.sum.x;
        self.sum.y += other.sum.y;
        self.count += other.count;
    }
}

/// One worker's scratch totals for a single iteration, one slot per cluster.
///
/// Merging is slot-wise summation, so it is commutative and associative and
/// contributions can be combined in any order or grouping.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalAccumulator {
    slots: Vec<Slot>,
}

impl LocalAccumulator {
    pub fn zeroed(clusters: usize) -> LocalAccumulator {
        LocalAccumulator {
            slots: vec![Slot::default(); clusters],
        }
    }

    /// Assigns every point in `indices` against `positions` and sums it into
    /// the slot of its nearest centroid.
    pub fn accumulate(
        points: &PointSet,
        indices: impl IntoIterator<Item = usize>,
        positions: &[Point],
    ) -> LocalAccumulator {
        let mut acc = LocalAccumulator::zeroed(positions.len());
        for j in indices {
            let point = &points[j];
            acc.add(nearest(point, positions), point);
        }
        acc
    }

    pub fn add(&mut self, cluster: usize, point: &Point) {
        self.slots[cluster].add(point);
    }

    /// Panics if the two accumulators were built for different cluster counts.
    pub fn merge(&mut self, other: &LocalAccumulator) {
        for (mine, theirs) in self.slots.iter_mut().zip_eq(&other.slots) {
            mine.merge(theirs);
        }
    }

    /// Folds a set of contributions into one total.
    pub fn reduce<'a>(
        clusters: usize,
        parts: impl IntoIterator<Item = &'a LocalAccumulator>,
    ) -> LocalAccumulator {
        parts
            .into_iter()
            .fold(LocalAccumulator::zeroed(clusters), |mut total, part| {
                total.merge(part);
                total
            })
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn total_count(&self) -> u64 {
        self.slots.iter().map(|s| s.count).sum()
    }
}
