use {
    crate::{CentroidState, InputError, PointSet},
    rand::{Rng, SeedableRng, rngs::StdRng, seq::index},
};

/// How the first snapshot is chosen. Whatever the strategy, the result is a
/// `CentroidState` at version 0 with one centroid per cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Seeding {
    /// Copy the first `clusters` points, duplicates included.
    #[default]
    FirstPoints,
    /// `clusters` distinct indices drawn uniformly.
    Random { seed: u64 },
    /// k-means++: each further centroid drawn with probability proportional
    /// to its squared distance from the ones already chosen.
    PlusPlus { seed: u64 },
}

impl Seeding {
    pub fn initial_state(
        &self,
        points: &PointSet,
        clusters: usize,
    ) -> Result<CentroidState, InputError> {
        points.require_clusters(clusters)?;

        let chosen: Vec<usize> = match *self {
            Seeding::FirstPoints => (0..clusters).collect(),
            Seeding::Random { seed } => {
                let mut rng = StdRng::seed_from_u64(seed);
                index::sample(&mut rng, points.len(), clusters).into_vec()
            }
            Seeding::PlusPlus { seed } => {
                plus_plus(points, clusters, &mut StdRng::seed_from_u64(seed))
            }
        };

        Ok(CentroidState::seeded(chosen.into_iter().map(|i| points[i])))
    }
}

fn plus_plus(points: &PointSet, clusters: usize, rng: &mut impl Rng) -> Vec<usize> {
    let mut chosen = Vec::with_capacity(clusters);
    if clusters == 0 {
        return chosen;
    }
    chosen.push(rng.random_range(0..points.len()));

    let first = points[chosen[0]];
    let mut weights: Vec<f64> = points.iter().map(|p| p.squared_distance(&first)).collect();

    while chosen.len() < clusters {
        let total: f64 = weights.iter().sum();
        let next = if total > 0.0 {
            let target = rng.random::<f64>() * total;
            let mut running = 0.0;
            let mut pick = None;
            for (i, w) in weights.iter().enumerate() {
                if *w <= 0.0 {
                    continue;
                }
                running += w;
                pick = Some(i);
                if running > target {
                    break;
                }
            }
            pick
        } else {
            None
        };

        // every remaining point coincides with a chosen one
        let next = next.unwrap_or_else(|| {
            (0..points.len())
                .find(|i| !chosen.contains(i))
                .unwrap_or(0)
        });

        chosen.push(next);
        for (w, p) in weights.iter_mut().zip(points.iter()) {
            *w = w.min(p.squared_distance(&points[next]));
        }
    }
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Point;

    fn line(n: usize) -> PointSet {
        PointSet::new((0..n).map(|i| Point::new(i as f64, 0.0)).collect()).unwrap()
    }

    #[test]
    fn first_points_copies_prefix() {
        let points = PointSet::parse(["0,0", "0,0", "10,10"]).unwrap();
        let state = Seeding::FirstPoints.initial_state(&points, 2).unwrap();
        assert_eq!(state.positions(), vec![Point::ORIGIN, Point::ORIGIN]);
        assert_eq!(state.version(), 0);
    }

    #[test]
    fn too_few_points_is_rejected() {
        let points = line(2);
        for seeding in [
            Seeding::FirstPoints,
            Seeding::Random { seed: 1 },
            Seeding::PlusPlus { seed: 1 },
        ] {
            assert_eq!(
                seeding.initial_state(&points, 3),
                Err(InputError::TooFewPoints {
                    points: 2,
                    clusters: 3
                })
            );
        }
    }

    #[test]
    fn random_is_reproducible_and_distinct() {
        let points = line(50);
        let a = Seeding::Random { seed: 7 }.initial_state(&points, 5).unwrap();
        let b = Seeding::Random { seed: 7 }.initial_state(&points, 5).unwrap();
        assert_eq!(a, b);

        let mut xs: Vec<i64> = a.positions().iter().map(|p| p.x as i64).collect();
        xs.sort_unstable();
        xs.dedup();
        assert_eq!(xs.len(), 5);
    }

    #[test]
    fn plus_plus_spreads_out() {
        let mut raw = vec![Point::ORIGIN; 20];
        raw.push(Point::new(1000.0, 1000.0));
        let points = PointSet::new(raw).unwrap();

        for seed in 0..10 {
            let state = Seeding::PlusPlus { seed }.initial_state(&points, 2).unwrap();
            let positions = state.positions();
            assert!(positions.contains(&Point::ORIGIN));
            assert!(positions.contains(&Point::new(1000.0, 1000.0)), "seed {seed}");
        }
    }

    #[test]
    fn plus_plus_with_identical_points() {
        let points = PointSet::new(vec![Point::new(2.0, 2.0); 4]).unwrap();
        let state = Seeding::PlusPlus { seed: 3 }.initial_state(&points, 3).unwrap();
        assert_eq!(state.positions(), vec![Point::new(2.0, 2.0); 3]);
    }
}
