use clap::ValueEnum;
use std::num::NonZeroUsize;
use std::thread;
use tracing::{info, info_span};

mod accumulator;
mod assign;
mod centroid;
mod collective;
mod controller;
mod error;
mod partition;
mod point;
mod report;
mod seed;

pub use accumulator::*;
pub use assign::*;
pub use centroid::*;
pub use collective::*;
pub use controller::*;
pub use error::*;
pub use partition::*;
pub use point::*;
pub use report::*;
pub use seed::*;

pub const CLUSTER_COUNT: usize = 2;
pub const ITERATION_COUNT: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ExecutionModel {
    /// One worker, no synchronization.
    Sequential,
    /// Threads sharing the point set and a lock-protected centroid state.
    /// A worker that panics leaves the others waiting at the barrier, so the
    /// run never returns.
    #[default]
    SharedMemory,
    /// Workers that share nothing and talk to the root over channels.
    MessagePassing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DisplayMode {
    #[default]
    Text,
    Json,
    Plot,
}

#[derive(Debug, Clone)]
pub struct KmeansOpts {
    pub clusters: usize,
    pub iterations: usize,
    pub workers: usize,
    pub model: ExecutionModel,
    pub partition: PartitionScheme,
    pub seeding: Seeding,
    pub record_history: bool,
}

impl Default for KmeansOpts {
    fn default() -> Self {
        KmeansOpts {
            clusters: CLUSTER_COUNT,
            iterations: ITERATION_COUNT,
            workers: thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            model: ExecutionModel::default(),
            partition: PartitionScheme::default(),
            seeding: Seeding::default(),
            record_history: false,
        }
    }
}

impl KmeansOpts {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clusters == 0 {
            return Err(ConfigError::ZeroClusters);
        }
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ClusterResult {
    pub centroids: Vec<Point>,
    /// Points merged into each cluster in the last iteration.
    pub counts: Vec<u64>,
    pub iterations: usize,
    pub version: u64,
    pub history: Vec<Vec<Point>>,
}

impl ClusterResult {
    fn from_outcome(outcome: WorkerOutcome) -> ClusterResult {
        ClusterResult {
            centroids: outcome.state.positions(),
            counts: outcome.state.counts(),
            iterations: outcome.iterations,
            version: outcome.state.version(),
            history: outcome.history,
        }
    }

    /// Nearest final centroid for every point.
    pub fn labels(&self, points: &PointSet) -> Vec<usize> {
        points.iter().map(|p| nearest(p, &self.centroids)).collect()
    }

    /// Sum of squared distances from every point to its nearest final centroid.
    pub fn inertia(&self, points: &PointSet) -> f64 {
        points
            .iter()
            .map(|p| nearest_distance(p, &self.centroids))
            .sum()
    }
}

pub struct Kmeans {
    opts: KmeansOpts,
}

impl Kmeans {
    pub fn new(opts: KmeansOpts) -> Kmeans {
        Kmeans { opts }
    }

    pub fn run(&self, points: &PointSet) -> Result<ClusterResult, Error> {
        self.opts.validate()?;
        let initial = self.opts.seeding.initial_state(points, self.opts.clusters)?;

        let workers = match self.opts.model {
            ExecutionModel::Sequential => 1,
            _ => self.opts.workers,
        };
        info!(
            points = points.len(),
            clusters = self.opts.clusters,
            iterations = self.opts.iterations,
            workers,
            model = ?self.opts.model,
            "starting k-means"
        );

        let outcome = match self.opts.model {
            ExecutionModel::Sequential => self
                .controller(WorkerContext::solo(), points, Solo)
                .run(initial)?
                .ok_or(SyncError::NoRoot)?,
            ExecutionModel::SharedMemory => {
                let hub = SharedCollective::new(workers, self.opts.clusters);
                self.spawn_workers(points, &initial, vec![&hub; workers])?
            }
            ExecutionModel::MessagePassing => {
                let mesh = ChannelCollective::mesh(workers, self.opts.clusters);
                self.spawn_workers(points, &initial, mesh)?
            }
        };

        info!(version = outcome.state.version(), "k-means done");
        Ok(ClusterResult::from_outcome(outcome))
    }

    fn controller<'a, C: Collective>(
        &self,
        ctx: WorkerContext,
        points: &'a PointSet,
        collective: C,
    ) -> IterationController<'a, C> {
        IterationController::new(
            ctx,
            points,
            self.opts.partition,
            self.opts.iterations,
            collective,
        )
        .record_history(self.opts.record_history)
    }

    /// One thread per endpoint, endpoint `i` running as rank `i`. Every
    /// worker starts from the same seeded snapshot, as if each had loaded the
    /// input itself; only the root's copy is authoritative after the first
    /// broadcast.
    fn spawn_workers<C: Collective + Send>(
        &self,
        points: &PointSet,
        initial: &CentroidState,
        endpoints: Vec<C>,
    ) -> Result<WorkerOutcome, SyncError> {
        let size = endpoints.len();

        let results: Vec<Result<Option<WorkerOutcome>, SyncError>> = thread::scope(|s| {
            let handles: Vec<_> = endpoints
                .into_iter()
                .enumerate()
                .map(|(rank, endpoint)| {
                    let ctx = WorkerContext::new(rank, size);
                    let mut controller = self.controller(ctx, points, endpoint);
                    let initial = initial.clone();
                    s.spawn(move || {
                        let _span = info_span!("worker", rank).entered();
                        controller.run(initial)
                    })
                })
                .collect();

            handles
                .into_iter()
                .enumerate()
                .map(|(rank, handle)| {
                    handle
                        .join()
                        .unwrap_or(Err(SyncError::WorkerPanicked { rank }))
                })
                .collect()
        });

        // Report a panic ahead of the disconnects it causes.
        let panicked = results.iter().find_map(|r| {
            r.as_ref()
                .err()
                .filter(|e| matches!(e, SyncError::WorkerPanicked { .. }))
        });
        if let Some(panic) = panicked {
            return Err(panic.clone());
        }

        let mut root = None;
        for result in results {
            if let Some(outcome) = result? {
                root = Some(outcome);
            }
        }
        root.ok_or(SyncError::NoRoot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(model: ExecutionModel, workers: usize) -> KmeansOpts {
        KmeansOpts {
            iterations: 50,
            workers,
            model,
            ..Default::default()
        }
    }

    #[test]
    fn defaults_match_reference_constants() {
        let opts = KmeansOpts::default();
        assert_eq!(opts.clusters, 2);
        assert_eq!(opts.iterations, 10_000);
        assert!(opts.workers >= 1);
        assert_eq!(opts.seeding, Seeding::FirstPoints);
        assert_eq!(opts.partition, PartitionScheme::Interleaved);
    }

    #[test]
    fn validate_rejects_zeroes() {
        let mut opts = KmeansOpts::default();
        opts.clusters = 0;
        assert_eq!(opts.validate(), Err(ConfigError::ZeroClusters));

        let mut opts = KmeansOpts::default();
        opts.workers = 0;
        assert_eq!(opts.validate(), Err(ConfigError::ZeroWorkers));
    }

    #[test]
    fn run_reports_input_errors_before_starting() {
        let points = PointSet::parse(["1,1"]).unwrap();
        let err = Kmeans::new(opts(ExecutionModel::SharedMemory, 4))
            .run(&points)
            .unwrap_err();
        assert_eq!(
            err,
            Error::Input(InputError::TooFewPoints {
                points: 1,
                clusters: 2
            })
        );
    }

    /// Channel endpoint whose worker dies on entering `iteration`.
    struct Crashing {
        inner: ChannelCollective,
        iteration: usize,
    }

    impl Collective for Crashing {
        fn broadcast(
            &self,
            ctx: &WorkerContext,
            iteration: usize,
            state: &mut CentroidState,
        ) -> Result<(), SyncError> {
            if iteration == self.iteration {
                panic!("worker {} crashed", ctx.rank);
            }
            self.inner.broadcast(ctx, iteration, state)
        }

        fn reduce(
            &self,
            ctx: &WorkerContext,
            iteration: usize,
            local: LocalAccumulator,
        ) -> Result<Option<LocalAccumulator>, SyncError> {
            self.inner.reduce(ctx, iteration, local)
        }
    }

    #[test]
    fn message_passing_reports_a_panicked_worker() {
        let points = PointSet::parse(["0,0", "0,1", "10,10", "10,11"]).unwrap();
        let kmeans = Kmeans::new(opts(ExecutionModel::MessagePassing, 3));
        let initial = CentroidState::seeded([points[0], points[1]]);

        let endpoints: Vec<Crashing> = ChannelCollective::mesh(3, 2)
            .into_iter()
            .enumerate()
            .map(|(rank, inner)| Crashing {
                inner,
                iteration: if rank == 1 { 3 } else { usize::MAX },
            })
            .collect();

        assert_eq!(
            kmeans.spawn_workers(&points, &initial, endpoints).unwrap_err(),
            SyncError::WorkerPanicked { rank: 1 }
        );
    }

    #[test]
    fn every_model_converges_on_the_square() {
        let points = PointSet::parse(["0,0", "0,1", "10,10", "10,11"]).unwrap();
        for model in [
            ExecutionModel::Sequential,
            ExecutionModel::SharedMemory,
            ExecutionModel::MessagePassing,
        ] {
            let result = Kmeans::new(opts(model, 3)).run(&points).unwrap();
            assert_eq!(result.centroids, vec![Point::new(0.0, 0.5), Point::new(10.0, 10.5)]);
            assert_eq!(result.counts, vec![2, 2]);
            assert_eq!(result.labels(&points), vec![0, 0, 1, 1]);
            assert!((result.inertia(&points) - 1.0).abs() < 1e-12);
            assert_eq!(result.version, 50);
        }
    }
}
