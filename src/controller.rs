use {
    crate::{
        CentroidState, Collective, LocalAccumulator, PartitionScheme, Point, PointSet, SyncError,
        WorkerContext,
    },
    std::fmt,
    tracing::{debug, trace, warn},
};

/// Where a worker is within an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Broadcast,
    Assign,
    LocalAccumulate,
    GlobalMerge,
    Recompute,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Broadcast => "broadcast",
            Phase::Assign => "assign",
            Phase::LocalAccumulate => "local-accumulate",
            Phase::GlobalMerge => "global-merge",
            Phase::Recompute => "recompute",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// What the root holds once the iteration bound is reached.
#[derive(Debug, Clone)]
pub struct WorkerOutcome {
    pub state: CentroidState,
    pub iterations: usize,
    /// Positions at the start of every iteration, if recorded.
    pub history: Vec<Vec<Point>>,
}

/// Drives one worker through a fixed number of
/// broadcast → assign/accumulate → merge → recompute rounds.
pub struct IterationController<'a, C> {
    ctx: WorkerContext,
    points: &'a PointSet,
    partition: PartitionScheme,
    iterations: usize,
    record_history: bool,
    collective: C,
    phase: Phase,
}

impl<'a, C: Collective> IterationController<'a, C> {
    pub fn new(
        ctx: WorkerContext,
        points: &'a PointSet,
        partition: PartitionScheme,
        iterations: usize,
        collective: C,
    ) -> Self {
        IterationController {
            ctx,
            points,
            partition,
            iterations,
            record_history: false,
            collective,
            phase: Phase::Broadcast,
        }
    }

    pub fn record_history(mut self, record: bool) -> Self {
        self.record_history = record;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, phase: Phase, iteration: usize) {
        trace!(rank = self.ctx.rank, iteration, %phase);
        self.phase = phase;
    }

    /// Runs every iteration. Only the root comes back with `Some`: it is the
    /// one worker that recomputes, so it holds the final answer.
    pub fn run(&mut self, initial: CentroidState) -> Result<Option<WorkerOutcome>, SyncError> {
        let mut state = initial;
        let mut history = Vec::new();

        for iteration in 0..self.iterations {
            self.enter(Phase::Broadcast, iteration);
            self.collective.broadcast(&self.ctx, iteration, &mut state)?;
            if self.record_history && self.ctx.is_root() {
                history.push(state.positions());
            }

            self.enter(Phase::Assign, iteration);
            let positions = state.positions();
            let owned = self.partition.indices(&self.ctx, self.points.len());

            self.enter(Phase::LocalAccumulate, iteration);
            let local = LocalAccumulator::accumulate(self.points, owned, &positions);

            self.enter(Phase::GlobalMerge, iteration);
            let merged = self.collective.reduce(&self.ctx, iteration, local)?;

            if let Some(merged) = merged {
                self.enter(Phase::Recompute, iteration);
                debug_assert_eq!(merged.total_count(), self.points.len() as u64);

                state = state.recompute(&merged);
                let empty = state.empty_clusters();
                if !empty.is_empty() {
                    warn!(iteration, clusters = ?empty, "empty clusters keep their previous position");
                }
                debug!(iteration, version = state.version(), "recomputed centroids");
            }
        }

        self.enter(Phase::Done, self.iterations);
        if !self.ctx.is_root() {
            return Ok(None);
        }
        Ok(Some(WorkerOutcome {
            state,
            iterations: self.iterations,
            history,
        }))
    }
}
