//! Collective operations between workers.
//!
//! Every iteration each worker makes exactly two calls, in this order:
//! [`Collective::broadcast`], which leaves the root's snapshot in every
//! worker's hands, and [`Collective::reduce`], which blocks until every
//! worker's accumulator for that iteration has been merged and hands the
//! merged total to the root. The root recomputes between `reduce` and the
//! next `broadcast`, so no worker can observe positions for iteration `i + 1`
//! before the merge and recompute of iteration `i` are complete.
//!
//! Three implementations:
//! * [`Solo`] for a single worker, where both calls are trivial.
//! * [`SharedCollective`] for threads sharing memory: a reusable barrier, a
//!   mutex-guarded running total and a read/write-locked published snapshot.
//! * [`ChannelCollective`] for workers that share nothing: the root holds a
//!   duplex channel to every other worker, sends it the positions, and
//!   receives one tagged accumulator back.

use {
    crate::{CentroidState, LocalAccumulator, Point, SyncError, WorkerContext},
    crossbeam_channel::{Receiver, Sender, bounded},
    parking_lot::{Mutex, RwLock},
    std::sync::Barrier,
    tracing::trace,
};

pub trait Collective {
    /// On return `state` holds the root's snapshot for `iteration`.
    fn broadcast(
        &self,
        ctx: &WorkerContext,
        iteration: usize,
        state: &mut CentroidState,
    ) -> Result<(), SyncError>;

    /// Contributes `local` and waits for everyone else's. The root gets the
    /// merged total, every other worker gets `None`.
    fn reduce(
        &self,
        ctx: &WorkerContext,
        iteration: usize,
        local: LocalAccumulator,
    ) -> Result<Option<LocalAccumulator>, SyncError>;
}

impl<T: Collective + ?Sized> Collective for &T {
    fn broadcast(
        &self,
        ctx: &WorkerContext,
        iteration: usize,
        state: &mut CentroidState,
    ) -> Result<(), SyncError> {
        (**self).broadcast(ctx, iteration, state)
    }

    fn reduce(
        &self,
        ctx: &WorkerContext,
        iteration: usize,
        local: LocalAccumulator,
    ) -> Result<Option<LocalAccumulator>, SyncError> {
        (**self).reduce(ctx, iteration, local)
    }
}

/// The only worker is the root.
#[derive(Debug, Default, Clone, Copy)]
pub struct Solo;

impl Collective for Solo {
    fn broadcast(
        &self,
        _ctx: &WorkerContext,
        _iteration: usize,
        _state: &mut CentroidState,
    ) -> Result<(), SyncError> {
        Ok(())
    }

    fn reduce(
        &self,
        _ctx: &WorkerContext,
        _iteration: usize,
        local: LocalAccumulator,
    ) -> Result<Option<LocalAccumulator>, SyncError> {
        Ok(Some(local))
    }
}

struct MergeState {
    total: LocalAccumulator,
    /// Last iteration each rank contributed to.
    contributed: Vec<Option<usize>>,
    fault: Option<SyncError>,
}

/// Shared-memory collective. One instance is shared by reference between all
/// worker threads.
///
/// Synchronization points per iteration:
/// 1. barrier once every worker has finished its local accumulation,
/// 2. each worker adds its accumulator to the running total under the mutex,
/// 3. barrier before the root takes the total and recomputes,
/// 4. barrier after the root publishes the new snapshot, before anyone reads it.
pub struct SharedCollective {
    clusters: usize,
    barrier: Barrier,
    merge: Mutex<MergeState>,
    published: RwLock<Option<CentroidState>>,
}

impl SharedCollective {
    pub fn new(size: usize, clusters: usize) -> SharedCollective {
        SharedCollective {
            clusters,
            barrier: Barrier::new(size),
            merge: Mutex::new(MergeState {
                total: LocalAccumulator::zeroed(clusters),
                contributed: vec![None; size],
                fault: None,
            }),
            published: RwLock::new(None),
        }
    }
}

impl Collective for SharedCollective {
    fn broadcast(
        &self,
        ctx: &WorkerContext,
        iteration: usize,
        state: &mut CentroidState,
    ) -> Result<(), SyncError> {
        if ctx.is_root() {
            *self.published.write() = Some(state.clone());
        }

        self.barrier.wait();

        if !ctx.is_root() {
            *state = self.published.read().clone().ok_or(SyncError::NoRoot)?;
        }
        trace!(rank = ctx.rank, iteration, version = state.version(), "snapshot visible");
        Ok(())
    }

    fn reduce(
        &self,
        ctx: &WorkerContext,
        iteration: usize,
        local: LocalAccumulator,
    ) -> Result<Option<LocalAccumulator>, SyncError> {
        self.barrier.wait();

        {
            let mut merge = self.merge.lock();
            if merge.contributed[ctx.rank] == Some(iteration) {
                merge.fault.get_or_insert(SyncError::DuplicateContribution {
                    rank: ctx.rank,
                    iteration,
                });
            } else {
                merge.contributed[ctx.rank] = Some(iteration);
                merge.total.merge(&local);
            }
        }

        self.barrier.wait();

        // Every worker reaches the same verdict from the same shared record,
        // so either all of them fail here or none do. `contributed` is not
        // touched again until everyone has passed the next iteration's first
        // barrier.
        let mut merge = self.merge.lock();
        if let Some(fault) = &merge.fault {
            return Err(fault.clone());
        }
        let stray = merge
            .contributed
            .iter()
            .enumerate()
            .find_map(|(rank, it)| match *it {
                Some(got) if got != iteration => Some((rank, got)),
                _ => None,
            });
        if let Some((rank, got)) = stray {
            return Err(SyncError::OutOfStep {
                rank,
                expected: iteration,
                got,
            });
        }

        if ctx.is_root() {
            let total = std::mem::replace(
                &mut merge.total,
                LocalAccumulator::zeroed(self.clusters),
            );
            Ok(Some(total))
        } else {
            Ok(None)
        }
    }
}

/// Positions as sent from the root. Accumulated totals stay on the root.
#[derive(Debug, Clone)]
struct Positions {
    iteration: usize,
    version: u64,
    positions: Vec<Point>,
}

#[derive(Debug, Clone)]
struct Contribution {
    iteration: usize,
    local: LocalAccumulator,
}

struct Link {
    rank: usize,
    down: Sender<Positions>,
    up: Receiver<Contribution>,
}

enum Role {
    Root { links: Vec<Link> },
    Leaf {
        down: Receiver<Positions>,
        up: Sender<Contribution>,
    },
}

/// One worker's endpoint in a message-passing run. Endpoints own no shared
/// mutable state; dropping one (for instance when its worker fails) surfaces as
/// [`SyncError::Disconnected`] on the other side.
pub struct ChannelCollective {
    rank: usize,
    clusters: usize,
    role: Role,
}

impl ChannelCollective {
    /// Endpoints for ranks `0..size`, in rank order. Rank 0 is the root.
    pub fn mesh(size: usize, clusters: usize) -> Vec<ChannelCollective> {
        let mut links = Vec::with_capacity(size.saturating_sub(1));
        let mut leaves = Vec::with_capacity(size.saturating_sub(1));

        for rank in 1..size {
            let (down_tx, down_rx) = bounded(1);
            let (up_tx, up_rx) = bounded(1);
            links.push(Link {
                rank,
                down: down_tx,
                up: up_rx,
            });
            leaves.push(ChannelCollective {
                rank,
                clusters,
                role: Role::Leaf {
                    down: down_rx,
                    up: up_tx,
                },
            });
        }

        let root = ChannelCollective {
            rank: WorkerContext::ROOT,
            clusters,
            role: Role::Root { links },
        };
        std::iter::once(root).chain(leaves).collect()
    }
}

impl Collective for ChannelCollective {
    fn broadcast(
        &self,
        ctx: &WorkerContext,
        iteration: usize,
        state: &mut CentroidState,
    ) -> Result<(), SyncError> {
        debug_assert_eq!(ctx.rank, self.rank);

        match &self.role {
            Role::Root { links } => {
                let message = Positions {
                    iteration,
                    version: state.version(),
                    positions: state.positions(),
                };
                for link in links {
                    link.down
                        .send(message.clone())
                        .map_err(|_| SyncError::Disconnected { rank: link.rank })?;
                }
            }
            Role::Leaf { down, .. } => {
                let message = down.recv().map_err(|_| SyncError::Disconnected {
                    rank: WorkerContext::ROOT,
                })?;
                if message.iteration != iteration {
                    return Err(SyncError::OutOfStep {
                        rank: WorkerContext::ROOT,
                        expected: iteration,
                        got: message.iteration,
                    });
                }
                *state = CentroidState::replica(message.version, message.positions);
            }
        }
        trace!(rank = self.rank, iteration, version = state.version(), "snapshot visible");
        Ok(())
    }

    fn reduce(
        &self,
        ctx: &WorkerContext,
        iteration: usize,
        local: LocalAccumulator,
    ) -> Result<Option<LocalAccumulator>, SyncError> {
        debug_assert_eq!(ctx.rank, self.rank);

        match &self.role {
            Role::Root { links } => {
                // Fold in rank order so the result does not depend on who
                // answered first.
                let mut total = LocalAccumulator::zeroed(self.clusters);
                total.merge(&local);
                for link in links {
                    let message = link
                        .up
                        .recv()
                        .map_err(|_| SyncError::Disconnected { rank: link.rank })?;
                    if message.iteration != iteration {
                        return Err(SyncError::OutOfStep {
                            rank: link.rank,
                            expected: iteration,
                            got: message.iteration,
                        });
                    }
                    total.merge(&message.local);
                }
                Ok(Some(total))
            }
            Role::Leaf { up, .. } => {
                up.send(Contribution { iteration, local })
                    .map_err(|_| SyncError::Disconnected {
                        rank: WorkerContext::ROOT,
                    })?;
                Ok(None)
            }
        }
    }
}
