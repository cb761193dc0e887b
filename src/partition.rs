use {
    clap::ValueEnum,
    std::{iter::StepBy, ops::Range},
};

/// Identity of one worker within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerContext {
    pub rank: usize,
    pub size: usize,
}

impl WorkerContext {
    pub const ROOT: usize = 0;

    pub fn new(rank: usize, size: usize) -> WorkerContext {
        debug_assert!(rank < size);
        WorkerContext { rank, size }
    }

    pub fn solo() -> WorkerContext {
        WorkerContext { rank: 0, size: 1 }
    }

    pub fn is_root(&self) -> bool {
        self.rank == Self::ROOT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PartitionScheme {
    /// Worker `r` owns points `r, r + size, r + 2*size, ...`
    #[default]
    Interleaved,
    /// Worker `r` owns the `r`-th of `size` near-equal contiguous blocks.
    Contiguous,
}

impl PartitionScheme {
    /// The point indices owned by `ctx` out of `len` points. Over all ranks
    /// the partitions are disjoint and cover `0..len`.
    pub fn indices(&self, ctx: &WorkerContext, len: usize) -> StepBy<Range<usize>> {
        match self {
            PartitionScheme::Interleaved => (ctx.rank.min(len)..len).step_by(ctx.size),
            PartitionScheme::Contiguous => {
                let base = len / ctx.size;
                let extra = len % ctx.size;
                let start = ctx.rank * base + ctx.rank.min(extra);
                let end = start + base + usize::from(ctx.rank < extra);
                (start..end).step_by(1)
            }
        }
    }
}
