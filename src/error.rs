use thiserror::Error;

/// Problems with the supplied points. Detected before any worker starts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("Please provide the points as arguments...")]
    Empty,

    #[error("An argument is invalid: {arg:?}")]
    Malformed { arg: String },

    #[error("{points} point(s) cannot seed {clusters} cluster(s)")]
    TooFewPoints { points: usize, clusters: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cluster count must be at least 1")]
    ZeroClusters,

    #[error("worker count must be at least 1")]
    ZeroWorkers,
}

/// A worker failed to take part in a collective. There is no recovery from
/// any of these: the run is abandoned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("worker {rank} lost its connection to the collective")]
    Disconnected { rank: usize },

    #[error("worker {rank} is out of step: expected iteration {expected}, got {got}")]
    OutOfStep {
        rank: usize,
        expected: usize,
        got: usize,
    },

    #[error("worker {rank} contributed twice in iteration {iteration}")]
    DuplicateContribution { rank: usize, iteration: usize },


    #[error("worker {rank} panicked")]
    WorkerPanicked { rank: usize },

    #[error("no worker reported a final state")]
    NoRoot,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}
