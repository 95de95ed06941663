use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration errors. Any of these is fatal: no station
/// can be validly processed with malformed thresholds.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("huber threshold must be positive")]
    NonPositiveHuber,
    #[error("huber power must be positive")]
    NonPositiveHuberPower,
    #[error("maximal code position difference must be positive")]
    NonPositivePositionDiff,
    #[error("gross outlier factor must be positive")]
    NonPositiveGrossOutlierFactor,
    #[error("denoising lambda must not be negative")]
    NegativeDenoisingLambda,
    #[error("tec sigma factor must be positive")]
    NonPositiveTecSigmaFactor,
    #[error("minimal number of observations per track must be at least 2")]
    MinObsCountPerTrack,
    #[error("invalid elevation angle {0}°")]
    InvalidElevation(f64),
    #[error("estimable epochs ratio must lie within [0, 1], got {0}")]
    InvalidRatio(f64),
    #[error("robust estimation requires at least one iteration")]
    NoIterations,
    #[error("invalid observation type pattern \"{0}\"")]
    InvalidTypePattern(String),
}

/// Fatal errors, terminating the whole run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("time axis must be a non empty, strictly increasing sequence of epochs")]
    InvalidTimeAxis,
    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
    #[error("at least one worker is required")]
    NoWorkers,
    #[error("reduction mismatch: expected {expected} values, got {found}")]
    ReductionMismatch { expected: usize, found: usize },
    #[error("workers do not share the same global state after broadcast")]
    InconsistentBroadcast,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reason for disabling a station. These are local data defects,
/// recovered by disabling the station and continuing the run.
#[derive(Debug, Clone, PartialEq, Error)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DisableReason {
    #[error("no observations")]
    NoObservations,
    #[error("no track survived segmentation")]
    NoTracks,
    #[error("{usable}/{total} estimable epochs: ratio below threshold")]
    InsufficientEpochs { usable: usize, total: usize },
    #[error("unable to read signal bias file \"{0}\"")]
    MissingSignalBias(String),
    #[error("unreadable data: {0}")]
    Unreadable(String),
    #[error("no acceptable alternative")]
    NoAlternative,
}
