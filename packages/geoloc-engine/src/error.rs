use thiserror::Error;

/// Errors surfaced to callers of the engine API.
#[derive(Debug, Error)]
pub enum GeolocationError {
    /// A transaction was handed fewer than three uplinks.
    #[error("a transaction needs at least 3 uplinks, got {0}")]
    InsufficientReceivers(usize),

    /// An estimator selector string outside the permitted set.
    #[error("unknown algorithm selector `{0}`")]
    UnknownAlgorithm(String),
}

/// Why a single burst produced no fix. Never fatal to a device run: the
/// driver counts the burst and walks on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SolveFailure {
    /// The estimator needs more receivers than the burst carries.
    #[error("not enough receivers for this estimator")]
    InsufficientReceivers,

    /// A linear system degenerated; nothing to invert.
    #[error("singular system")]
    Singular,

    /// The iterative estimator exhausted its iteration and reseed budget.
    #[error("no convergence")]
    NoConvergence,

    /// The quadratic in the source distance has no usable real root.
    #[error("no real solution")]
    NoRealSolution,

    /// The estimator is accepted as a selector but yields no position.
    #[error("estimator yields no fix")]
    NoFix,
}
