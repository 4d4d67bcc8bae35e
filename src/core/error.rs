use thiserror::Error;

use super::key::StateKey;

/// Errors raised by the trajectory store, the interpolator and the residuals.
///
/// `Config` and `CacheMismatch` abort the enclosing operation. `OutOfRange`
/// and `DegenerateGeometry` concern a single point or residual, so the caller
/// can drop that term and keep optimizing the rest.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OdometryError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("time {time} outside of trajectory span [{first}, {last}]")]
    OutOfRange { time: f64, first: f64, last: f64 },
    #[error("degenerate correspondence geometry: {0}")]
    DegenerateGeometry(&'static str),
    #[error("dimension mismatch: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("no precomputed jacobian for point {point} and state {key}")]
    CacheMismatch { point: usize, key: StateKey },
}

pub type Result<T> = std::result::Result<T, OdometryError>;
