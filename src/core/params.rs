use serde::{Deserialize, Serialize};

use super::error::{OdometryError, Result};

/// What to do with a query time outside of the trajectory span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtrapolationPolicy {
    /// Fail with `OdometryError::OutOfRange`.
    Reject,
    /// Clamp the time to the nearest end of the trajectory.
    Clamp,
}

/// Transformer settings. Filled by an external loader, consumed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformerParams {
    /// number of scans in one batch
    pub n_scans: usize,
    /// knots per scan, the boundary knots included
    pub traj_resolution: usize,
    pub extrapolation: ExtrapolationPolicy,
    /// weight residuals by the propagated measurement noise
    pub use_weighting: bool,
}

impl Default for TransformerParams {
    fn default() -> Self {
        TransformerParams {
            n_scans: 4,
            traj_resolution: 3,
            extrapolation: ExtrapolationPolicy::Reject,
            use_weighting: true,
        }
    }
}

impl TransformerParams {
    /// Segments spanned by a single scan.
    pub fn segments_per_scan(&self) -> usize {
        self.traj_resolution.saturating_sub(1)
    }
    /// Knot count a trajectory of this batch must have.
    pub fn knot_count(&self) -> usize {
        self.n_scans * self.segments_per_scan() + 1
    }
    pub fn validate(&self) -> Result<()> {
        if self.n_scans == 0 {
            return Err(OdometryError::Config("n_scans must be positive".into()));
        }
        if self.traj_resolution < 2 {
            return Err(OdometryError::Config(format!(
                "traj_resolution must be at least 2, got {}",
                self.traj_resolution
            )));
        }
        Ok(())
    }
}
