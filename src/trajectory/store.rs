use log::{debug, warn};
use nalgebra::Vector6;

use crate::core::{
    error::{OdometryError, Result},
    params::{ExtrapolationPolicy, TransformerParams},
    variable::twist_from_params,
};
use crate::slam::se3::{self, SE3};

/// Pose and body twist of the trajectory at one knot.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionKnot {
    pub pose: SE3,
    pub vel: Vector6<f64>,
}

impl Default for MotionKnot {
    fn default() -> Self {
        MotionKnot {
            pose: SE3::identity(),
            vel: Vector6::zeros(),
        }
    }
}

impl MotionKnot {
    pub fn new(pose: SE3, vel: Vector6<f64>) -> Self {
        MotionKnot { pose, vel }
    }
    /// Copies raw solver parameter blocks into a knot. The pose block holds
    /// the exponential coordinates of the pose.
    pub fn from_params(pose: &[f64], vel: &[f64]) -> Result<Self> {
        Ok(MotionKnot {
            pose: se3::exp(&twist_from_params(pose)?),
            vel: twist_from_params(vel)?,
        })
    }
    /// Inverse of [`MotionKnot::from_params`].
    pub fn to_params(&self) -> ([f64; 6], [f64; 6]) {
        let mut pose = [0.0; 6];
        let mut vel = [0.0; 6];
        pose.copy_from_slice(se3::log(&self.pose).as_slice());
        vel.copy_from_slice(self.vel.as_slice());
        (pose, vel)
    }
}

/// Segment bracketing a query time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// index of the segment start knot
    pub index: usize,
    /// normalized time in `[0, 1]`
    pub s: f64,
    /// segment duration
    pub duration: f64,
}

/// Ordered motion knots of the current scan batch. Replaced wholesale by
/// [`TrajectoryStore::update`], read-only in between.
#[derive(Debug, Clone)]
pub struct TrajectoryStore {
    params: TransformerParams,
    knots: Vec<MotionKnot>,
    stamps: Vec<f64>,
}

impl TrajectoryStore {
    pub fn new(params: TransformerParams) -> Result<Self> {
        params.validate()?;
        Ok(TrajectoryStore {
            params,
            knots: Vec::new(),
            stamps: Vec::new(),
        })
    }

    pub fn params(&self) -> &TransformerParams {
        &self.params
    }

    pub fn update(&mut self, knots: Vec<MotionKnot>, stamps: Vec<f64>) -> Result<()> {
        let expected = self.params.knot_count();
        if knots.len() != expected || stamps.len() != expected {
            return Err(OdometryError::Config(format!(
                "expected {} knots and stamps for {} scans at resolution {}, got {} knots and {} stamps",
                expected,
                self.params.n_scans,
                self.params.traj_resolution,
                knots.len(),
                stamps.len()
            )));
        }
        if let Some(i) = stamps.iter().position(|t| !t.is_finite()) {
            return Err(OdometryError::Config(format!("stamp {} is not finite", i)));
        }
        if let Some(i) = stamps.windows(2).position(|w| w[1] <= w[0]) {
            return Err(OdometryError::Config(format!(
                "stamps not strictly increasing at knot {}: {} -> {}",
                i + 1,
                stamps[i],
                stamps[i + 1]
            )));
        }
        debug!(
            "trajectory updated: {} knots over [{}, {}]",
            knots.len(),
            stamps[0],
            stamps[expected - 1]
        );
        self.knots = knots;
        self.stamps = stamps;
        Ok(())
    }

    /// Bracketing segment of `t`, honoring the configured extrapolation policy.
    pub fn lookup(&self, t: f64) -> Result<Segment> {
        let (first, last) = self.span()?;
        let mut time = t;
        if t.is_nan() || t < first || t > last {
            match self.params.extrapolation {
                ExtrapolationPolicy::Clamp if !t.is_nan() => {
                    warn!("time {} clamped to trajectory span [{}, {}]", t, first, last);
                    time = t.clamp(first, last);
                }
                _ => {
                    return Err(OdometryError::OutOfRange {
                        time: t,
                        first,
                        last,
                    })
                }
            }
        }
        let index = self
            .stamps
            .partition_point(|&x| x <= time)
            .saturating_sub(1)
            .min(self.stamps.len() - 2);
        let duration = self.stamps[index + 1] - self.stamps[index];
        let s = ((time - self.stamps[index]) / duration).clamp(0.0, 1.0);
        Ok(Segment { index, s, duration })
    }

    pub fn knot(&self, i: usize) -> Option<&MotionKnot> {
        self.knots.get(i)
    }
    pub fn stamp(&self, i: usize) -> Option<f64> {
        self.stamps.get(i).copied()
    }
    pub fn knots(&self) -> &[MotionKnot] {
        &self.knots
    }
    pub fn len(&self) -> usize {
        self.knots.len()
    }
    pub fn is_empty(&self) -> bool {
        self.knots.is_empty()
    }
    /// First and last stamp.
    pub fn span(&self) -> Result<(f64, f64)> {
        match (self.stamps.first(), self.stamps.last()) {
            (Some(first), Some(last)) => Ok((*first, *last)),
            _ => Err(OdometryError::Config(
                "trajectory queried before update".into(),
            )),
        }
    }

    fn check_scan(&self, scan: usize) -> Result<()> {
        if scan >= self.params.n_scans {
            return Err(OdometryError::Config(format!(
                "scan index {} outside of batch of {} scans",
                scan, self.params.n_scans
            )));
        }
        Ok(())
    }
    /// Knot at the beginning of `scan`.
    pub fn scan_start_knot(&self, scan: usize) -> Result<usize> {
        self.check_scan(scan)?;
        Ok(scan * self.params.segments_per_scan())
    }
    /// Knot at the end of `scan`, shared with the start of `scan + 1`.
    pub fn scan_end_knot(&self, scan: usize) -> Result<usize> {
        self.check_scan(scan)?;
        Ok((scan + 1) * self.params.segments_per_scan())
    }
}
