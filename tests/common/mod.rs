#![allow(dead_code)]

use lidar_odom::{
    prelude::{ExtrapolationPolicy, MotionKnot, Transformer, TransformerParams},
    slam::se3,
};
use nalgebra::{Matrix4xX, Vector6};

pub const KNOT_SPACING: f64 = 0.1;

pub fn params(n_scans: usize, traj_resolution: usize) -> TransformerParams {
    TransformerParams {
        n_scans,
        traj_resolution,
        extrapolation: ExtrapolationPolicy::Reject,
        use_weighting: true,
    }
}

/// Knots integrated from `vel(k)` at a constant knot spacing.
pub fn knots(count: usize, vel: impl Fn(usize) -> Vector6<f64>) -> (Vec<MotionKnot>, Vec<f64>) {
    let mut pose = se3::exp(&Vector6::new(0.05, -0.1, 0.2, 0.5, -1.0, 2.0));
    let mut knots = Vec::with_capacity(count);
    for k in 0..count {
        let v = vel(k);
        knots.push(MotionKnot::new(pose, v));
        pose = se3::exp(&(v * KNOT_SPACING)) * pose;
    }
    let stamps = (0..count).map(|k| k as f64 * KNOT_SPACING).collect();
    (knots, stamps)
}

/// Velocity alternating between scans: +3/-3 on the lateral axis.
pub fn alternating_velocity(traj_resolution: usize) -> impl Fn(usize) -> Vector6<f64> {
    move |k| {
        let scan = k / (traj_resolution - 1);
        let sign = if scan % 2 == 0 { 1.0 } else { -1.0 };
        Vector6::new(0.0, 0.0, 0.0, 3.0, sign * 3.0, 0.0)
    }
}

pub fn transformer(
    params: TransformerParams,
    vel: impl Fn(usize) -> Vector6<f64>,
) -> Transformer {
    let (knots, stamps) = knots(params.knot_count(), vel);
    let mut tf = Transformer::new(params).unwrap();
    tf.update(knots, stamps).unwrap();
    tf
}

/// Unit circle of `n` points acquired at a constant rate over `duration`.
pub fn circle_scan(n: usize, duration: f64) -> Matrix4xX<f64> {
    Matrix4xX::from_fn(n, |r, c| {
        let a = c as f64 / n as f64 * std::f64::consts::TAU;
        match r {
            0 => a.cos(),
            1 => a.sin(),
            2 => 0.0,
            _ => duration * c as f64 / n as f64,
        }
    })
}
