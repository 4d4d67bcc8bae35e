use nalgebra::{Matrix2, Matrix6, Vector6};

use crate::slam::se3;

/// Segment-local blend matrices of the constant-velocity (white noise on
/// acceleration) motion prior. Every entry multiplies $I_6$.
///
/// With $\gamma = [\xi; \dot\xi]$ expressed in the tangent space of the
/// segment start knot, the interpolated local state is
/// $\gamma(s) = \Lambda(s)\gamma_k + \Psi(s)\gamma_{k+1}$.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentBlend {
    pub lambda: Matrix2<f64>,
    pub psi: Matrix2<f64>,
}

impl SegmentBlend {
    /// `s` is the normalized segment time, `duration` the segment length.
    pub fn new(s: f64, duration: f64) -> Self {
        let s2 = s * s;
        let s3 = s2 * s;
        let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
        let h10 = s3 - 2.0 * s2 + s;
        let h01 = -2.0 * s3 + 3.0 * s2;
        let h11 = s3 - s2;
        let dh00 = 6.0 * s2 - 6.0 * s;
        let dh10 = 3.0 * s2 - 4.0 * s + 1.0;
        let dh01 = -6.0 * s2 + 6.0 * s;
        let dh11 = 3.0 * s2 - 2.0 * s;
        SegmentBlend {
            lambda: Matrix2::new(h00, duration * h10, dh00 / duration, dh10),
            psi: Matrix2::new(h01, duration * h11, dh01 / duration, dh11),
        }
    }
}

/// Boundary values of a segment in the tangent space of its start knot.
#[derive(Debug, Clone)]
pub(crate) struct SegmentLocal {
    /// $\varpi_k$
    pub vel_start: Vector6<f64>,
    /// $\xi_{k+1} = \log(T_{k+1} T_k^{-1})$
    pub xi_end: Vector6<f64>,
    /// $\varpi_{k+1}$
    pub vel_end: Vector6<f64>,
    /// $J_l^{-1}(\xi_{k+1})$
    pub jinv_end: Matrix6<f64>,
    /// $\gamma_{k+1} = J_l^{-1}(\xi_{k+1}) \varpi_{k+1}$
    pub gamma_end: Vector6<f64>,
}

impl SegmentLocal {
    pub fn new(
        pose_start: &se3::SE3,
        vel_start: &Vector6<f64>,
        pose_end: &se3::SE3,
        vel_end: &Vector6<f64>,
    ) -> Self {
        let xi_end = se3::log(&(pose_end * pose_start.inverse()));
        let jinv_end = se3::left_jacobian_inverse(&xi_end);
        SegmentLocal {
            vel_start: *vel_start,
            vel_end: *vel_end,
            gamma_end: jinv_end * vel_end,
            xi_end,
            jinv_end,
        }
    }

    /// $\partial \gamma_{k+1} / \partial \xi_{k+1}$
    pub fn gamma_end_derivative(&self) -> Matrix6<f64> {
        se3::left_jacobian_inverse_derivative(&self.xi_end, &self.vel_end)
    }

    /// Local pose $\xi(s)$.
    pub fn xi(&self, blend: &SegmentBlend) -> Vector6<f64> {
        self.vel_start * blend.lambda[(0, 1)]
            + self.xi_end * blend.psi[(0, 0)]
            + self.gamma_end * blend.psi[(0, 1)]
    }

    /// Time derivative $\dot\xi(s)$.
    pub fn xi_dot(&self, blend: &SegmentBlend) -> Vector6<f64> {
        self.vel_start * blend.lambda[(1, 1)]
            + self.xi_end * blend.psi[(1, 0)]
            + self.gamma_end * blend.psi[(1, 1)]
    }
}
