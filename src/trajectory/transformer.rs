use log::{debug, warn};
use nalgebra::{Matrix3, Matrix3xX, Matrix4xX, Matrix6, Vector3, Vector6};

use crate::core::{
    error::{OdometryError, Result},
    jacobian_cache::{JacobianCache, JacobianCacheBuilder, PrecomputedPoints},
    key::StateKey,
    params::TransformerParams,
};
use crate::slam::{
    implicit_line::ImplicitLine,
    point_to_line::PointToLine,
    point_to_plane::PointToPlane,
    se3::{self, SE3},
};

use super::{
    interpolation::{SegmentBlend, SegmentLocal},
    store::{MotionKnot, Segment, TrajectoryStore},
};

/// Reference frame of an undistorted scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanFrame {
    /// pose of the knot opening the scan
    Start,
    /// pose of the knot closing the scan
    End,
}

/// Trajectory state at an arbitrary time.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolatedState {
    pub pose: SE3,
    pub vel: Vector6<f64>,
}

/// Continuous-time trajectory over a batch of scans. Undistorts scans and
/// precomputes the derivatives of every undistorted point w.r.t. the knots.
#[derive(Debug, Clone)]
pub struct Transformer {
    store: TrajectoryStore,
}

impl Transformer {
    pub fn new(params: TransformerParams) -> Result<Self> {
        Ok(Transformer {
            store: TrajectoryStore::new(params)?,
        })
    }
    pub fn params(&self) -> &TransformerParams {
        self.store.params()
    }
    pub fn store(&self) -> &TrajectoryStore {
        &self.store
    }
    /// Replaces the trajectory. See [`TrajectoryStore::update`].
    pub fn update(&mut self, knots: Vec<MotionKnot>, stamps: Vec<f64>) -> Result<()> {
        self.store.update(knots, stamps)
    }

    fn segment(&self, seg: &Segment) -> (&MotionKnot, SegmentLocal) {
        let knots = self.store.knots();
        let start = &knots[seg.index];
        let end = &knots[seg.index + 1];
        (
            start,
            SegmentLocal::new(&start.pose, &start.vel, &end.pose, &end.vel),
        )
    }

    pub fn interpolate(&self, t: f64) -> Result<InterpolatedState> {
        let seg = self.store.lookup(t)?;
        let (start, local) = self.segment(&seg);
        let blend = SegmentBlend::new(seg.s, seg.duration);
        let xi = local.xi(&blend);
        Ok(InterpolatedState {
            pose: se3::exp(&xi) * start.pose,
            vel: se3::left_jacobian(&xi) * local.xi_dot(&blend),
        })
    }

    /// Knot a scan is expressed in, and the stamp the point offsets count from.
    fn scan_reference(&self, scan_index: usize, frame: ScanFrame) -> Result<(usize, f64)> {
        let start = self.store.scan_start_knot(scan_index)?;
        let reference = match frame {
            ScanFrame::Start => start,
            ScanFrame::End => self.store.scan_end_knot(scan_index)?,
        };
        let t0 = self.store.stamp(start).ok_or_else(|| {
            OdometryError::Config("trajectory queried before update".into())
        })?;
        Ok((reference, t0))
    }

    fn knot_pose(&self, i: usize) -> Result<&SE3> {
        self.store.knot(i).map(|k| &k.pose).ok_or_else(|| {
            OdometryError::Config(format!(
                "knot {} outside of trajectory of {} knots",
                i,
                self.store.len()
            ))
        })
    }

    fn transform_to(
        &self,
        scan: &Matrix4xX<f64>,
        scan_index: usize,
        frame: ScanFrame,
    ) -> Result<Matrix3xX<f64>> {
        let (reference, t0) = self.scan_reference(scan_index, frame)?;
        let reference_inv = self.knot_pose(reference)?.inverse();
        let mut out = Matrix3xX::zeros(scan.ncols());
        for (i, col) in scan.column_iter().enumerate() {
            let state = self.interpolate(t0 + col[3])?;
            let p = Vector3::new(col[0], col[1], col[2]);
            out.set_column(i, &se3::transform(&(reference_inv * state.pose), &p));
        }
        Ok(out)
    }

    /// Undistorts `scan` into the frame of its start knot.
    pub fn transform_to_start(
        &self,
        scan: &Matrix4xX<f64>,
        scan_index: usize,
    ) -> Result<Matrix3xX<f64>> {
        self.transform_to(scan, scan_index, ScanFrame::Start)
    }

    /// Undistorts `scan` into the frame of its end knot.
    pub fn transform_to_end(
        &self,
        scan: &Matrix4xX<f64>,
        scan_index: usize,
    ) -> Result<Matrix3xX<f64>> {
        self.transform_to(scan, scan_index, ScanFrame::End)
    }

    /// Moves already undistorted points from the frame of knot `i` to the
    /// frame of knot `j`: $T_j^{-1} T_i p$.
    pub fn constant_transform(
        &self,
        i: usize,
        j: usize,
        points: &Matrix3xX<f64>,
    ) -> Result<Matrix3xX<f64>> {
        let relative = self.knot_pose(j)?.inverse() * self.knot_pose(i)?;
        let mut out = points.clone();
        for mut col in out.column_iter_mut() {
            let p = se3::transform(&relative, &col.clone_owned());
            col.copy_from(&p);
        }
        Ok(out)
    }

    /// Undistorts `scan` into `frame` and records, per point, the derivative
    /// of the undistorted position w.r.t. every state block it depends on.
    ///
    /// Points outside the trajectory span are kept as per-point errors.
    pub fn precompute(
        &self,
        scan: &Matrix4xX<f64>,
        scan_index: usize,
        frame: ScanFrame,
    ) -> Result<PrecomputedScan> {
        let (reference, t0) = self.scan_reference(scan_index, frame)?;
        let reference_inv = self.knot_pose(reference)?.inverse();
        let r_inv = reference_inv.rotation.to_rotation_matrix().into_inner();
        let mut builder = JacobianCacheBuilder::new(scan.ncols());
        let mut points = Vec::with_capacity(scan.ncols());
        let mut gamma_derivatives: Vec<Option<Matrix6<f64>>> = vec![None; self.store.len()];
        let mut dropped = 0;

        for (i, col) in scan.column_iter().enumerate() {
            let seg = match self.store.lookup(t0 + col[3]) {
                Ok(seg) => seg,
                Err(err) => {
                    dropped += 1;
                    points.push(Err(err));
                    continue;
                }
            };
            let (start, local) = self.segment(&seg);
            let blend = SegmentBlend::new(seg.s, seg.duration);
            let xi = local.xi(&blend);
            let exp_xi = se3::exp(&xi);

            let w = se3::transform(&start.pose, &Vector3::new(col[0], col[1], col[2]));
            let q = se3::transform(&exp_xi, &w);
            points.push(Ok(se3::transform(&reference_inv, &q)));

            let r_xi: Matrix3<f64> = exp_xi.rotation.to_rotation_matrix().into_inner();
            let d = r_inv * se3::point_jacobian(&q) * se3::left_jacobian(&xi);
            let k = seg.index;
            let dgamma = *gamma_derivatives[k].get_or_insert_with(|| local.gamma_end_derivative());
            // d xi / d xi_{k+1}, through both xi_{k+1} and gamma_{k+1}
            let d_end = d * (Matrix6::identity() * blend.psi[(0, 0)] + dgamma * blend.psi[(0, 1)]);

            let pose_k = r_inv * r_xi * se3::point_jacobian(&w)
                - d_end * se3::left_jacobian_inverse(&(-local.xi_end));
            builder.accumulate(i, StateKey::pose(k), &pose_k)?;
            builder.accumulate(i, StateKey::pose(k + 1), &(d_end * local.jinv_end))?;
            builder.accumulate(i, StateKey::velocity(k), &(d * blend.lambda[(0, 1)]))?;
            builder.accumulate(
                i,
                StateKey::velocity(k + 1),
                &(d * local.jinv_end * blend.psi[(0, 1)]),
            )?;
            builder.accumulate(
                i,
                StateKey::pose(reference),
                &(-(r_inv * se3::point_jacobian(&q))),
            )?;
        }
        if dropped > 0 {
            warn!(
                "scan {}: {} of {} points outside of trajectory span",
                scan_index,
                dropped,
                scan.ncols()
            );
        }
        debug!(
            "precomputed scan {} in {:?} frame: {} points",
            scan_index,
            frame,
            scan.ncols()
        );
        Ok(PrecomputedScan {
            frame,
            scan_index,
            reference,
            points,
            cache: builder.freeze(),
        })
    }
}

/// Residual constructors weighted according to [`TransformerParams::use_weighting`].
impl Transformer {
    pub fn point_to_plane(
        &self,
        point: usize,
        a: &Vector3<f64>,
        b: &Vector3<f64>,
        c: &Vector3<f64>,
        cov_z: &Matrix3<f64>,
    ) -> Result<PointToPlane> {
        PointToPlane::new(point, a, b, c, cov_z, self.params().use_weighting)
    }

    pub fn point_to_line(
        &self,
        point: usize,
        a: &Vector3<f64>,
        b: &Vector3<f64>,
        cov_z: &Matrix3<f64>,
    ) -> Result<PointToLine> {
        PointToLine::new(point, a, b, cov_z, self.params().use_weighting)
    }

    pub fn implicit_line(&self, points: Vec<usize>, cov_z: &Matrix3<f64>) -> Result<ImplicitLine> {
        ImplicitLine::new(points, cov_z, self.params().use_weighting)
    }
}

/// Output of [`Transformer::precompute`]. Read-only; shared by reference
/// with every residual evaluated against this scan.
#[derive(Debug, Clone)]
pub struct PrecomputedScan {
    pub frame: ScanFrame,
    pub scan_index: usize,
    /// knot whose pose defines `frame`
    pub reference: usize,
    points: Vec<Result<Vector3<f64>>>,
    cache: JacobianCache,
}

impl PrecomputedScan {
    pub fn len(&self) -> usize {
        self.points.len()
    }
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
    /// State blocks `point` depends on, in key order.
    pub fn keys(&self, point: usize) -> Vec<StateKey> {
        self.cache.keys(point)
    }
    /// State blocks any of `points` depends on, in key order.
    pub fn track_keys(&self, points: &[usize]) -> Vec<StateKey> {
        let mut keys: Vec<StateKey> = points.iter().flat_map(|&p| self.cache.keys(p)).collect();
        keys.sort();
        keys.dedup();
        keys
    }
    pub fn jacobians(&self) -> &JacobianCache {
        &self.cache
    }
    /// Undistorted points, or the error that prevented undistorting them.
    pub fn transformed(&self) -> &[Result<Vector3<f64>>] {
        &self.points
    }
}

impl PrecomputedPoints for PrecomputedScan {
    fn point(&self, point: usize) -> Result<Vector3<f64>> {
        match self.points.get(point) {
            Some(p) => p.clone(),
            None => Err(OdometryError::Config(format!(
                "point {} outside of scan of {} points",
                point,
                self.points.len()
            ))),
        }
    }
    fn jacobian(&self, point: usize, key: StateKey) -> Option<&Matrix3xX<f64>> {
        self.cache.get(point, key)
    }
}

#[cfg(test)]
mod tests {
    use matrixcompare::assert_matrix_eq;

    use super::*;
    use crate::core::params::ExtrapolationPolicy;

    fn params() -> TransformerParams {
        TransformerParams {
            n_scans: 2,
            traj_resolution: 3,
            extrapolation: ExtrapolationPolicy::Reject,
            use_weighting: false,
        }
    }

    fn transformer() -> Transformer {
        let mut tf = Transformer::new(params()).unwrap();
        let vels = [
            Vector6::new(0.0, 0.0, 1.0, 1.0, 0.0, 0.0),
            Vector6::new(0.1, 0.0, 0.8, 1.2, 0.1, 0.0),
            Vector6::new(0.0, -0.2, 0.5, 0.9, 0.0, 0.3),
            Vector6::new(0.0, 0.0, -0.5, 1.0, -0.4, 0.0),
            Vector6::new(0.2, 0.0, 0.0, 0.5, 0.0, 0.0),
        ];
        let stamps: Vec<f64> = (0..5).map(|i| i as f64 * 0.1).collect();
        let mut pose = se3::exp(&Vector6::new(0.1, 0.2, -0.3, 1.0, -2.0, 0.5));
        let mut knots = Vec::new();
        for (i, vel) in vels.iter().enumerate() {
            knots.push(MotionKnot::new(pose, *vel));
            if i + 1 < vels.len() {
                pose = se3::exp(&(vel * 0.1)) * pose;
            }
        }
        tf.update(knots, stamps).unwrap();
        tf
    }

    #[test]
    fn invalid_params() {
        let mut p = params();
        p.traj_resolution = 1;
        assert!(matches!(
            Transformer::new(p),
            Err(OdometryError::Config(_))
        ));
    }

    #[test]
    fn interpolate_reproduces_knots() {
        let tf = transformer();
        for i in 0..tf.store().len() {
            let knot = tf.store().knot(i).unwrap();
            let state = tf.interpolate(tf.store().stamp(i).unwrap()).unwrap();
            assert_matrix_eq!(
                state.pose.to_homogeneous(),
                knot.pose.to_homogeneous(),
                comp = abs,
                tol = 1e-12
            );
            assert_matrix_eq!(state.vel, knot.vel, comp = abs, tol = 1e-12);
        }
    }

    #[test]
    fn interpolated_velocity_is_pose_derivative() {
        let tf = transformer();
        let h = 1e-6;
        for t in [0.03, 0.17, 0.25, 0.38] {
            let state = tf.interpolate(t).unwrap();
            let ahead = tf.interpolate(t + h).unwrap();
            let behind = tf.interpolate(t - h).unwrap();
            let numeric = (se3::log(&(ahead.pose * state.pose.inverse()))
                - se3::log(&(behind.pose * state.pose.inverse())))
                / (2.0 * h);
            assert_matrix_eq!(numeric, state.vel, comp = abs, tol = 1e-5);
        }
    }

    #[test]
    fn start_and_end_frames_agree() {
        let tf = transformer();
        let scan = Matrix4xX::from_fn(20, |r, c| match r {
            0 => (c as f64 * 0.3).cos(),
            1 => (c as f64 * 0.3).sin(),
            2 => 0.1 * c as f64,
            _ => c as f64 * 0.01,
        });
        let start = tf.transform_to_start(&scan, 1).unwrap();
        let end = tf.transform_to_end(&scan, 1).unwrap();
        let moved = tf.constant_transform(2, 4, &start).unwrap();
        assert_matrix_eq!(moved, end, comp = abs, tol = 1e-9);
    }

    #[test]
    fn out_of_range_points() {
        let tf = transformer();
        let mut scan = Matrix4xX::zeros(3);
        scan[(0, 0)] = 1.0;
        scan[(3, 1)] = 0.5;
        scan[(3, 2)] = 0.1;
        assert!(matches!(
            tf.transform_to_start(&scan, 1),
            Err(OdometryError::OutOfRange { .. })
        ));
        let pre = tf.precompute(&scan, 1, ScanFrame::Start).unwrap();
        assert_eq!(pre.len(), 3);
        assert!(pre.point(0).is_ok());
        assert!(matches!(
            pre.point(1),
            Err(OdometryError::OutOfRange { .. })
        ));
        assert!(pre.keys(1).is_empty());
        assert!(matches!(pre.point(3), Err(OdometryError::Config(_))));
    }

    #[test]
    fn precompute_keys() {
        let tf = transformer();
        let mut scan = Matrix4xX::zeros(2);
        scan[(3, 0)] = 0.05;
        scan[(3, 1)] = 0.15;
        // end frame of scan 0 is knot 2
        let pre = tf.precompute(&scan, 0, ScanFrame::End).unwrap();
        assert_eq!(pre.reference, 2);
        assert_eq!(
            pre.keys(0),
            vec![
                StateKey::pose(0),
                StateKey::velocity(0),
                StateKey::pose(1),
                StateKey::velocity(1),
                StateKey::pose(2),
            ]
        );
        assert_eq!(
            pre.keys(1),
            vec![
                StateKey::pose(1),
                StateKey::velocity(1),
                StateKey::pose(2),
                StateKey::velocity(2),
            ]
        );
    }

    #[test]
    fn track_keys_merge_points() {
        let tf = transformer();
        let mut scan = Matrix4xX::zeros(2);
        scan[(3, 0)] = 0.05;
        scan[(3, 1)] = 0.15;
        let pre = tf.precompute(&scan, 0, ScanFrame::End).unwrap();
        let keys = pre.track_keys(&[1, 0, 1]);
        assert_eq!(keys.len(), 6);
        assert_eq!(keys.first(), Some(&StateKey::pose(0)));
        assert_eq!(keys.last(), Some(&StateKey::velocity(2)));
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn residual_weighting_follows_params() {
        let cov = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, 0.25));
        let a = Vector3::new(0.0, 0.0, 0.0);
        let b = Vector3::new(2.0, 0.0, 0.0);
        let c = Vector3::new(0.0, 3.0, 0.0);
        let plain = Transformer::new(params()).unwrap();
        let mut weighted = params();
        weighted.use_weighting = true;
        let weighted = Transformer::new(weighted).unwrap();
        assert_eq!(plain.point_to_plane(0, &a, &b, &c, &cov).unwrap().weight(), 1.0);
        let w = weighted.point_to_plane(0, &a, &b, &c, &cov).unwrap().weight();
        assert!((w - 2.0).abs() < 1e-12);
    }

    #[test]
    fn precompute_matches_transform() {
        let tf = transformer();
        let scan = Matrix4xX::from_fn(7, |r, c| match r {
            3 => c as f64 * 0.03,
            _ => (r + c) as f64 * 0.5 - 1.0,
        });
        let points = tf.transform_to_end(&scan, 0).unwrap();
        let pre = tf.precompute(&scan, 0, ScanFrame::End).unwrap();
        for i in 0..points.ncols() {
            assert_matrix_eq!(
                pre.point(i).unwrap(),
                points.column(i).clone_owned(),
                comp = abs,
                tol = 1e-12
            );
        }
    }
}
