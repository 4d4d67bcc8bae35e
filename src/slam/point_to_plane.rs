use nalgebra::{DMatrix, Matrix3, Vector3};

use crate::core::{
    error::{OdometryError, Result},
    residual::{Residual, ResidualWorkspace},
};

use super::residual::Projection;

/// Relative magnitude under which three points count as collinear.
const COLLINEAR_TOL: f64 = 1e-12;

/// Signed distance of an undistorted point to the plane through three
/// points of a previous scan.
#[derive(Debug, Clone)]
pub struct PointToPlane {
    point: usize,
    normal: Vector3<f64>,
    projection: Projection,
}

impl PointToPlane {
    /// `point` indexes the query point in the precomputed scan. With
    /// `use_weighting` the residual is scaled by
    /// $\sqrt{1 / (J_r \Sigma_z J_r^\top)}$ where $J_r = n^\top$.
    pub fn new(
        point: usize,
        a: &Vector3<f64>,
        b: &Vector3<f64>,
        c: &Vector3<f64>,
        cov_z: &Matrix3<f64>,
        use_weighting: bool,
    ) -> Result<Self> {
        let ba = b - a;
        let bc = b - c;
        let cross = ba.cross(&bc);
        let norm = cross.norm();
        if !(norm > COLLINEAR_TOL * ba.norm() * bc.norm()) {
            return Err(OdometryError::DegenerateGeometry(
                "plane points are collinear",
            ));
        }
        let normal = cross / norm;
        let jr = DMatrix::from_row_slice(1, 3, normal.as_slice());
        Ok(PointToPlane {
            point,
            normal,
            projection: Projection::new(jr, *b, cov_z, use_weighting)?,
        })
    }

    pub fn normal(&self) -> &Vector3<f64> {
        &self.normal
    }

    pub fn weight(&self) -> f64 {
        self.projection
            .loss
            .as_ref()
            .map_or(1.0, |loss| loss.sqrt_info[(0, 0)])
    }
}

impl Residual for PointToPlane {
    fn dim(&self) -> usize {
        1
    }
    fn points(&self) -> &[usize] {
        std::slice::from_ref(&self.point)
    }
    fn linearize(&self, points: &[Vector3<f64>], workspace: &mut ResidualWorkspace) -> Result<()> {
        self.projection.linearize(points, workspace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane(cov_z: &Matrix3<f64>, use_weighting: bool) -> PointToPlane {
        PointToPlane::new(
            0,
            &Vector3::new(0.0, 0.0, 0.0),
            &Vector3::new(2.0, 0.0, 0.0),
            &Vector3::new(0.0, 3.0, 0.0),
            cov_z,
            use_weighting,
        )
        .unwrap()
    }

    fn eval(r: &PointToPlane, p: Vector3<f64>) -> ResidualWorkspace {
        let mut ws = ResidualWorkspace::default();
        ws.resize(r.dim(), 1);
        r.linearize(&[p], &mut ws).unwrap();
        ws
    }

    #[test]
    fn coplanar_point_is_zero() {
        let cov = Matrix3::from_diagonal(&Vector3::new(0.1, 0.2, 0.3));
        for weighting in [false, true] {
            let r = plane(&cov, weighting);
            let ws = eval(&r, Vector3::new(-4.5, 7.25, 0.0));
            assert_eq!(ws.residual[0], 0.0);
        }
    }

    #[test]
    fn distance_along_normal() {
        let r = plane(&Matrix3::identity(), false);
        assert_eq!(r.normal().z.abs(), 1.0);
        let ws = eval(&r, Vector3::new(1.0, 1.0, 2.5));
        assert!((ws.residual[0].abs() - 2.5).abs() < 1e-15);
        assert!((ws.local[(0, 2)] - r.normal().z).abs() < 1e-15);
        assert_eq!(r.weight(), 1.0);
    }

    #[test]
    fn weight_from_covariance() {
        let cov = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, 0.25));
        let r = plane(&cov, true);
        assert!((r.weight() - 2.0).abs() < 1e-12);
        let ws = eval(&r, Vector3::new(0.0, 0.0, 1.0));
        assert!((ws.residual[0].abs() - 2.0).abs() < 1e-12);
        assert!((ws.local[(0, 2)].abs() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn doubled_covariance_scales_weight() {
        let cov = Matrix3::new(0.3, 0.05, 0.0, 0.05, 0.2, 0.01, 0.0, 0.01, 0.4);
        let w1 = plane(&cov, true).weight();
        let w2 = plane(&(cov * 2.0), true).weight();
        assert!((w2 / w1 - 1.0 / 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn collinear_points() {
        let res = PointToPlane::new(
            0,
            &Vector3::new(0.0, 0.0, 0.0),
            &Vector3::new(1.0, 1.0, 1.0),
            &Vector3::new(2.0, 2.0, 2.0),
            &Matrix3::identity(),
            true,
        );
        assert!(matches!(res, Err(OdometryError::DegenerateGeometry(_))));
        let res = PointToPlane::new(
            0,
            &Vector3::new(1.0, 0.0, 0.0),
            &Vector3::new(1.0, 0.0, 0.0),
            &Vector3::new(2.0, 2.0, 2.0),
            &Matrix3::identity(),
            false,
        );
        assert!(matches!(res, Err(OdometryError::DegenerateGeometry(_))));
    }

    #[test]
    fn singular_noise() {
        let res = PointToPlane::new(
            0,
            &Vector3::new(0.0, 0.0, 0.0),
            &Vector3::new(1.0, 0.0, 0.0),
            &Vector3::new(0.0, 1.0, 0.0),
            &Matrix3::zeros(),
            true,
        );
        assert!(matches!(res, Err(OdometryError::DegenerateGeometry(_))));
    }
}
