use nalgebra::{DMatrix, Matrix2x3, Matrix3, Vector3};

use crate::core::{
    error::{OdometryError, Result},
    residual::{Residual, ResidualWorkspace},
};

use super::residual::Projection;

/// Offset of an undistorted point from the line through two points of a
/// previous scan, measured along two unit vectors orthogonal to the line.
#[derive(Debug, Clone)]
pub struct PointToLine {
    point: usize,
    direction: Vector3<f64>,
    projection: Projection,
}

impl PointToLine {
    pub fn new(
        point: usize,
        a: &Vector3<f64>,
        b: &Vector3<f64>,
        cov_z: &Matrix3<f64>,
        use_weighting: bool,
    ) -> Result<Self> {
        let ab = b - a;
        let norm = ab.norm();
        if !(norm > f64::EPSILON * a.norm().max(b.norm())) {
            return Err(OdometryError::DegenerateGeometry("line points coincide"));
        }
        let direction = ab / norm;
        let jr = DMatrix::from_column_slice(2, 3, line_projector(&direction).as_slice());
        Ok(PointToLine {
            point,
            direction,
            projection: Projection::new(jr, *a, cov_z, use_weighting)?,
        })
    }

    pub fn direction(&self) -> &Vector3<f64> {
        &self.direction
    }
}

/// Rows are two unit vectors orthogonal to the unit `direction` and to each other.
pub(crate) fn line_projector(direction: &Vector3<f64>) -> Matrix2x3<f64> {
    // seed with the axis least aligned with the line
    let mut seed = Vector3::zeros();
    seed[direction.iamin()] = 1.0;
    let u = direction.cross(&seed).normalize();
    let w = direction.cross(&u);
    Matrix2x3::from_rows(&[u.transpose(), w.transpose()])
}

impl Residual for PointToLine {
    fn dim(&self) -> usize {
        2
    }
    fn points(&self) -> &[usize] {
        std::slice::from_ref(&self.point)
    }
    fn linearize(&self, points: &[Vector3<f64>], workspace: &mut ResidualWorkspace) -> Result<()> {
        self.projection.linearize(points, workspace)
    }
}
