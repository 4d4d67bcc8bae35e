use nalgebra::{DMatrix, DMatrixViewMut, Matrix3, Vector3};

use crate::core::{
    error::{OdometryError, Result},
    loss_function::{GaussianLoss, LossFunction},
    residual::{Residual, ResidualWorkspace},
};

use super::point_to_line::line_projector;

/// Offsets of a track of undistorted points from the line fitted through
/// those same points. One 2-row block per point, in track order.
///
/// The line is refitted at every evaluation: it passes through the centroid
/// along the direction of largest spread. The Jacobian follows the centroid
/// and holds the direction at its current fit.
#[derive(Debug, Clone)]
pub struct ImplicitLine {
    points: Vec<usize>,
    cov_z: Matrix3<f64>,
    use_weighting: bool,
}

impl ImplicitLine {
    /// `points` index the track in the precomputed scan. With `use_weighting`
    /// every block is whitened by the measurement noise projected onto the
    /// plane orthogonal to the fitted line.
    pub fn new(points: Vec<usize>, cov_z: &Matrix3<f64>, use_weighting: bool) -> Result<Self> {
        if points.len() < 2 {
            return Err(OdometryError::DegenerateGeometry(
                "implicit line needs at least two points",
            ));
        }
        if use_weighting && cov_z.cholesky().is_none() {
            return Err(OdometryError::DegenerateGeometry(
                "measurement covariance is not positive definite",
            ));
        }
        Ok(ImplicitLine {
            points,
            cov_z: *cov_z,
            use_weighting,
        })
    }

    /// Centroid and unit direction of the line through `points`.
    pub fn fit(points: &[Vector3<f64>]) -> Result<(Vector3<f64>, Vector3<f64>)> {
        if points.len() < 2 {
            return Err(OdometryError::DegenerateGeometry(
                "implicit line needs at least two points",
            ));
        }
        let centroid = points.iter().sum::<Vector3<f64>>() / points.len() as f64;
        let scatter = points.iter().fold(Matrix3::zeros(), |acc, p| {
            let d = p - centroid;
            acc + d * d.transpose()
        });
        let eigen = scatter.symmetric_eigen();
        let largest = eigen.eigenvalues.imax();
        let scale = points.iter().fold(0.0f64, |acc, p| acc.max(p.amax()));
        let floor = (f64::EPSILON * scale).powi(2) * points.len() as f64;
        if !(eigen.eigenvalues[largest] > floor) {
            return Err(OdometryError::DegenerateGeometry("track points coincide"));
        }
        let direction = eigen.eigenvectors.column(largest).normalize();
        Ok((centroid, direction))
    }
}

impl Residual for ImplicitLine {
    fn dim(&self) -> usize {
        2 * self.points.len()
    }
    fn points(&self) -> &[usize] {
        &self.points
    }
    fn linearize(&self, points: &[Vector3<f64>], workspace: &mut ResidualWorkspace) -> Result<()> {
        if points.len() != self.points.len() {
            return Err(OdometryError::DimensionMismatch {
                expected: (3, self.points.len()),
                found: (3, points.len()),
            });
        }
        let (centroid, direction) = Self::fit(points)?;
        let projector = line_projector(&direction);
        let loss = if self.use_weighting {
            let cov = projector * self.cov_z * projector.transpose();
            Some(GaussianLoss::covariance(
                DMatrix::from_column_slice(2, 2, cov.as_slice()).as_view(),
            )?)
        } else {
            None
        };

        let ResidualWorkspace { residual, local, .. } = workspace;
        // d(p_i - centroid) / d p_j = delta_ij - 1/n
        let share = projector / points.len() as f64;
        local.fill(0.0);
        for (i, p) in points.iter().enumerate() {
            residual
                .fixed_rows_mut::<2>(2 * i)
                .copy_from(&(projector * (p - centroid)));
            for j in 0..points.len() {
                let mut block = local.fixed_view_mut::<2, 3>(2 * i, 3 * j);
                block -= share;
                if i == j {
                    block += projector;
                }
            }
        }
        if let Some(loss) = loss {
            for i in 0..points.len() {
                let mut jacobians: [DMatrixViewMut<f64>; 1] = [local.rows_mut(2 * i, 2)];
                loss.weight_jacobians_error_in_place(residual.rows_mut(2 * i, 2), &mut jacobians);
            }
        }
        Ok(())
    }
}
