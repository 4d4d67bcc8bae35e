use nalgebra::{DMatrix, DMatrixViewMut, Matrix3, Vector3};

use crate::core::{
    error::{OdometryError, Result},
    loss_function::{GaussianLoss, LossFunction},
    residual::{Residual, ResidualWorkspace},
};

use super::{implicit_line::ImplicitLine, point_to_line::PointToLine, point_to_plane::PointToPlane};

/// Residual `jr (p - anchor)` with a constant `jr`, whitened by the
/// measurement noise propagated through `jr` when weighting is on.
#[derive(Debug, Clone)]
pub(crate) struct Projection {
    pub jr: DMatrix<f64>,
    pub anchor: Vector3<f64>,
    pub loss: Option<GaussianLoss>,
}

impl Projection {
    pub fn new(
        jr: DMatrix<f64>,
        anchor: Vector3<f64>,
        cov_z: &Matrix3<f64>,
        use_weighting: bool,
    ) -> Result<Self> {
        let loss = if use_weighting {
            let cov = &jr * cov_z * jr.transpose();
            Some(GaussianLoss::covariance(cov.as_view())?)
        } else {
            None
        };
        Ok(Projection { jr, anchor, loss })
    }

    pub fn linearize(
        &self,
        points: &[Vector3<f64>],
        workspace: &mut ResidualWorkspace,
    ) -> Result<()> {
        let [point] = points else {
            return Err(OdometryError::DimensionMismatch {
                expected: (3, 1),
                found: (3, points.len()),
            });
        };
        let ResidualWorkspace { residual, local, .. } = workspace;
        residual.copy_from(&(&self.jr * (point - self.anchor)));
        local.copy_from(&self.jr);
        if let Some(loss) = &self.loss {
            let mut jacobians: [DMatrixViewMut<f64>; 1] = [local.as_view_mut()];
            loss.weight_jacobians_error_in_place(residual.as_view_mut(), &mut jacobians);
        }
        Ok(())
    }
}

/// Closed set of correspondence residuals handed to the solver.
#[derive(Debug, Clone)]
pub enum GeometricResidual {
    Plane(PointToPlane),
    Line(PointToLine),
    ImplicitLine(ImplicitLine),
}

impl From<PointToPlane> for GeometricResidual {
    fn from(r: PointToPlane) -> Self {
        GeometricResidual::Plane(r)
    }
}
impl From<PointToLine> for GeometricResidual {
    fn from(r: PointToLine) -> Self {
        GeometricResidual::Line(r)
    }
}
impl From<ImplicitLine> for GeometricResidual {
    fn from(r: ImplicitLine) -> Self {
        GeometricResidual::ImplicitLine(r)
    }
}

impl Residual for GeometricResidual {
    fn dim(&self) -> usize {
        match self {
            GeometricResidual::Plane(r) => r.dim(),
            GeometricResidual::Line(r) => r.dim(),
            GeometricResidual::ImplicitLine(r) => r.dim(),
        }
    }

    fn points(&self) -> &[usize] {
        match self {
            GeometricResidual::Plane(r) => r.points(),
            GeometricResidual::Line(r) => r.points(),
            GeometricResidual::ImplicitLine(r) => r.points(),
        }
    }

    fn linearize(&self, points: &[Vector3<f64>], workspace: &mut ResidualWorkspace) -> Result<()> {
        match self {
            GeometricResidual::Plane(r) => r.linearize(points, workspace),
            GeometricResidual::Line(r) => r.linearize(points, workspace),
            GeometricResidual::ImplicitLine(r) => r.linearize(points, workspace),
        }
    }
}
