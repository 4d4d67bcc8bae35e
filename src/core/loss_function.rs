use nalgebra::{DMatrix, DMatrixView, DMatrixViewMut, DVectorViewMut};

use super::error::{OdometryError, Result};

pub trait LossFunction {
    /// weight error: apply loss function
    /// in place operation to avoid excessive memory operation
    fn weight_error_in_place(&self, error: DVectorViewMut<f64>);

    /// weight jacobian matrices and error: apply loss function
    /// in place operation to avoid excessive memory operation
    fn weight_jacobians_error_in_place(
        &self,
        error: DVectorViewMut<f64>,
        jacobians: &mut [DMatrixViewMut<f64>],
    );
}

/// Whitens a residual with the square root of its information matrix.
#[derive(Debug, Clone)]
pub struct GaussianLoss {
    pub sqrt_info: DMatrix<f64>,
}

impl GaussianLoss {
    #[allow(non_snake_case)]
    pub fn information(I: DMatrixView<f64>) -> Result<Self> {
        if I.nrows() != I.ncols() {
            return Err(OdometryError::DimensionMismatch {
                expected: (I.nrows(), I.nrows()),
                found: I.shape(),
            });
        }
        let chol = I
            .clone_owned()
            .cholesky()
            .ok_or(OdometryError::DegenerateGeometry(
                "information matrix is not positive definite",
            ))?;
        Ok(GaussianLoss {
            sqrt_info: chol.l().transpose(),
        })
    }
    /// From the covariance of the residual. For a scalar residual with
    /// variance $\sigma^2$ the weight is $\sqrt{1 / \sigma^2}$.
    pub fn covariance(cov: DMatrixView<f64>) -> Result<Self> {
        let info = cov
            .clone_owned()
            .try_inverse()
            .ok_or(OdometryError::DegenerateGeometry(
                "residual covariance is singular",
            ))?;
        Self::information(info.as_view())
    }
}

impl LossFunction for GaussianLoss {
    fn weight_error_in_place(&self, mut error: DVectorViewMut<f64>) {
        let m = &self.sqrt_info * error.clone_owned();
        error.copy_from(&m);
    }

    fn weight_jacobians_error_in_place(
        &self,
        mut error: DVectorViewMut<f64>,
        jacobians: &mut [DMatrixViewMut<f64>],
    ) {
        let m = &self.sqrt_info * error.clone_owned();
        error.copy_from(&m);
        for j in jacobians {
            let m = &self.sqrt_info * j.clone_owned();
            j.copy_from(&m);
        }
    }
}
