use nalgebra::{DMatrix, DMatrixViewMut};

use super::{
    error::{OdometryError, Result},
    jacobian_cache::PrecomputedPoints,
    key::StateKey,
};

/// One state block of a residual together with its output Jacobian.
/// `jacobian == None` means the block is held fixed.
pub struct StateJacobian<'a> {
    pub key: StateKey,
    pub jacobian: Option<DMatrixViewMut<'a, f64>>,
}

impl<'a> StateJacobian<'a> {
    pub fn requested(key: StateKey, jacobian: DMatrixViewMut<'a, f64>) -> Self {
        StateJacobian {
            key,
            jacobian: Some(jacobian),
        }
    }
    pub fn fixed(key: StateKey) -> Self {
        StateJacobian {
            key,
            jacobian: None,
        }
    }
}

/// Chain rule from the transformed points to the trajectory states:
/// `jacobian = sum_j local_j * precomputed(points[j], key)` for every
/// requested block.
///
/// `local` is the derivative of the residual with respect to the transformed
/// points (`dim x 3n`, point `j` in columns `3j..3j+3`). A point without an
/// entry for `key` does not depend on it; a key no point depends on is a
/// [`OdometryError::CacheMismatch`]. Fixed blocks are skipped without
/// touching `source`.
pub fn assign_jacobians<S>(
    local: &DMatrix<f64>,
    points: &[usize],
    source: &S,
    states: &mut [StateJacobian<'_>],
) -> Result<()>
where
    S: PrecomputedPoints + ?Sized,
{
    let Some(&first) = points.first() else {
        return Err(OdometryError::DimensionMismatch {
            expected: (local.nrows(), 3),
            found: local.shape(),
        });
    };
    if local.ncols() != 3 * points.len() {
        return Err(OdometryError::DimensionMismatch {
            expected: (local.nrows(), 3 * points.len()),
            found: local.shape(),
        });
    }
    for state in states.iter_mut() {
        let Some(jacobian) = state.jacobian.as_mut() else {
            continue;
        };
        jacobian.fill(0.0);
        let mut found = false;
        for (j, &point) in points.iter().enumerate() {
            let Some(precalc) = source.jacobian(point, state.key) else {
                continue;
            };
            let expected = (local.nrows(), precalc.ncols());
            if jacobian.shape() != expected {
                return Err(OdometryError::DimensionMismatch {
                    expected,
                    found: jacobian.shape(),
                });
            }
            *jacobian += local.columns(3 * j, 3) * precalc;
            found = true;
        }
        if !found {
            return Err(OdometryError::CacheMismatch {
                point: first,
                key: state.key,
            });
        }
    }
    Ok(())
}
