use nalgebra::{Matrix3x6, Matrix3xX, Vector3};

use super::{
    error::{OdometryError, Result},
    key::StateKey,
    HashMap,
};

/// Read side of a precompute pass: the transformed query points and the
/// derivative of each of them with respect to the state blocks it depends on.
pub trait PrecomputedPoints {
    /// Transformed position of `point`, or the error that prevented computing it.
    fn point(&self, point: usize) -> Result<Vector3<f64>>;
    /// $\partial p / \partial \textbf{x}_{key}$, a `3 x dim(key)` matrix.
    fn jacobian(&self, point: usize, key: StateKey) -> Option<&Matrix3xX<f64>>;
}

type PointEntries = HashMap<StateKey, Matrix3xX<f64>>;

/// Write phase of the per-point Jacobian cache. Single writer; turned into a
/// read-only [`JacobianCache`] by [`JacobianCacheBuilder::freeze`].
#[derive(Debug, Clone, Default)]
pub struct JacobianCacheBuilder {
    points: Vec<PointEntries>,
}

impl JacobianCacheBuilder {
    pub fn new(n_points: usize) -> Self {
        let mut points = Vec::with_capacity(n_points);
        points.resize_with(n_points, PointEntries::default);
        JacobianCacheBuilder { points }
    }
    /// Adds `jacobian` to the entry of (`point`, `key`), creating it if needed.
    pub fn accumulate(
        &mut self,
        point: usize,
        key: StateKey,
        jacobian: &Matrix3x6<f64>,
    ) -> Result<()> {
        let entries = self.points.get_mut(point).ok_or_else(|| {
            OdometryError::Config(format!("point {} outside of jacobian cache", point))
        })?;
        match entries.get_mut(&key) {
            Some(entry) => {
                if entry.ncols() != jacobian.ncols() {
                    return Err(OdometryError::DimensionMismatch {
                        expected: (3, entry.ncols()),
                        found: (3, jacobian.ncols()),
                    });
                }
                *entry += jacobian;
            }
            None => {
                entries.insert(key, Matrix3xX::from_column_slice(jacobian.as_slice()));
            }
        }
        Ok(())
    }
    pub fn freeze(self) -> JacobianCache {
        JacobianCache {
            points: self.points,
        }
    }
}

/// Frozen per-point Jacobian cache. Only shared references are handed out,
/// so it can be read from any number of evaluation threads.
#[derive(Debug, Clone, Default)]
pub struct JacobianCache {
    points: Vec<PointEntries>,
}

impl JacobianCache {
    pub fn len(&self) -> usize {
        self.points.len()
    }
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
    pub fn get(&self, point: usize, key: StateKey) -> Option<&Matrix3xX<f64>> {
        self.points.get(point).and_then(|entries| entries.get(&key))
    }
    /// State blocks `point` depends on, in key order.
    pub fn keys(&self, point: usize) -> Vec<StateKey> {
        let mut keys: Vec<StateKey> = self
            .points
            .get(point)
            .map(|entries| entries.keys().copied().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}
