use nalgebra::{DMatrix, DVector, Vector3};

use super::{
    error::Result,
    jacobian_cache::PrecomputedPoints,
    jacobian_chain::{assign_jacobians, StateJacobian},
    key::StateKey,
};

/// Scratch owned by the calling evaluation context. Never shared between
/// threads: every worker keeps its own and passes it by `&mut`.
#[derive(Debug, Clone)]
pub struct ResidualWorkspace {
    /// weighted residual
    pub residual: DVector<f64>,
    /// weighted derivative of the residual w.r.t. the transformed points
    pub local: DMatrix<f64>,
    /// transformed points read from the source
    pub(crate) points: Vec<Vector3<f64>>,
}

impl Default for ResidualWorkspace {
    fn default() -> Self {
        ResidualWorkspace {
            residual: DVector::zeros(1),
            local: DMatrix::zeros(1, 3),
            points: Vec::new(),
        }
    }
}

impl ResidualWorkspace {
    /// Sizes the buffers for a `dim` residual over `n_points` points.
    pub fn resize(&mut self, dim: usize, n_points: usize) {
        if self.residual.nrows() != dim {
            self.residual = DVector::zeros(dim);
        }
        if self.local.shape() != (dim, 3 * n_points) {
            self.local = DMatrix::zeros(dim, 3 * n_points);
        }
    }
}

/// Whether the caller wants the derivative with respect to a state block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateRequest {
    Differentiate(StateKey),
    /// the block is held constant, no Jacobian is produced
    Fixed(StateKey),
}

impl StateRequest {
    pub fn key(&self) -> StateKey {
        match self {
            StateRequest::Differentiate(key) | StateRequest::Fixed(key) => *key,
        }
    }
}

/// Result of [`Residual::evaluate`].
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub residual: DVector<f64>,
    pub jacobians: Vec<(StateKey, Option<DMatrix<f64>>)>,
}

impl Evaluation {
    pub fn jacobian(&self, key: StateKey) -> Option<&DMatrix<f64>> {
        self.jacobians
            .iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, j)| j.as_ref())
    }
}

/// Geometric residual of one or more interpolated points.
pub trait Residual {
    /// residual vector dimension
    fn dim(&self) -> usize;
    /// indices of the query points in the precomputed scan
    fn points(&self) -> &[usize];
    /// Weighted residual and its derivative w.r.t. the transformed `points`,
    /// written into `workspace`, already sized by
    /// [`ResidualWorkspace::resize`] to [`Residual::dim`] and `points.len()`.
    fn linearize(&self, points: &[Vector3<f64>], workspace: &mut ResidualWorkspace) -> Result<()>;

    /// Evaluates the residual and writes the requested Jacobians in place.
    fn evaluate_into<S>(
        &self,
        source: &S,
        workspace: &mut ResidualWorkspace,
        states: &mut [StateJacobian<'_>],
    ) -> Result<()>
    where
        S: PrecomputedPoints + ?Sized,
    {
        let mut points = std::mem::take(&mut workspace.points);
        points.clear();
        let linearized = self
            .points()
            .iter()
            .try_for_each(|&i| source.point(i).map(|p| points.push(p)))
            .and_then(|()| {
                workspace.resize(self.dim(), points.len());
                self.linearize(&points, workspace)
            });
        workspace.points = points;
        linearized?;
        assign_jacobians(&workspace.local, self.points(), source, states)
    }

    /// Allocating variant of [`Residual::evaluate_into`].
    fn evaluate<S>(
        &self,
        source: &S,
        workspace: &mut ResidualWorkspace,
        requests: &[StateRequest],
    ) -> Result<Evaluation>
    where
        S: PrecomputedPoints + ?Sized,
    {
        let mut outputs: Vec<Option<DMatrix<f64>>> = requests
            .iter()
            .map(|r| match r {
                StateRequest::Differentiate(key) => Some(DMatrix::zeros(self.dim(), key.dim())),
                StateRequest::Fixed(_) => None,
            })
            .collect();
        {
            let mut states: Vec<StateJacobian> = requests
                .iter()
                .zip(outputs.iter_mut())
                .map(|(r, out)| match out {
                    Some(m) => {
                        let shape = m.shape();
                        StateJacobian::requested(r.key(), m.view_mut((0, 0), shape))
                    }
                    None => StateJacobian::fixed(r.key()),
                })
                .collect();
            self.evaluate_into(source, workspace, &mut states)?;
        }
        Ok(Evaluation {
            residual: workspace.residual.clone(),
            jacobians: requests.iter().map(|r| r.key()).zip(outputs).collect(),
        })
    }
}
