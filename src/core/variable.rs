use nalgebra::{DVector, DVectorView, Vector6};

use crate::slam::se3::{self, SE3};

use super::error::{OdometryError, Result};

/// Represent state block $\textbf{x}_i$ of the trajectory (a knot pose or velocity).
pub trait Variable: Clone {
    /// Returns local tangent such: $\textbf{x}_i \boxminus \breve{\textbf{x}}_i$
    /// where $\breve{\textbf{x}}_i$ is linearization point.
    fn local(&self, linearization_point: &Self) -> DVector<f64>;
    /// Retract (perturbate) $\textbf{x}_i$ by `delta` such:
    /// $\textbf{x}_i=\textbf{x}_i \boxplus \delta \textbf{x}_i$
    fn retract(&mut self, delta: DVectorView<f64>);
    /// Returns retracted copy of `self`.
    fn retracted(&self, delta: DVectorView<f64>) -> Self {
        let mut var = self.clone();
        var.retract(delta);
        var
    }
    /// Returns dimension $D$ of $\delta{\textbf{x}_i} \in \mathbb{R}^D$
    fn dim(&self) -> usize;
}

fn twist_from(delta: DVectorView<f64>) -> Vector6<f64> {
    Vector6::from_iterator(delta.iter().copied())
}

/// Poses are perturbed on the left: $T \boxplus \delta = \exp(\delta) T$.
impl Variable for SE3 {
    fn local(&self, linearization_point: &Self) -> DVector<f64> {
        let d = se3::log(&(self * linearization_point.inverse()));
        DVector::from_column_slice(d.as_slice())
    }

    fn retract(&mut self, delta: DVectorView<f64>) {
        *self = se3::manifold_plus(self, &twist_from(delta));
    }

    fn dim(&self) -> usize {
        6
    }
}

impl Variable for Vector6<f64> {
    fn local(&self, linearization_point: &Self) -> DVector<f64> {
        let d = self - linearization_point;
        DVector::from_column_slice(d.as_slice())
    }

    fn retract(&mut self, delta: DVectorView<f64>) {
        *self += twist_from(delta);
    }

    fn dim(&self) -> usize {
        6
    }
}

/// Copies a raw solver parameter block into a twist.
pub fn twist_from_params(params: &[f64]) -> Result<Vector6<f64>> {
    if params.len() != 6 {
        return Err(OdometryError::Config(format!(
            "expected 6 parameters per state block, got {}",
            params.len()
        )));
    }
    Ok(Vector6::from_column_slice(params))
}
