use nalgebra::{Isometry3, Matrix3, Matrix3x6, Matrix6, Translation3, Vector3, Vector6};

use super::so3::{self, skew, SMALL_ANGLE};

/// Rigid transform. Tangent vectors are ordered $[\omega; v]$, rotation first.
pub type SE3 = Isometry3<f64>;

#[inline]
pub fn rotation_part(xi: &Vector6<f64>) -> Vector3<f64> {
    xi.fixed_rows::<3>(0).into_owned()
}
#[inline]
pub fn translation_part(xi: &Vector6<f64>) -> Vector3<f64> {
    xi.fixed_rows::<3>(3).into_owned()
}

pub fn exp(xi: &Vector6<f64>) -> SE3 {
    let phi = rotation_part(xi);
    let rho = translation_part(xi);
    let t = so3::left_jacobian(&phi) * rho;
    Isometry3::from_parts(Translation3::from(t), so3::exp(&phi))
}

pub fn log(pose: &SE3) -> Vector6<f64> {
    let phi = so3::log(&pose.rotation);
    let rho = so3::left_jacobian_inverse(&phi) * pose.translation.vector;
    let mut xi = Vector6::zeros();
    xi.fixed_rows_mut::<3>(0).copy_from(&phi);
    xi.fixed_rows_mut::<3>(3).copy_from(&rho);
    xi
}

/// Left-multiplicative update $T \leftarrow \exp(\delta) T$.
pub fn manifold_plus(pose: &SE3, delta: &Vector6<f64>) -> SE3 {
    exp(delta) * pose
}

/// Off-diagonal block of the SE(3) left Jacobian (Barfoot, eq. 7.86).
fn q_matrix(phi: &Vector3<f64>, rho: &Vector3<f64>) -> Matrix3<f64> {
    let theta = phi.norm();
    let theta_sq = theta * theta;
    let (c1, c2, c3) = if theta < SMALL_ANGLE {
        let theta_qu = theta_sq * theta_sq;
        (
            1.0 / 6.0 - theta_sq / 120.0 + theta_qu / 5040.0,
            1.0 / 24.0 - theta_sq / 720.0 + theta_qu / 40320.0,
            1.0 / 120.0 - theta_sq / 2520.0,
        )
    } else {
        let (s, c) = theta.sin_cos();
        let theta_qu = theta_sq * theta_sq;
        (
            (theta - s) / (theta_sq * theta),
            (theta_sq + 2.0 * c - 2.0) / (2.0 * theta_qu),
            (2.0 * theta - 3.0 * s + theta * c) / (2.0 * theta_qu * theta),
        )
    };
    let p = skew(phi);
    let r = skew(rho);
    let pr = p * r;
    let rp = r * p;
    let prp = pr * p;
    let pp = p * p;
    r * 0.5
        + (pr + rp + prp) * c1
        + (pp * r + rp * p - prp * 3.0) * c2
        + (prp * p + pp * r * p) * c3
}

/// Left Jacobian of SE(3): $\exp(\xi + d) \approx \exp(J_l(\xi) d) \exp(\xi)$.
pub fn left_jacobian(xi: &Vector6<f64>) -> Matrix6<f64> {
    let phi = rotation_part(xi);
    let rho = translation_part(xi);
    let j = so3::left_jacobian(&phi);
    let mut jac = Matrix6::zeros();
    jac.fixed_view_mut::<3, 3>(0, 0).copy_from(&j);
    jac.fixed_view_mut::<3, 3>(3, 3).copy_from(&j);
    jac.fixed_view_mut::<3, 3>(3, 0).copy_from(&q_matrix(&phi, &rho));
    jac
}

pub fn left_jacobian_inverse(xi: &Vector6<f64>) -> Matrix6<f64> {
    let phi = rotation_part(xi);
    let rho = translation_part(xi);
    let j_inv = so3::left_jacobian_inverse(&phi);
    let q = q_matrix(&phi, &rho);
    let mut jac = Matrix6::zeros();
    jac.fixed_view_mut::<3, 3>(0, 0).copy_from(&j_inv);
    jac.fixed_view_mut::<3, 3>(3, 3).copy_from(&j_inv);
    jac.fixed_view_mut::<3, 3>(3, 0)
        .copy_from(&(-(j_inv * q * j_inv)));
    jac
}

/// Adjoint of the Lie algebra: $\mathrm{ad}(\xi) w = [\xi, w]$, with
/// $\mathrm{ad}(\xi) = \begin{bmatrix} \phi^\wedge & 0 \\ \rho^\wedge & \phi^\wedge \end{bmatrix}$.
pub fn curly_hat(xi: &Vector6<f64>) -> Matrix6<f64> {
    let p = skew(&rotation_part(xi));
    let mut ad = Matrix6::zeros();
    ad.fixed_view_mut::<3, 3>(0, 0).copy_from(&p);
    ad.fixed_view_mut::<3, 3>(3, 3).copy_from(&p);
    ad.fixed_view_mut::<3, 3>(3, 0)
        .copy_from(&skew(&translation_part(xi)));
    ad
}

/// Step of the central differences in [`left_jacobian_inverse_derivative`].
const DERIVATIVE_STEP: f64 = 1e-5;

/// Derivative of $J_l^{-1}(\xi) w$ with respect to $\xi$, by central
/// differences. Equals $\frac{1}{2}\mathrm{ad}(w)$ at $\xi = 0$.
pub fn left_jacobian_inverse_derivative(xi: &Vector6<f64>, w: &Vector6<f64>) -> Matrix6<f64> {
    let mut jac = Matrix6::zeros();
    for i in 0..6 {
        let mut d = Vector6::zeros();
        d[i] = DERIVATIVE_STEP;
        let plus = left_jacobian_inverse(&(xi + d)) * w;
        let minus = left_jacobian_inverse(&(xi - d)) * w;
        jac.set_column(i, &((plus - minus) / (2.0 * DERIVATIVE_STEP)));
    }
    jac
}

/// Derivative of $\exp(\delta) p$ with respect to $\delta$ at zero: $[-p^\wedge \mid I]$.
pub fn point_jacobian(p: &Vector3<f64>) -> Matrix3x6<f64> {
    let mut jac = Matrix3x6::zeros();
    jac.fixed_view_mut::<3, 3>(0, 0).copy_from(&(-skew(p)));
    jac.fixed_view_mut::<3, 3>(0, 3).copy_from(&Matrix3::identity());
    jac
}

/// Applies `pose` to a point stored as a plain vector.
#[inline]
pub fn transform(pose: &SE3, p: &Vector3<f64>) -> Vector3<f64> {
    pose.rotation * p + pose.translation.vector
}
