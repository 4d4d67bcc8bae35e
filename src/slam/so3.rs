use nalgebra::{Matrix3, UnitQuaternion, Vector3};

/// below this angle the closed forms lose precision and series are used instead
pub(crate) const SMALL_ANGLE: f64 = 1e-2;

/// Skew-symmetric matrix such that `skew(v) * u = v × u`.
#[inline]
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -v.z, v.y, //
        v.z, 0.0, -v.x, //
        -v.y, v.x, 0.0,
    )
}

pub fn exp(phi: &Vector3<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::from_scaled_axis(*phi)
}

pub fn log(rotation: &UnitQuaternion<f64>) -> Vector3<f64> {
    rotation.scaled_axis()
}

/// Left Jacobian of SO(3):
/// $J_l(\phi) = I + \frac{1 - \cos\theta}{\theta^2}\phi^\wedge + \frac{\theta - \sin\theta}{\theta^3}{\phi^\wedge}^2$
pub fn left_jacobian(phi: &Vector3<f64>) -> Matrix3<f64> {
    let theta = phi.norm();
    let theta_sq = theta * theta;
    let (a, b) = if theta < SMALL_ANGLE {
        (
            0.5 - theta_sq / 24.0 + theta_sq * theta_sq / 720.0,
            1.0 / 6.0 - theta_sq / 120.0 + theta_sq * theta_sq / 5040.0,
        )
    } else {
        (
            (1.0 - theta.cos()) / theta_sq,
            (theta - theta.sin()) / (theta_sq * theta),
        )
    };
    let phi_hat = skew(phi);
    Matrix3::identity() + phi_hat * a + phi_hat * phi_hat * b
}

/// Inverse of [`left_jacobian`]:
/// $J_l^{-1}(\phi) = I - \frac{1}{2}\phi^\wedge + (\frac{1}{\theta^2} - \frac{1 + \cos\theta}{2\theta\sin\theta}){\phi^\wedge}^2$
pub fn left_jacobian_inverse(phi: &Vector3<f64>) -> Matrix3<f64> {
    let theta = phi.norm();
    let theta_sq = theta * theta;
    let c = if theta < SMALL_ANGLE {
        1.0 / 12.0 + theta_sq / 720.0 + theta_sq * theta_sq / 30240.0
    } else {
        1.0 / theta_sq - (1.0 + theta.cos()) / (2.0 * theta * theta.sin())
    };
    let phi_hat = skew(phi);
    Matrix3::identity() - phi_hat * 0.5 + phi_hat * phi_hat * c
}
