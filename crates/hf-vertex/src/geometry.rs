//! Geometry relative to the primary vertex: pointing direction, projected
//! uncertainties and impact parameters.

use hf_core::{Error, Result};
use nalgebra::{Matrix3, Vector3};

use crate::particle::ParticleState;

/// Azimuth `phi` and elevation `theta` of the direction from `from` to `to`.
pub fn point_direction(from: &Vector3<f64>, to: &Vector3<f64>) -> (f64, f64) {
    let d = to - from;
    let phi = d.y.atan2(d.x);
    let theta = d.z.atan2(d.x.hypot(d.y));
    (phi, theta)
}

/// Variance of `cov` projected onto the unit vector with angles `(phi, theta)`.
pub fn projected_variance(cov: &Matrix3<f64>, phi: f64, theta: f64) -> f64 {
    let (sp, cp) = phi.sin_cos();
    let (st, ct) = theta.sin_cos();
    let u = Vector3::new(cp * ct, sp * ct, st);
    u.dot(&(cov * u))
}

/// Signed transverse impact parameter with its uncertainty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpactParameter {
    /// Signed distance of closest approach in the transverse plane (cm).
    pub value: f64,
    /// Uncertainty on `value`.
    pub sigma: f64,
}

/// Transverse impact parameter of `prong` with respect to `vertex`.
///
/// The prong is copied and transported to its closest approach; the sign
/// follows `(r - r_pv) × p` along z. Both position covariances contribute.
pub fn impact_parameter_xy(
    prong: &ParticleState,
    vertex: &ParticleState,
    bz: f64,
) -> Result<ImpactParameter> {
    let pv = vertex.position();
    let at_pca = prong.transported(prong.ds_to_point(&pv, bz), bz);
    let pt = at_pca.pt();
    if pt < 1e-9 {
        return Err(Error::Numerical("impact parameter undefined for pT = 0".to_string()));
    }
    let ux = at_pca.params[3] / pt;
    let uy = at_pca.params[4] / pt;
    let d = at_pca.position() - pv;
    let value = d.x * uy - d.y * ux;

    // At the PCA the momentum derivatives vanish; only positions enter.
    let g = nalgebra::Vector2::new(uy, -ux);
    let c_trk = at_pca.covariance.fixed_view::<2, 2>(0, 0).into_owned();
    let c_pv = vertex.covariance.fixed_view::<2, 2>(0, 0).into_owned();
    let var = g.dot(&((c_trk + c_pv) * g));
    if !(var >= 0.0) {
        return Err(Error::Numerical("negative impact-parameter variance".to_string()));
    }
    Ok(ImpactParameter { value, sigma: var.sqrt() })
}

/// Cosine of the angle between `momentum` and the flight direction `to - from`.
pub fn cos_pointing_angle(from: &Vector3<f64>, to: &Vector3<f64>, momentum: &Vector3<f64>) -> f64 {
    let d = to - from;
    let denom = d.norm() * momentum.norm();
    if denom > 0.0 { d.dot(momentum) / denom } else { 0.0 }
}

/// Transverse-plane variant of [`cos_pointing_angle`].
pub fn cos_pointing_angle_xy(
    from: &Vector3<f64>,
    to: &Vector3<f64>,
    momentum: &Vector3<f64>,
) -> f64 {
    let flat = |v: Vector3<f64>| Vector3::new(v.x, v.y, 0.0);
    cos_pointing_angle(&flat(*from), &flat(*to), &flat(*momentum))
}
