//! Particle states in global coordinates and their transport in a
//! homogeneous magnetic field along z.
//!
//! A state carries 7 parameters `(x, y, z, px, py, pz, E)` with a full 7×7
//! covariance. Tracks enter with an assigned mass hypothesis that fixes `E`;
//! primary vertices enter as zero-daughter particles with no momentum.
//!
//! Transport is parameterised by `ds` such that a straight line moves by
//! `ds * p`; in a field the transverse momentum rotates by the angle
//! `bq * ds` with `bq = bz * q * C_LIGHT` (bz in kG, lengths in cm, p in GeV/c).

use hf_core::{Error, PrimaryVertex, Result, TrackState};
use nalgebra::{Matrix3, Matrix6, SMatrix, SVector, Vector3};

/// Speed of light in the units used for curvature: GeV/c per kG·cm.
pub const C_LIGHT: f64 = 0.000_299_792_458;

/// Parameter vector `(x, y, z, px, py, pz, E)`.
pub type Vector7 = SVector<f64, 7>;
/// Covariance of a [`Vector7`].
pub type Matrix7 = SMatrix<f64, 7, 7>;

/// Below this rotation angle the helix is expanded to third order.
const SMALL_ANGLE: f64 = 1e-4;

/// Gaussian particle state.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleState {
    /// `(x, y, z, px, py, pz, E)`.
    pub params: Vector7,
    /// 7×7 covariance of `params`.
    pub covariance: Matrix7,
    /// Charge in units of e.
    pub charge: i32,
}

pub(crate) fn symmetrize(p: &Matrix7) -> Matrix7 {
    0.5 * (p + p.transpose())
}

impl ParticleState {
    /// Build a state from a track and a mass hypothesis.
    ///
    /// Fails with [`Error::Numerical`] if the track covariance is not
    /// positive definite or any input is non-finite.
    pub fn from_track(track: &TrackState, mass: f64) -> Result<Self> {
        if track.position.iter().chain(track.momentum.iter()).any(|v| !v.is_finite()) {
            return Err(Error::Numerical("track parameters must be finite".to_string()));
        }
        if !mass.is_finite() || mass < 0.0 {
            return Err(Error::Validation(format!("mass hypothesis must be >= 0, got {}", mass)));
        }
        let cov6 = Matrix6::from_fn(|i, j| track.cov(i, j));
        if cov6.iter().any(|v| !v.is_finite()) || cov6.cholesky().is_none() {
            return Err(Error::Numerical(
                "track covariance is not positive definite".to_string(),
            ));
        }

        let p = Vector3::from(track.momentum);
        let e = (p.norm_squared() + mass * mass).sqrt();
        if e <= 0.0 {
            return Err(Error::Numerical("massless track with zero momentum".to_string()));
        }

        let mut params = Vector7::zeros();
        params.fixed_rows_mut::<3>(0).copy_from(&Vector3::from(track.position));
        params.fixed_rows_mut::<3>(3).copy_from(&p);
        params[6] = e;

        // E depends on the momentum only: dE/dp = p / E.
        let mut jac = SMatrix::<f64, 7, 6>::zeros();
        jac.fixed_view_mut::<6, 6>(0, 0).fill_with_identity();
        for k in 0..3 {
            jac[(6, 3 + k)] = p[k] / e;
        }
        let covariance = symmetrize(&(jac * cov6 * jac.transpose()));

        Ok(Self { params, covariance, charge: track.charge })
    }

    /// Build a zero-daughter state at the primary vertex.
    pub fn from_vertex(pv: &PrimaryVertex) -> Result<Self> {
        if pv.position.iter().any(|v| !v.is_finite()) {
            return Err(Error::Numerical("primary vertex position must be finite".to_string()));
        }
        let cov3 = Matrix3::from_fn(|i, j| pv.cov(i, j));
        if cov3.iter().any(|v| !v.is_finite()) || cov3.cholesky().is_none() {
            return Err(Error::Numerical(
                "primary vertex covariance is not positive definite".to_string(),
            ));
        }
        let mut params = Vector7::zeros();
        params.fixed_rows_mut::<3>(0).copy_from(&Vector3::from(pv.position));
        let mut covariance = Matrix7::zeros();
        covariance.fixed_view_mut::<3, 3>(0, 0).copy_from(&cov3);
        Ok(Self { params, covariance, charge: 0 })
    }

    /// Position `(x, y, z)`.
    pub fn position(&self) -> Vector3<f64> {
        self.params.fixed_rows::<3>(0).into_owned()
    }

    /// Momentum `(px, py, pz)`.
    pub fn momentum(&self) -> Vector3<f64> {
        self.params.fixed_rows::<3>(3).into_owned()
    }

    /// Energy.
    pub fn energy(&self) -> f64 {
        self.params[6]
    }

    /// Transverse momentum.
    pub fn pt(&self) -> f64 {
        self.params[3].hypot(self.params[4])
    }

    /// 3×3 position block of the covariance.
    pub fn position_covariance(&self) -> Matrix3<f64> {
        self.covariance.fixed_view::<3, 3>(0, 0).into_owned()
    }

    fn bq(&self, bz: f64) -> f64 {
        bz * self.charge as f64 * C_LIGHT
    }

    /// Copy of the state moved along its trajectory by `ds`.
    ///
    /// The covariance is propagated with the Jacobian at fixed `ds`.
    pub fn transported(&self, ds: f64, bz: f64) -> ParticleState {
        let bq = self.bq(bz);
        let bs = bq * ds;
        let (s, c) = bs.sin_cos();
        // sb = sin(bs)/bq, cb = (1-cos(bs))/bq with their straight-line limits
        let (sb, cb) = if bs.abs() < SMALL_ANGLE {
            let bs2 = bs * bs;
            (ds * (1.0 - bs2 / 6.0), ds * bs * 0.5 * (1.0 - bs2 / 12.0))
        } else {
            (s / bq, (1.0 - c) / bq)
        };

        let mut jac = Matrix7::identity();
        jac[(0, 3)] = sb;
        jac[(0, 4)] = cb;
        jac[(1, 3)] = -cb;
        jac[(1, 4)] = sb;
        jac[(2, 5)] = ds;
        jac[(3, 3)] = c;
        jac[(3, 4)] = s;
        jac[(4, 3)] = -s;
        jac[(4, 4)] = c;

        let params = jac * self.params;
        let covariance = symmetrize(&(jac * self.covariance * jac.transpose()));
        ParticleState { params, covariance, charge: self.charge }
    }

    /// Path parameter to the point of closest approach to `point`.
    ///
    /// Exact in the transverse plane; the longitudinal term is blended in with
    /// the `pt²/p²` and `pz/p²` weights, which is exact for straight lines.
    pub fn ds_to_point(&self, point: &Vector3<f64>, bz: f64) -> f64 {
        let d = point - self.position();
        let (px, py, pz) = (self.params[3], self.params[4], self.params[5]);
        let pt2 = px * px + py * py;
        let p2 = pt2 + pz * pz;
        if p2 < 1e-20 {
            return 0.0;
        }
        let a = d.x * px + d.y * py;
        let bq = self.bq(bz);
        let ds_t = if bq.abs() < 1e-12 || pt2 < 1e-20 {
            if pt2 < 1e-20 { 0.0 } else { a / pt2 }
        } else {
            (bq * a).atan2(pt2 + bq * (d.y * px - d.x * py)) / bq
        };
        (ds_t * pt2 + d.z * pz) / p2
    }
}

/// Path parameters `(ds_a, ds_b)` bringing two particles to their mutual
/// closest approach, using the straight lines tangent at the current positions.
///
/// Parallel momenta have no unique solution and fail with [`Error::Numerical`].
pub fn ds_between(a: &ParticleState, b: &ParticleState) -> Result<(f64, f64)> {
    let pa = a.momentum();
    let pb = b.momentum();
    let w = a.position() - b.position();
    let aa = pa.dot(&pa);
    let ab = pa.dot(&pb);
    let bb = pb.dot(&pb);
    let da = pa.dot(&w);
    let db = pb.dot(&w);
    let den = aa * bb - ab * ab;
    if !(den > 1e-12 * aa * bb) {
        return Err(Error::Numerical("tracks are parallel; closest approach undefined".to_string()));
    }
    Ok(((ab * db - bb * da) / den, (aa * db - ab * da) / den))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use hf_core::types::packed_index;

    /// Track with a diagonal covariance.
    pub(crate) fn track(position: [f64; 3], momentum: [f64; 3], charge: i32) -> TrackState {
        let mut covariance = [0.0; 21];
        for i in 0..3 {
            covariance[packed_index(i, i)] = 1e-4;
            covariance[packed_index(i + 3, i + 3)] = 1e-5;
        }
        TrackState { position, momentum, charge, covariance }
    }

    #[test]
    fn test_energy_from_mass_hypothesis() {
        let t = track([0.0; 3], [0.3, 0.4, 1.2], 1);
        let s = ParticleState::from_track(&t, 0.5).unwrap();
        assert_abs_diff_eq!(s.energy(), (0.09f64 + 0.16 + 1.44 + 0.25).sqrt(), epsilon = 1e-12);
        // var(E) = (p/E)^T C_p (p/E)
        let e = s.energy();
        let expected = 1e-5 * (0.09 + 0.16 + 1.44) / (e * e);
        assert_abs_diff_eq!(s.covariance[(6, 6)], expected, epsilon = 1e-15);
        assert_abs_diff_eq!(s.covariance[(6, 3)], 1e-5 * 0.3 / e, epsilon = 1e-15);
    }

    #[test]
    fn test_singular_covariance_rejected() {
        let mut t = track([0.0; 3], [1.0, 0.0, 0.0], 1);
        t.covariance = [0.0; 21];
        assert!(matches!(ParticleState::from_track(&t, 0.14), Err(Error::Numerical(_))));

        let mut t = track([0.0; 3], [1.0, 0.0, 0.0], 1);
        // off-diagonal larger than the diagonal: not positive definite
        t.covariance[packed_index(1, 0)] = 1.0;
        assert!(matches!(ParticleState::from_track(&t, 0.14), Err(Error::Numerical(_))));
    }

    #[test]
    fn test_vertex_state() {
        let pv = PrimaryVertex { position: [0.1, -0.2, 3.0], covariance: [1e-6, 0.0, 1e-6, 0.0, 0.0, 4e-6] };
        let s = ParticleState::from_vertex(&pv).unwrap();
        assert_eq!(s.momentum(), Vector3::zeros());
        assert_eq!(s.energy(), 0.0);
        assert_abs_diff_eq!(s.covariance[(2, 2)], 4e-6, epsilon = 1e-18);

        let bad = PrimaryVertex { covariance: [0.0; 6], ..pv };
        assert!(matches!(ParticleState::from_vertex(&bad), Err(Error::Numerical(_))));
    }

    #[test]
    fn test_straight_line_transport() {
        let t = track([1.0, 2.0, 3.0], [0.5, -0.5, 1.0], 1);
        let s = ParticleState::from_track(&t, 0.14).unwrap();
        let moved = s.transported(2.0, 0.0);
        assert_abs_diff_eq!(moved.position(), Vector3::new(2.0, 1.0, 5.0), epsilon = 1e-12);
        assert_abs_diff_eq!(moved.momentum(), s.momentum(), epsilon = 1e-15);
        // position variance grows with ds² var(p)
        assert_abs_diff_eq!(moved.covariance[(0, 0)], 1e-4 + 4.0 * 1e-5, epsilon = 1e-15);
        // the source state is untouched
        assert_abs_diff_eq!(s.position(), Vector3::new(1.0, 2.0, 3.0), epsilon = 1e-15);
    }

    #[test]
    fn test_helix_preserves_pt_and_full_turn_returns() {
        let t = track([0.0, 0.0, 0.0], [1.0, 0.0, 0.5], 1);
        let s = ParticleState::from_track(&t, 0.14).unwrap();
        let bz = 5.0;
        let bq = bz * C_LIGHT;
        let moved = s.transported(0.3 / bq, bz);
        assert_abs_diff_eq!(moved.pt(), 1.0, epsilon = 1e-12);
        // positive charge in +bz bends towards -y
        assert!(moved.params[4] < 0.0);
        assert!(moved.position().y < 0.0);

        let full = s.transported(2.0 * std::f64::consts::PI / bq, bz);
        assert_abs_diff_eq!(full.position().x, 0.0, epsilon = 1e-8);
        assert_abs_diff_eq!(full.position().y, 0.0, epsilon = 1e-8);
    }

    #[test]
    fn test_ds_to_point_straight_and_helix() {
        let t = track([0.0, 0.0, 0.0], [1.0, 0.0, 0.0], -1);
        let s = ParticleState::from_track(&t, 0.14).unwrap();
        let target = Vector3::new(3.0, 0.5, 0.0);
        assert_abs_diff_eq!(s.ds_to_point(&target, 0.0), 3.0, epsilon = 1e-12);

        // A point on the helix itself is reached with zero distance.
        let bz = 5.0;
        let on_helix = s.transported(40.0, bz).position();
        let ds = s.ds_to_point(&on_helix, bz);
        assert_abs_diff_eq!(ds, 40.0, epsilon = 1e-6);
        assert!((s.transported(ds, bz).position() - on_helix).norm() < 1e-6);
    }

    #[test]
    fn test_ds_between_crossing_lines() {
        let a = ParticleState::from_track(&track([-1.0, 0.0, 0.0], [1.0, 0.0, 0.0], 1), 0.14).unwrap();
        let b = ParticleState::from_track(&track([0.0, -2.0, 1.0], [0.0, 1.0, 0.0], -1), 0.14).unwrap();
        let (sa, sb) = ds_between(&a, &b).unwrap();
        assert_abs_diff_eq!(sa, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(sb, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_ds_between_parallel_fails() {
        let a = ParticleState::from_track(&track([0.0; 3], [1.0, 1.0, 0.0], 1), 0.14).unwrap();
        let b = ParticleState::from_track(&track([0.0, 1.0, 0.0], [2.0, 2.0, 0.0], 1), 0.14).unwrap();
        assert!(matches!(ds_between(&a, &b), Err(Error::Numerical(_))));
    }
}
