//! Closed-form Kalman merge of daughter states.
//!
//! Each pass transports every prong to its closest approach with the current
//! vertex estimate and merges them one by one, imposing
//! `r_mother = r_daughter` as a linear constraint on the joint
//! (mother, daughter) Gaussian:
//!
//! `S = C_m,rr + C_d,rr`, `ζ = r_d − r_m`, `χ² += ζᵀ S⁻¹ ζ`
//!
//! after which the composite keeps the constrained position and sums the
//! constrained four-momenta. With every prong linearised at the same point
//! the merged result does not depend on the merge order. The first pass starts
//! from the mean of the pairwise closest approaches; passes repeat until the
//! vertex moves by less than [`VERTEX_TOLERANCE`]. Each merged daughter adds
//! two degrees of freedom; the vertex position costs three.

use hf_core::{Error, PrimaryVertex, Result};
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

use crate::fitter::{
    CompositeParticle, FitSettings, ParticleHypothesis, VertexFitter, pairwise_seed,
    prong_states, reported_momenta,
};
use crate::particle::{Matrix7, ParticleState, symmetrize};

/// Largest vertex coordinate change (cm) at which relinearisation stops.
pub const VERTEX_TOLERANCE: f64 = 1e-6;

/// Cap on the number of relinearisation passes.
const MAX_PASSES: usize = 100;

/// Closed-form vertex fitter.
#[derive(Debug, Clone, Default)]
pub struct KalmanVertexFitter {
    settings: FitSettings,
}

impl KalmanVertexFitter {
    /// Create a fitter. Only `max_r` and `propagate_to_pca` are used.
    pub fn new(settings: FitSettings) -> Self {
        Self { settings }
    }
}

/// Merge `daughter` into `mother` under a common-position constraint.
///
/// Returns the combined state and its chi-square contribution.
pub fn merge_daughter(
    mother: &ParticleState,
    daughter: &ParticleState,
) -> Result<(ParticleState, f64)> {
    let zeta = daughter.position() - mother.position();
    let cm_r: SMatrix<f64, 7, 3> = mother.covariance.fixed_columns::<3>(0).into_owned();
    let cd_r: SMatrix<f64, 7, 3> = daughter.covariance.fixed_columns::<3>(0).into_owned();
    let s: Matrix3<f64> = mother.position_covariance() + daughter.position_covariance();
    let s_inv = s
        .cholesky()
        .ok_or_else(|| Error::Numerical("merge failed: residual covariance not SPD".to_string()))?
        .inverse();
    let chi2 = zeta.dot(&(s_inv * zeta));
    if !chi2.is_finite() || chi2 < 0.0 {
        return Err(Error::Numerical(format!("merge produced invalid chi2 {}", chi2)));
    }

    let km = cm_r * s_inv;
    let kd = cd_r * s_inv;

    let mut joint = SVector::<f64, 14>::zeros();
    joint.fixed_rows_mut::<7>(0).copy_from(&(mother.params + km * zeta));
    joint.fixed_rows_mut::<7>(7).copy_from(&(daughter.params - kd * zeta));

    let mut joint_cov = SMatrix::<f64, 14, 14>::zeros();
    let cmm: Matrix7 = mother.covariance - km * cm_r.transpose();
    let cdd: Matrix7 = daughter.covariance - kd * cd_r.transpose();
    let cmd: Matrix7 = km * cd_r.transpose();
    joint_cov.fixed_view_mut::<7, 7>(0, 0).copy_from(&cmm);
    joint_cov.fixed_view_mut::<7, 7>(7, 7).copy_from(&cdd);
    joint_cov.fixed_view_mut::<7, 7>(0, 7).copy_from(&cmd);
    joint_cov.fixed_view_mut::<7, 7>(7, 0).copy_from(&cmd.transpose());

    // Composite: constrained position of the mother, summed (p, E).
    let mut a = SMatrix::<f64, 7, 14>::zeros();
    for i in 0..3 {
        a[(i, i)] = 1.0;
    }
    for i in 3..7 {
        a[(i, i)] = 1.0;
        a[(i, i + 7)] = 1.0;
    }

    let params = a * joint;
    let covariance = symmetrize(&(a * joint_cov * a.transpose()));
    Ok((ParticleState { params, covariance, charge: mother.charge + daughter.charge }, chi2))
}

/// One pass: every prong transported to its closest approach with `vertex`,
/// then merged in order.
fn merge_at(
    measured: &[ParticleState; 3],
    vertex: &Vector3<f64>,
    bz: f64,
) -> Result<(ParticleState, f64)> {
    let [first, rest @ ..] = measured;
    let mut mother = first.transported(first.ds_to_point(vertex, bz), bz);
    let mut chi2 = 0.0;
    for daughter in rest {
        let at_pca = daughter.transported(daughter.ds_to_point(vertex, bz), bz);
        let (merged, dchi2) = merge_daughter(&mother, &at_pca)?;
        mother = merged;
        chi2 += dchi2;
    }
    Ok((mother, chi2))
}

impl VertexFitter for KalmanVertexFitter {
    fn fit(
        &self,
        prongs: &[ParticleHypothesis<'_>; 3],
        primary_vertex: &PrimaryVertex,
        bz: f64,
    ) -> Result<CompositeParticle> {
        let primary = ParticleState::from_vertex(primary_vertex)?;
        let measured = prong_states(prongs)?;

        let seed = pairwise_seed(&measured, 0.0)?;
        let (mut mother, mut chi2) = merge_at(&measured, &seed, bz)?;
        for _ in 1..MAX_PASSES {
            let (next, next_chi2) = merge_at(&measured, &mother.position(), bz)?;
            let moved = (next.position() - mother.position()).amax();
            mother = next;
            chi2 = next_chi2;
            if moved < VERTEX_TOLERANCE {
                break;
            }
        }

        let vertex = mother.position();
        self.settings.check_radius(&vertex)?;

        let at_vertex = [
            measured[0].transported(measured[0].ds_to_point(&vertex, bz), bz),
            measured[1].transported(measured[1].ds_to_point(&vertex, bz), bz),
            measured[2].transported(measured[2].ds_to_point(&vertex, bz), bz),
        ];
        let prong_momenta = reported_momenta(&self.settings, &measured, &at_vertex);
        let ndf = 2 * measured.len() as i32 - 3;

        CompositeParticle::new(mother, primary, chi2, ndf, prong_momenta, at_vertex)
    }

    fn name(&self) -> &str {
        "kalman"
    }
}
