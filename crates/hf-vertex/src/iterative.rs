//! Iterative weighted point-of-closest-approach vertex finder.
//!
//! Seeds come from the pairwise closest approaches of the three prongs. Each
//! iteration transports copies of the prongs to their closest approach with
//! the current vertex and moves the vertex to the inverse-covariance-weighted
//! mean of those points. Iteration stops when the largest coordinate change
//! drops below `min_param_change`, when `chi2 / chi2_old` exceeds
//! `min_rel_chi2_change`, or at `max_iterations`.

use hf_core::{Error, PrimaryVertex, Result};
use nalgebra::{Matrix3, Vector3};

use crate::fitter::{
    CompositeParticle, FitSettings, ParticleHypothesis, VertexFitter, pairwise_seed,
    prong_states, reported_momenta,
};
use crate::particle::{Matrix7, ParticleState, Vector7};

/// Iterative vertex fitter.
#[derive(Debug, Clone, Default)]
pub struct IterativeVertexFitter {
    settings: FitSettings,
}

/// One weighted-mean step.
struct Step {
    vertex: Vector3<f64>,
    covariance: Matrix3<f64>,
    chi2: f64,
}

impl IterativeVertexFitter {
    /// Create a fitter.
    pub fn new(settings: FitSettings) -> Self {
        Self { settings }
    }

    fn seed(&self, prongs: &[ParticleState; 3]) -> Result<Vector3<f64>> {
        pairwise_seed(prongs, self.settings.max_dz_ini)
    }

    fn step(prongs: &[ParticleState; 3], vertex: &Vector3<f64>, bz: f64) -> Result<Step> {
        let mut weight_sum = Matrix3::zeros();
        let mut weighted = Vector3::zeros();
        let mut points = Vec::with_capacity(3);
        for prong in prongs {
            let at_pca = prong.transported(prong.ds_to_point(vertex, bz), bz);
            let w = at_pca
                .position_covariance()
                .cholesky()
                .ok_or_else(|| {
                    Error::Numerical("prong position covariance not SPD at PCA".to_string())
                })?
                .inverse();
            let r = at_pca.position();
            weight_sum += w;
            weighted += w * r;
            points.push((r, w));
        }
        let covariance = weight_sum
            .cholesky()
            .ok_or_else(|| Error::Numerical("summed weight matrix not SPD".to_string()))?
            .inverse();
        let vertex = covariance * weighted;
        let chi2 = points
            .iter()
            .map(|(r, w)| {
                let d = r - vertex;
                d.dot(&(w * d))
            })
            .sum();
        Ok(Step { vertex, covariance, chi2 })
    }
}

impl VertexFitter for IterativeVertexFitter {
    fn fit(
        &self,
        prongs: &[ParticleHypothesis<'_>; 3],
        primary_vertex: &PrimaryVertex,
        bz: f64,
    ) -> Result<CompositeParticle> {
        let primary = ParticleState::from_vertex(primary_vertex)?;
        let measured = prong_states(prongs)?;

        let mut vertex = self.seed(&measured)?;
        self.settings.check_radius(&vertex)?;

        let mut chi2_old = f64::INFINITY;
        let mut last = None;
        for iteration in 0..self.settings.max_iterations {
            let step = Self::step(&measured, &vertex, bz)?;
            let change = (step.vertex - vertex).amax();
            let ratio = if chi2_old.is_finite() && chi2_old > 0.0 {
                step.chi2 / chi2_old
            } else {
                0.0
            };
            vertex = step.vertex;
            chi2_old = step.chi2;
            last = Some(step);
            if change < self.settings.min_param_change {
                break;
            }
            if iteration > 0 && ratio > self.settings.min_rel_chi2_change {
                break;
            }
        }
        let last = last.ok_or_else(|| Error::Validation("max_iterations must be >= 1".to_string()))?;
        self.settings.check_radius(&last.vertex)?;

        let at_vertex = [
            measured[0].transported(measured[0].ds_to_point(&last.vertex, bz), bz),
            measured[1].transported(measured[1].ds_to_point(&last.vertex, bz), bz),
            measured[2].transported(measured[2].ds_to_point(&last.vertex, bz), bz),
        ];

        // Composite: fitted vertex, summed (p, E), prongs treated as independent.
        let mut params = Vector7::zeros();
        let mut covariance = Matrix7::zeros();
        params.fixed_rows_mut::<3>(0).copy_from(&last.vertex);
        covariance.fixed_view_mut::<3, 3>(0, 0).copy_from(&last.covariance);
        let mut charge = 0;
        for prong in &at_vertex {
            let pe = prong.params.fixed_rows::<4>(3).into_owned();
            let mut sum = params.fixed_rows_mut::<4>(3);
            sum += pe;
            let block = prong.covariance.fixed_view::<4, 4>(3, 3).into_owned();
            let mut acc = covariance.fixed_view_mut::<4, 4>(3, 3);
            acc += block;
            charge += prong.charge;
        }
        let state = ParticleState { params, covariance, charge };

        let prong_momenta = reported_momenta(&self.settings, &measured, &at_vertex);
        let ndf = 2 * measured.len() as i32 - 3;
        CompositeParticle::new(state, primary, last.chi2, ndf, prong_momenta, at_vertex)
    }

    fn name(&self) -> &str {
        "iterative"
    }
}
