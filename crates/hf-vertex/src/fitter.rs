//! Vertex-fitter interface and the composite particle it produces.
//!
//! Two algorithms sit behind [`VertexFitter`]:
//! - [`KalmanVertexFitter`](crate::kalman::KalmanVertexFitter): closed-form
//!   merge of the daughter states, relinearised to a fixed point;
//! - [`IterativeVertexFitter`](crate::iterative::IterativeVertexFitter):
//!   weighted point-of-closest-approach minimiser.
//!
//! Both take the magnetic field as an explicit argument and leave the input
//! tracks untouched.

use hf_core::{CreatorConfig, Error, FitterVariant, PrimaryVertex, Result, TrackState, pdg};
use nalgebra::{Matrix3, Vector3, Vector4};
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::geometry::{self, ImpactParameter};
use crate::iterative::IterativeVertexFitter;
use crate::kalman::KalmanVertexFitter;
use crate::particle::{ParticleState, ds_between};

const PAIRS: [(usize, usize); 3] = [(0, 1), (0, 2), (1, 2)];

/// A track with an assumed species; the species only selects the mass.
#[derive(Debug, Clone, Copy)]
pub struct ParticleHypothesis<'a> {
    /// Measured track state.
    pub track: &'a TrackState,
    /// Assumed species code.
    pub pdg_code: i32,
    /// Nominal mass of the species.
    pub mass: f64,
}

impl<'a> ParticleHypothesis<'a> {
    /// Pair a track with a species from the PDG table.
    pub fn new(track: &'a TrackState, pdg_code: i32) -> Result<Self> {
        let mass = pdg::mass(pdg_code)
            .ok_or_else(|| Error::Validation(format!("species {} has no mass", pdg_code)))?;
        Ok(Self { track, pdg_code, mass })
    }

    /// Pair a track with an explicit mass.
    pub fn with_mass(track: &'a TrackState, pdg_code: i32, mass: f64) -> Self {
        Self { track, pdg_code, mass }
    }

    pub(crate) fn state(&self) -> Result<ParticleState> {
        ParticleState::from_track(self.track, self.mass)
    }
}

/// Fit limits shared by the variants.
#[derive(Debug, Clone, PartialEq)]
pub struct FitSettings {
    /// Report prong momenta at the fitted vertex.
    pub propagate_to_pca: bool,
    /// Maximum transverse radius of an accepted vertex.
    pub max_r: f64,
    /// Maximum pairwise z separation of the seeds (ignored if <= 0).
    pub max_dz_ini: f64,
    /// Stop when the largest coordinate change is below this.
    pub min_param_change: f64,
    /// Stop when `chi2 / chi2_old` is above this.
    pub min_rel_chi2_change: f64,
    /// Iteration cap.
    pub max_iterations: usize,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self::from(&CreatorConfig::default())
    }
}

impl From<&CreatorConfig> for FitSettings {
    fn from(cfg: &CreatorConfig) -> Self {
        Self {
            propagate_to_pca: cfg.propagate_to_pca,
            max_r: cfg.max_r,
            max_dz_ini: cfg.max_dz_ini,
            min_param_change: cfg.min_param_change,
            min_rel_chi2_change: cfg.min_rel_chi2_change,
            max_iterations: cfg.max_iterations,
        }
    }
}

impl FitSettings {
    pub(crate) fn check_radius(&self, vertex: &Vector3<f64>) -> Result<()> {
        let r = vertex.x.hypot(vertex.y);
        if !r.is_finite() || r > self.max_r {
            return Err(Error::Unphysical(format!(
                "vertex radius {:.3} cm exceeds max_r {:.3} cm",
                r, self.max_r
            )));
        }
        Ok(())
    }
}

/// Fitted 3-prong composite particle.
#[derive(Debug, Clone)]
pub struct CompositeParticle {
    /// Secondary-vertex position, summed four-momentum and their covariance.
    pub state: ParticleState,
    /// The primary vertex as a zero-daughter particle.
    pub primary: ParticleState,
    /// Fit chi-square.
    pub chi2: f64,
    /// Degrees of freedom of the fit.
    pub ndf: i32,
    /// Invariant mass from the summed four-momentum.
    pub mass: f64,
    /// Uncertainty on `mass`.
    pub mass_error: f64,
    /// Prong momenta, at the fitted vertex if propagation to the PCA is on.
    pub prong_momenta: [Vector3<f64>; 3],
    /// Prong states at the fitted vertex.
    pub prongs: [ParticleState; 3],
}

impl CompositeParticle {
    pub(crate) fn new(
        state: ParticleState,
        primary: ParticleState,
        chi2: f64,
        ndf: i32,
        prong_momenta: [Vector3<f64>; 3],
        prongs: [ParticleState; 3],
    ) -> Result<Self> {
        let (mass, mass_error) = invariant_mass(&state)?;
        Ok(Self { state, primary, chi2, ndf, mass, mass_error, prong_momenta, prongs })
    }

    /// Fitted secondary vertex.
    pub fn secondary_vertex(&self) -> Vector3<f64> {
        self.state.position()
    }

    /// 3×3 covariance of the secondary vertex.
    pub fn vertex_covariance(&self) -> Matrix3<f64> {
        self.state.position_covariance()
    }

    /// Composite momentum.
    pub fn momentum(&self) -> Vector3<f64> {
        self.state.momentum()
    }

    /// Transverse momentum.
    pub fn pt(&self) -> f64 {
        self.state.pt()
    }

    /// Chi-square probability of the fit; 1 when there are no degrees of freedom.
    pub fn probability(&self) -> f64 {
        if self.ndf <= 0 || !self.chi2.is_finite() {
            return 1.0;
        }
        match ChiSquared::new(self.ndf as f64) {
            Ok(dist) => dist.sf(self.chi2.max(0.0)),
            Err(_) => 1.0,
        }
    }

    /// Distance between the primary and secondary vertices.
    pub fn decay_length(&self) -> f64 {
        (self.secondary_vertex() - self.primary.position()).norm()
    }

    /// Transverse distance between the primary and secondary vertices.
    pub fn decay_length_xy(&self) -> f64 {
        let d = self.secondary_vertex() - self.primary.position();
        d.x.hypot(d.y)
    }

    /// Uncertainty of the decay length along the flight direction.
    pub fn error_decay_length(&self) -> f64 {
        let (phi, theta) =
            geometry::point_direction(&self.primary.position(), &self.secondary_vertex());
        self.projected_error(phi, theta)
    }

    /// Uncertainty of the transverse decay length.
    pub fn error_decay_length_xy(&self) -> f64 {
        let (phi, _) = geometry::point_direction(&self.primary.position(), &self.secondary_vertex());
        self.projected_error(phi, 0.0)
    }

    fn projected_error(&self, phi: f64, theta: f64) -> f64 {
        let total = self.primary.position_covariance() + self.vertex_covariance();
        geometry::projected_variance(&total, phi, theta).max(0.0).sqrt()
    }

    /// Cosine of the pointing angle.
    pub fn cpa(&self) -> f64 {
        geometry::cos_pointing_angle(
            &self.primary.position(),
            &self.secondary_vertex(),
            &self.momentum(),
        )
    }

    /// Cosine of the pointing angle in the transverse plane.
    pub fn cpa_xy(&self) -> f64 {
        geometry::cos_pointing_angle_xy(
            &self.primary.position(),
            &self.secondary_vertex(),
            &self.momentum(),
        )
    }

    /// Transverse impact parameters of the three prongs to the primary vertex.
    pub fn impact_parameters(&self, bz: f64) -> Result<[ImpactParameter; 3]> {
        Ok([
            geometry::impact_parameter_xy(&self.prongs[0], &self.primary, bz)?,
            geometry::impact_parameter_xy(&self.prongs[1], &self.primary, bz)?,
            geometry::impact_parameter_xy(&self.prongs[2], &self.primary, bz)?,
        ])
    }
}

/// Invariant mass and its uncertainty: `m² = E² − |p|²`.
///
/// A negative `m²` (spacelike sum) is a numerical failure.
pub fn invariant_mass(state: &ParticleState) -> Result<(f64, f64)> {
    let p = state.momentum();
    let e = state.energy();
    let m2 = e * e - p.norm_squared();
    if !m2.is_finite() || m2 < 0.0 {
        return Err(Error::Numerical(format!("spacelike four-momentum, m² = {:e}", m2)));
    }
    let m = m2.sqrt();
    // gradient of m² w.r.t. (px, py, pz, E)
    let h = Vector4::new(-2.0 * p.x, -2.0 * p.y, -2.0 * p.z, 2.0 * e);
    let c4 = state.covariance.fixed_view::<4, 4>(3, 3).into_owned();
    let var_m2 = h.dot(&(c4 * h)).max(0.0);
    let sigma = if m > 0.0 { var_m2.sqrt() / (2.0 * m) } else { var_m2.sqrt().sqrt() };
    Ok((m, sigma))
}

/// Common interface of the vertex-fitter variants.
pub trait VertexFitter: Send + Sync {
    /// Fit the three prongs into one composite particle.
    ///
    /// `bz` is the magnetic field along z in kG.
    fn fit(
        &self,
        prongs: &[ParticleHypothesis<'_>; 3],
        primary_vertex: &PrimaryVertex,
        bz: f64,
    ) -> Result<CompositeParticle>;

    /// Algorithm name.
    fn name(&self) -> &str;
}

/// Instantiate the fitter selected by `variant`.
pub fn build_fitter(variant: FitterVariant, settings: FitSettings) -> Box<dyn VertexFitter> {
    match variant {
        FitterVariant::Kalman => Box::new(KalmanVertexFitter::new(settings)),
        FitterVariant::Iterative => Box::new(IterativeVertexFitter::new(settings)),
    }
}

pub(crate) fn prong_states(prongs: &[ParticleHypothesis<'_>; 3]) -> Result<[ParticleState; 3]> {
    Ok([prongs[0].state()?, prongs[1].state()?, prongs[2].state()?])
}

/// Mean of the pairwise straight-line closest approaches.
///
/// With `max_dz_ini > 0` a pair whose closest-approach points are further
/// apart than that in z is rejected as unphysical.
pub(crate) fn pairwise_seed(prongs: &[ParticleState; 3], max_dz_ini: f64) -> Result<Vector3<f64>> {
    let mut seed = Vector3::zeros();
    for (i, j) in PAIRS {
        let (si, sj) = ds_between(&prongs[i], &prongs[j])?;
        // Seeds use straight lines; the field enters from the first pass on.
        let pi = prongs[i].transported(si, 0.0).position();
        let pj = prongs[j].transported(sj, 0.0).position();
        if max_dz_ini > 0.0 && (pi.z - pj.z).abs() > max_dz_ini {
            return Err(Error::Unphysical(format!(
                "prongs {} and {} are {:.3} cm apart in z at initialisation",
                i,
                j,
                (pi.z - pj.z).abs()
            )));
        }
        seed += 0.5 * (pi + pj);
    }
    Ok(seed / PAIRS.len() as f64)
}

/// Prong momenta reported with the fit: at the vertex or at the reference point.
pub(crate) fn reported_momenta(
    settings: &FitSettings,
    measured: &[ParticleState; 3],
    at_vertex: &[ParticleState; 3],
) -> [Vector3<f64>; 3] {
    let source = if settings.propagate_to_pca { at_vertex } else { measured };
    [source[0].momentum(), source[1].momentum(), source[2].momentum()]
}
