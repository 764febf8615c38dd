//! Candidate creation: fit every triplet and emit one row per accepted fit.
//!
//! Triplets are independent. They are processed on the Rayon pool, each
//! worker folding into its own partial (rows, histograms, counters); the
//! partials are reduced at the end. Per-triplet numerical, unphysical and
//! structural failures only drop that triplet.

use hf_core::types::packed_index;
use hf_core::{
    Collision, CreatorConfig, Error, Histogram1D, PrimaryVertex, Result, TrackIndexProng3,
    TrackRecord,
};
use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;

use crate::fitter::{FitSettings, ParticleHypothesis, VertexFitter, build_fitter};
use crate::geometry::{self, ImpactParameter};

/// One fitted 3-prong candidate, ready for tabular storage.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate3Prong {
    /// Position of the originating triplet in the input.
    pub triplet_index: usize,
    /// Global index of the collision.
    pub collision_id: usize,
    /// Primary-vertex position.
    pub primary_vertex: Vector3<f64>,
    /// Packed primary-vertex covariance.
    pub primary_vertex_covariance: [f64; 6],
    /// Fitted secondary-vertex position.
    pub secondary_vertex: Vector3<f64>,
    /// Packed secondary-vertex covariance.
    pub secondary_vertex_covariance: [f64; 6],
    /// Uncertainty of the decay length.
    pub error_decay_length: f64,
    /// Uncertainty of the transverse decay length.
    pub error_decay_length_xy: f64,
    /// Fit chi-square.
    pub chi2_pca: f64,
    /// Fit chi-square probability.
    pub fit_probability: f64,
    /// Composite momentum.
    pub momentum: Vector3<f64>,
    /// Invariant mass under the configured prong hypotheses.
    pub mass: f64,
    /// Uncertainty on `mass`.
    pub mass_error: f64,
    /// Prong momenta.
    pub prong_momenta: [Vector3<f64>; 3],
    /// Prong impact parameters to the primary vertex.
    pub impact_parameters: [ImpactParameter; 3],
    /// Global indices of the prong tracks.
    pub prong_track_ids: [usize; 3],
    /// Preselection bits carried over from the triplet.
    pub hf_flag: u8,
}

fn pack3(m: &Matrix3<f64>) -> [f64; 6] {
    let mut out = [0.0; 6];
    for i in 0..3 {
        for j in 0..=i {
            out[packed_index(i, j)] = m[(i, j)];
        }
    }
    out
}

impl Candidate3Prong {
    /// Transverse momentum.
    pub fn pt(&self) -> f64 {
        self.momentum.x.hypot(self.momentum.y)
    }

    /// Momentum magnitude.
    pub fn p(&self) -> f64 {
        self.momentum.norm()
    }

    /// Decay length.
    pub fn decay_length(&self) -> f64 {
        (self.secondary_vertex - self.primary_vertex).norm()
    }

    /// Transverse decay length.
    pub fn decay_length_xy(&self) -> f64 {
        let d = self.secondary_vertex - self.primary_vertex;
        d.x.hypot(d.y)
    }

    /// Decay length in units of its uncertainty.
    pub fn decay_length_normalised(&self) -> f64 {
        if self.error_decay_length > 0.0 {
            self.decay_length() / self.error_decay_length
        } else {
            0.0
        }
    }

    /// Transverse decay length in units of its uncertainty.
    pub fn decay_length_xy_normalised(&self) -> f64 {
        if self.error_decay_length_xy > 0.0 {
            self.decay_length_xy() / self.error_decay_length_xy
        } else {
            0.0
        }
    }

    /// Cosine of the pointing angle.
    pub fn cpa(&self) -> f64 {
        geometry::cos_pointing_angle(&self.primary_vertex, &self.secondary_vertex, &self.momentum)
    }

    /// Cosine of the pointing angle in the transverse plane.
    pub fn cpa_xy(&self) -> f64 {
        geometry::cos_pointing_angle_xy(
            &self.primary_vertex,
            &self.secondary_vertex,
            &self.momentum,
        )
    }

    /// Product of the three prong impact parameters.
    pub fn impact_parameter_product(&self) -> f64 {
        self.impact_parameters.iter().map(|ip| ip.value).product()
    }
}

/// Validation histograms of the creator.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationHistograms {
    /// Invariant mass (p K π).
    pub mass: Histogram1D,
    /// XX element of the primary-vertex covariance.
    pub cov_pv_xx: Histogram1D,
    /// XX element of the secondary-vertex covariance.
    pub cov_sv_xx: Histogram1D,
}

impl ValidationHistograms {
    /// Empty histograms with the standard binning.
    pub fn new() -> Result<Self> {
        Ok(Self {
            mass: Histogram1D::new(
                "hmass3",
                "3-prong candidates;inv. mass (p K #pi) (GeV/#it{c}^{2});entries",
                300,
                2.1,
                2.4,
            )?,
            cov_pv_xx: Histogram1D::new(
                "hCovPVXX",
                "3-prong candidates;XX element of cov. matrix of prim. vtx position (cm^{2});entries",
                100,
                0.0,
                1e-4,
            )?,
            cov_sv_xx: Histogram1D::new(
                "hCovSVXX",
                "3-prong candidates;XX element of cov. matrix of sec. vtx position (cm^{2});entries",
                100,
                0.0,
                0.2,
            )?,
        })
    }

    /// Fill the primary-vertex plot; called for every triplet whose collision resolves.
    pub fn fill_primary(&mut self, vertex: &PrimaryVertex) {
        self.cov_pv_xx.fill(vertex.covariance[0]);
    }

    /// Fill the candidate plots from one accepted fit.
    pub fn fill(&mut self, candidate: &Candidate3Prong) {
        self.mass.fill(candidate.mass);
        self.cov_sv_xx.fill(candidate.secondary_vertex_covariance[0]);
    }

    /// Add another partial.
    pub fn merge(&mut self, other: &ValidationHistograms) -> Result<()> {
        self.mass.merge(&other.mass)?;
        self.cov_pv_xx.merge(&other.cov_pv_xx)?;
        self.cov_sv_xx.merge(&other.cov_sv_xx)?;
        Ok(())
    }
}

/// Per-outcome triplet counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipSummary {
    /// Triplets that produced a candidate.
    pub accepted: usize,
    /// Singular covariances or degenerate geometry.
    pub numerical: usize,
    /// Vertices outside the configured bounds.
    pub unphysical: usize,
    /// Triplets pointing at missing tracks or collisions.
    pub structural: usize,
}

impl SkipSummary {
    fn record(&mut self, err: &Error) {
        match err {
            Error::Unphysical(_) => self.unphysical += 1,
            Error::Structural(_) => self.structural += 1,
            _ => self.numerical += 1,
        }
    }

    fn merge(&mut self, other: &SkipSummary) {
        self.accepted += other.accepted;
        self.numerical += other.numerical;
        self.unphysical += other.unphysical;
        self.structural += other.structural;
    }

    /// Total number of triplets seen.
    pub fn total(&self) -> usize {
        self.accepted + self.numerical + self.unphysical + self.structural
    }
}

/// Result of one creator pass.
#[derive(Debug, Clone)]
pub struct CreatorOutput {
    /// Accepted candidates, ordered by triplet index.
    pub candidates: Vec<Candidate3Prong>,
    /// Validation histograms, if enabled.
    pub histograms: Option<ValidationHistograms>,
    /// Outcome counters.
    pub summary: SkipSummary,
}

struct Partial {
    candidates: Vec<Candidate3Prong>,
    histograms: Option<ValidationHistograms>,
    summary: SkipSummary,
}

impl Partial {
    fn new(histograms: Option<ValidationHistograms>) -> Self {
        Self { candidates: Vec::new(), histograms, summary: SkipSummary::default() }
    }

    fn merge(mut self, mut other: Partial) -> Result<Partial> {
        self.candidates.append(&mut other.candidates);
        if let (Some(a), Some(b)) = (self.histograms.as_mut(), other.histograms.as_ref()) {
            a.merge(b)?;
        }
        self.summary.merge(&other.summary);
        Ok(self)
    }
}

/// 3-prong candidate creator.
pub struct CandidateCreator {
    config: CreatorConfig,
    masses: [f64; 3],
    fitter: Box<dyn VertexFitter>,
}

impl std::fmt::Debug for CandidateCreator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateCreator")
            .field("config", &self.config)
            .field("fitter", &self.fitter.name())
            .finish()
    }
}

impl CandidateCreator {
    /// Validate the configuration and build the selected fitter.
    pub fn new(config: CreatorConfig) -> Result<Self> {
        config.validate()?;
        let masses = config.prong_masses()?;
        let fitter = build_fitter(config.fitter, FitSettings::from(&config));
        Ok(Self { config, masses, fitter })
    }

    /// Configuration in use.
    pub fn config(&self) -> &CreatorConfig {
        &self.config
    }

    /// Name of the active fitter variant.
    pub fn fitter_name(&self) -> &str {
        self.fitter.name()
    }

    /// Fit one triplet.
    pub fn process_triplet(
        &self,
        triplet_index: usize,
        triplet: &TrackIndexProng3,
        collisions: &[Collision],
        tracks: &[TrackRecord],
    ) -> Result<Candidate3Prong> {
        let (records, collision) = Self::resolve(triplet_index, triplet, collisions, tracks)?;
        self.fit_resolved(triplet_index, triplet, &records, collision)
    }

    /// Look up the prong tracks and the collision of the first prong.
    fn resolve<'a>(
        triplet_index: usize,
        triplet: &TrackIndexProng3,
        collisions: &'a [Collision],
        tracks: &'a [TrackRecord],
    ) -> Result<([&'a TrackRecord; 3], &'a Collision)> {
        let lookup = |slot: usize| {
            let idx = triplet.prongs[slot];
            tracks.get(idx).ok_or_else(|| {
                Error::Structural(format!(
                    "triplet {} prong {} refers to missing track {}",
                    triplet_index, slot, idx
                ))
            })
        };
        let records = [lookup(0)?, lookup(1)?, lookup(2)?];
        let collision = collisions.get(records[0].collision).ok_or_else(|| {
            Error::Structural(format!(
                "triplet {} refers to missing collision {}",
                triplet_index, records[0].collision
            ))
        })?;
        Ok((records, collision))
    }

    fn fit_resolved(
        &self,
        triplet_index: usize,
        triplet: &TrackIndexProng3,
        records: &[&TrackRecord; 3],
        collision: &Collision,
    ) -> Result<Candidate3Prong> {
        let species = self.config.prong_species;
        let hypotheses = [
            ParticleHypothesis::with_mass(&records[0].state, species[0], self.masses[0]),
            ParticleHypothesis::with_mass(&records[1].state, species[1], self.masses[1]),
            ParticleHypothesis::with_mass(&records[2].state, species[2], self.masses[2]),
        ];

        let bz = self.config.bz;
        let composite = self.fitter.fit(&hypotheses, &collision.vertex, bz)?;
        let impact_parameters = composite.impact_parameters(bz)?;

        Ok(Candidate3Prong {
            triplet_index,
            collision_id: collision.global_index,
            primary_vertex: composite.primary.position(),
            primary_vertex_covariance: collision.vertex.covariance,
            secondary_vertex: composite.secondary_vertex(),
            secondary_vertex_covariance: pack3(&composite.vertex_covariance()),
            error_decay_length: composite.error_decay_length(),
            error_decay_length_xy: composite.error_decay_length_xy(),
            chi2_pca: composite.chi2,
            fit_probability: composite.probability(),
            momentum: composite.momentum(),
            mass: composite.mass,
            mass_error: composite.mass_error,
            prong_momenta: composite.prong_momenta,
            impact_parameters,
            prong_track_ids: [
                records[0].global_index,
                records[1].global_index,
                records[2].global_index,
            ],
            hf_flag: triplet.hf_flag,
        })
    }

    /// Fit all triplets in parallel.
    ///
    /// Only non-item errors (e.g. inconsistent histogram binning) abort.
    pub fn process(
        &self,
        collisions: &[Collision],
        tracks: &[TrackRecord],
        triplets: &[TrackIndexProng3],
    ) -> Result<CreatorOutput> {
        let template = if self.config.do_validation_plots {
            Some(ValidationHistograms::new()?)
        } else {
            None
        };

        let total = triplets
            .par_iter()
            .enumerate()
            .fold(
                || Ok(Partial::new(template.clone())),
                |acc: Result<Partial>, (index, triplet)| {
                    let mut part = acc?;
                    let outcome = Self::resolve(index, triplet, collisions, tracks).and_then(
                        |(records, collision)| {
                            if let Some(h) = part.histograms.as_mut() {
                                h.fill_primary(&collision.vertex);
                            }
                            self.fit_resolved(index, triplet, &records, collision)
                        },
                    );
                    match outcome {
                        Ok(candidate) => {
                            if let Some(h) = part.histograms.as_mut() {
                                h.fill(&candidate);
                            }
                            part.candidates.push(candidate);
                            part.summary.accepted += 1;
                        }
                        Err(e) if e.is_item_level() => {
                            if matches!(e, Error::Structural(_)) {
                                log::warn!("triplet {} skipped: {}", index, e);
                            } else {
                                log::debug!("triplet {} skipped: {}", index, e);
                            }
                            part.summary.record(&e);
                        }
                        Err(e) => return Err(e),
                    }
                    Ok(part)
                },
            )
            .try_reduce(|| Partial::new(template.clone()), Partial::merge)?;

        let mut candidates = total.candidates;
        candidates.sort_by_key(|c| c.triplet_index);

        let summary = total.summary;
        log::info!(
            "3-prong creator ({}): {} accepted, {} numerical, {} unphysical, {} structural",
            self.fitter.name(),
            summary.accepted,
            summary.numerical,
            summary.unphysical,
            summary.structural
        );

        Ok(CreatorOutput { candidates, histograms: total.histograms, summary })
    }
}
