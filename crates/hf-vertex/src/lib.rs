//! # hf-vertex
//!
//! Secondary-vertex reconstruction for 3-prong heavy-flavour decays.
//!
//! This crate provides:
//! - Gaussian particle states with helix transport in a homogeneous field
//! - a closed-form Kalman merge and an iterative PCA vertex fitter behind one trait
//! - decay-length, pointing-angle and impact-parameter geometry
//! - a parallel candidate creator with mergeable validation histograms

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Candidate creation over triplet tables.
pub mod creator;
/// Fitter trait, fit settings and the composite particle.
pub mod fitter;
/// Geometry relative to the primary vertex.
pub mod geometry;
/// Iterative PCA vertex fitter.
pub mod iterative;
/// Closed-form Kalman merge vertex fitter.
pub mod kalman;
/// Particle states and transport.
pub mod particle;

pub use creator::{
    Candidate3Prong, CandidateCreator, CreatorOutput, SkipSummary, ValidationHistograms,
};
pub use fitter::{
    CompositeParticle, FitSettings, ParticleHypothesis, VertexFitter, build_fitter,
    invariant_mass,
};
pub use geometry::ImpactParameter;
pub use iterative::IterativeVertexFitter;
pub use kalman::KalmanVertexFitter;
pub use particle::{C_LIGHT, ParticleState};
