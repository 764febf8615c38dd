//! # hf-core
//!
//! Shared building blocks for heavy-flavour 3-prong reconstruction:
//! - the error taxonomy used by the fitter and the matcher
//! - the input data model (tracks, primary vertices, triplets)
//! - the PDG species table
//! - the creator configuration bundle
//! - validation histograms with mergeable per-worker accumulation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod histogram;
pub mod pdg;
pub mod types;

pub use config::{CreatorConfig, FitterVariant};
pub use error::{Error, Result};
pub use histogram::Histogram1D;
pub use types::{Collision, PrimaryVertex, TrackIndexProng3, TrackRecord, TrackState};
