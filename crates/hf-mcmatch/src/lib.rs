//! # hf-mcmatch
//!
//! Monte Carlo truth matching for 3-prong heavy-flavour decays.
//!
//! This crate provides:
//! - a read-only simulated ancestry record with bounded, cycle-safe walks
//! - the 3-prong decay hypotheses with their resonant sub-channels
//! - reconstructed-triplet and generated-particle matching, serial or on the Rayon pool
//!
//! Matching never fails a batch: a corrupt record degrades the affected item
//! to [`MatchResult::UNMATCHED`] and logs a warning.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod hypothesis;
pub mod matcher;
pub mod record;

pub use hypothesis::{
    DecayHypothesis, DecayType, HYPOTHESES_3PRONG, LC_RESONANCES, MatchResult, OriginType,
    ResonantChannel,
};
pub use matcher::{DecayMatcher, ProngLinks};
pub use record::{MAX_ANCESTRY_DEPTH, McParticle, McRecord, McRecordBuilder};
