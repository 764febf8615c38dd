//! Decay hypotheses and the classification they produce.
//!
//! Hypotheses are plain data: the matcher walks [`HYPOTHESES_3PRONG`] in
//! order and stops at the first hit, so more specific decays must come
//! before generic ones sharing the same final state.

use hf_core::pdg;
use serde::{Deserialize, Serialize};

/// Bit position of each 3-prong decay in [`MatchResult::flag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DecayType {
    /// D± → π± K∓ π±
    DPlusToPiKPi = 0,
    /// Λc± → p± K∓ π±
    LcToPKPi = 1,
    /// Ds± → K± K∓ π±
    DsToKKPi = 2,
    /// Ξc± → p± K∓ π±
    XicToPKPi = 3,
}

impl DecayType {
    /// Bit position.
    pub const fn bit(self) -> u8 {
        self as u8
    }

    /// Signed flag value: `sign · 2^bit`.
    pub const fn flag(self, sign: i8) -> i8 {
        sign * (1 << self.bit())
    }

    fn from_bit(bit: u32) -> Option<Self> {
        match bit {
            0 => Some(Self::DPlusToPiKPi),
            1 => Some(Self::LcToPKPi),
            2 => Some(Self::DsToKKPi),
            3 => Some(Self::XicToPKPi),
            _ => None,
        }
    }
}

/// Production origin of a matched particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum OriginType {
    /// Not matched.
    None = 0,
    /// No bottom-flavour ancestor.
    Prompt = 1,
    /// Produced in the decay chain of a bottom-flavour ancestor.
    NonPrompt = 2,
}

/// Intermediate two-body state that tags a sub-channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResonantChannel {
    /// Absolute codes of the two immediate daughters, in any order.
    pub daughters: [i32; 2],
    /// Sub-channel tag.
    pub channel: i8,
}

impl ResonantChannel {
    /// Whether two immediate daughter codes form this pair.
    pub fn matches(&self, a: i32, b: i32) -> bool {
        let (a, b) = (a.abs(), b.abs());
        let [x, y] = self.daughters;
        (a == x && b == y) || (a == y && b == x)
    }
}

/// One expected decay topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecayHypothesis {
    /// Flag bit assigned on a match.
    pub decay: DecayType,
    /// Parent code.
    pub parent: i32,
    /// Final-state daughter codes for the particle (not the antiparticle).
    pub daughters: [i32; 3],
    /// Also match the charge conjugate, flipping every code.
    pub accept_antiparticles: bool,
    /// Generations between the parent and its final-state daughters.
    pub depth: usize,
    /// Sub-channel table, checked against the parent's immediate daughters.
    pub resonances: &'static [ResonantChannel],
}

impl DecayHypothesis {
    /// Sub-channel for the given immediate daughter codes.
    ///
    /// Only a two-body first step can carry a resonance; anything else is 0.
    pub fn resolve_channel(&self, immediate: &[i32]) -> i8 {
        match immediate {
            [a, b] => self
                .resonances
                .iter()
                .find(|r| r.matches(*a, *b))
                .map_or(0, |r| r.channel),
            _ => 0,
        }
    }
}

/// Λc± resonant sub-channels.
pub const LC_RESONANCES: [ResonantChannel; 3] = [
    ResonantChannel { daughters: [pdg::PROTON, pdg::K_STAR_0], channel: 1 },
    ResonantChannel { daughters: [pdg::DELTA_PLUS_PLUS, pdg::K_PLUS], channel: 2 },
    ResonantChannel { daughters: [pdg::LAMBDA_1520, pdg::PI_PLUS], channel: 3 },
];

/// 3-prong hypotheses in priority order.
pub static HYPOTHESES_3PRONG: [DecayHypothesis; 3] = [
    DecayHypothesis {
        decay: DecayType::DPlusToPiKPi,
        parent: pdg::D_PLUS,
        daughters: [pdg::PI_PLUS, -pdg::K_PLUS, pdg::PI_PLUS],
        accept_antiparticles: true,
        depth: 1,
        resonances: &[],
    },
    DecayHypothesis {
        decay: DecayType::LcToPKPi,
        parent: pdg::LAMBDA_C_PLUS,
        daughters: [pdg::PROTON, -pdg::K_PLUS, pdg::PI_PLUS],
        accept_antiparticles: true,
        depth: 2,
        resonances: &LC_RESONANCES,
    },
    DecayHypothesis {
        decay: DecayType::XicToPKPi,
        parent: pdg::XI_C_PLUS,
        daughters: [pdg::PROTON, -pdg::K_PLUS, pdg::PI_PLUS],
        accept_antiparticles: true,
        depth: 1,
        resonances: &[],
    },
];

/// Truth classification of one candidate or simulated particle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchResult {
    /// `sign · 2^bit` of the matched [`DecayType`], 0 if unmatched.
    pub flag: i8,
    /// [`OriginType`] as its integer value.
    pub origin: i8,
    /// Sub-channel tag, 0 if none.
    pub channel: i8,
}

impl MatchResult {
    /// The no-match classification.
    pub const UNMATCHED: MatchResult = MatchResult { flag: 0, origin: 0, channel: 0 };

    /// Whether a hypothesis matched.
    pub fn is_matched(&self) -> bool {
        self.flag != 0
    }

    /// `+1` for a particle, `-1` for an antiparticle, 0 if unmatched.
    pub fn sign(&self) -> i8 {
        self.flag.signum()
    }

    /// Matched decay, if any.
    pub fn decay_type(&self) -> Option<DecayType> {
        let magnitude = self.flag.unsigned_abs();
        if magnitude.is_power_of_two() {
            DecayType::from_bit(magnitude.trailing_zeros())
        } else {
            None
        }
    }

    /// Matched origin.
    pub fn origin_type(&self) -> OriginType {
        match self.origin {
            1 => OriginType::Prompt,
            2 => OriginType::NonPrompt,
            _ => OriginType::None,
        }
    }
}
