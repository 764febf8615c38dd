//! Reconstructed and generated truth matching against decay hypotheses.
//!
//! A reconstructed triplet matches when the first prong has an ancestor with
//! the parent code within the hypothesis depth, that ancestor has exactly
//! three final-state daughters, every prong is one of them, and the prong
//! codes equal the expected codes up to a global sign. A generated particle
//! matches when its own code is the parent code and its final-state
//! daughters satisfy the same code check.

use hf_core::{Error, Result, pdg};
use rayon::prelude::*;

use crate::hypothesis::{DecayHypothesis, HYPOTHESES_3PRONG, MatchResult, OriginType};
use crate::record::McRecord;

/// MC links of a reconstructed triplet: one optional particle index per prong.
pub type ProngLinks = [Option<usize>; 3];

/// Truth matcher over an ordered hypothesis list.
#[derive(Debug, Clone, Copy)]
pub struct DecayMatcher {
    hypotheses: &'static [DecayHypothesis],
}

impl Default for DecayMatcher {
    fn default() -> Self {
        Self::new(&HYPOTHESES_3PRONG)
    }
}

/// Whether `codes` equal `expected` as multisets once `expected` is multiplied by `sign`.
fn codes_match(codes: &[i32], expected: &[i32; 3], sign: i8) -> bool {
    if codes.len() != expected.len() {
        return false;
    }
    let mut used = [false; 3];
    codes.iter().all(|&code| {
        let slot = expected
            .iter()
            .enumerate()
            .position(|(j, &e)| !used[j] && code == i32::from(sign) * e);
        match slot {
            Some(j) => {
                used[j] = true;
                true
            }
            None => false,
        }
    })
}

impl DecayMatcher {
    /// Matcher over `hypotheses`, tried in order.
    pub fn new(hypotheses: &'static [DecayHypothesis]) -> Self {
        Self { hypotheses }
    }

    /// Hypotheses in priority order.
    pub fn hypotheses(&self) -> &'static [DecayHypothesis] {
        self.hypotheses
    }

    fn codes(record: &McRecord, indices: &[usize]) -> Result<Vec<i32>> {
        indices.iter().map(|&i| record.particle(i).map(|p| p.pdg_code)).collect()
    }

    /// Complete a match on `mother`: sub-channel and origin.
    fn classify(
        record: &McRecord,
        hypothesis: &DecayHypothesis,
        mother: usize,
        sign: i8,
    ) -> Result<MatchResult> {
        let channel = if hypothesis.resonances.is_empty() {
            0
        } else {
            let immediate = record.immediate_daughters(mother)?;
            hypothesis.resolve_channel(&Self::codes(record, &immediate)?)
        };
        let origin = if record.has_ancestor(mother, pdg::is_bottom_flavour)? {
            OriginType::NonPrompt
        } else {
            OriginType::Prompt
        };
        Ok(MatchResult { flag: hypothesis.decay.flag(sign), origin: origin as i8, channel })
    }

    fn reconstructed_mother(
        record: &McRecord,
        hypothesis: &DecayHypothesis,
        prongs: &[usize; 3],
    ) -> Result<Option<(usize, i8)>> {
        let Some((mother, sign)) = record.find_mother(
            prongs[0],
            hypothesis.parent,
            hypothesis.accept_antiparticles,
            Some(hypothesis.depth),
        )?
        else {
            return Ok(None);
        };
        let finals = record.final_daughters(mother, &hypothesis.daughters, Some(hypothesis.depth))?;
        if finals.len() != hypothesis.daughters.len() || !prongs.iter().all(|p| finals.contains(p)) {
            return Ok(None);
        }
        let codes = Self::codes(record, prongs)?;
        Ok(codes_match(&codes, &hypothesis.daughters, sign).then_some((mother, sign)))
    }

    /// Classify a reconstructed triplet, reporting structural problems.
    pub fn try_match_reconstructed(&self, record: &McRecord, links: ProngLinks) -> Result<MatchResult> {
        let [Some(a), Some(b), Some(c)] = links else {
            return Ok(MatchResult::UNMATCHED);
        };
        let prongs = [a, b, c];
        if a == b || a == c || b == c {
            return Ok(MatchResult::UNMATCHED);
        }
        for hypothesis in self.hypotheses {
            if let Some((mother, sign)) = Self::reconstructed_mother(record, hypothesis, &prongs)? {
                return Self::classify(record, hypothesis, mother, sign);
            }
        }
        Ok(MatchResult::UNMATCHED)
    }

    /// Classify one simulated particle, reporting structural problems.
    pub fn try_match_generated(&self, record: &McRecord, index: usize) -> Result<MatchResult> {
        let code = record.particle(index)?.pdg_code;
        for hypothesis in self.hypotheses {
            let sign: i8 = if code == hypothesis.parent {
                1
            } else if hypothesis.accept_antiparticles && code == -hypothesis.parent {
                -1
            } else {
                continue;
            };
            let finals =
                record.final_daughters(index, &hypothesis.daughters, Some(hypothesis.depth))?;
            if codes_match(&Self::codes(record, &finals)?, &hypothesis.daughters, sign) {
                return Self::classify(record, hypothesis, index, sign);
            }
        }
        Ok(MatchResult::UNMATCHED)
    }

    /// Classify a reconstructed triplet; a corrupt record yields no match.
    pub fn match_reconstructed(&self, record: &McRecord, links: ProngLinks) -> MatchResult {
        self.try_match_reconstructed(record, links)
            .unwrap_or_else(|e| degraded("reconstructed triplet", &e))
    }

    /// Classify one simulated particle; a corrupt record yields no match.
    pub fn match_generated(&self, record: &McRecord, index: usize) -> MatchResult {
        self.try_match_generated(record, index)
            .unwrap_or_else(|e| degraded(&format!("generated particle {}", index), &e))
    }

    /// Classify every triplet in parallel, in input order.
    pub fn match_reconstructed_all(&self, record: &McRecord, links: &[ProngLinks]) -> Vec<MatchResult> {
        let out: Vec<MatchResult> =
            links.par_iter().map(|&l| self.match_reconstructed(record, l)).collect();
        log_summary("reconstructed", &out);
        out
    }

    /// Classify every simulated particle in parallel, in record order.
    pub fn match_generated_all(&self, record: &McRecord) -> Vec<MatchResult> {
        let out: Vec<MatchResult> =
            (0..record.len()).into_par_iter().map(|i| self.match_generated(record, i)).collect();
        log_summary("generated", &out);
        out
    }
}

fn degraded(what: &str, err: &Error) -> MatchResult {
    log::warn!("{} left unmatched: {}", what, err);
    MatchResult::UNMATCHED
}

fn log_summary(side: &str, results: &[MatchResult]) {
    let matched = results.iter().filter(|r| r.is_matched()).count();
    let non_prompt = results.iter().filter(|r| r.origin_type() == OriginType::NonPrompt).count();
    log::info!(
        "MC matching ({}): {} of {} matched, {} non-prompt",
        side,
        matched,
        results.len(),
        non_prompt
    );
}
