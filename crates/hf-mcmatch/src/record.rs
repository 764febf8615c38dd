//! Simulated event record: particles linked by mother and daughter indices.
//!
//! The record is read-only once built and can be shared across threads.
//! All walks are iterative, depth-capped at [`MAX_ANCESTRY_DEPTH`], and fail
//! with [`Error::Structural`] on dangling indices or revisits.

use std::collections::HashSet;

use hf_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Hard cap on the number of generations any walk may cross.
pub const MAX_ANCESTRY_DEPTH: usize = 64;

/// One simulated particle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct McParticle {
    /// Signed PDG code.
    pub pdg_code: i32,
    /// Index of the direct mother, if any.
    pub mother: Option<usize>,
    /// Inclusive range `(first, last)` of daughter indices, if any.
    pub daughters: Option<(usize, usize)>,
}

impl McParticle {
    /// Particle without links.
    pub fn new(pdg_code: i32) -> Self {
        Self { pdg_code, mother: None, daughters: None }
    }

    /// Daughter indices in record order.
    pub fn daughter_indices(&self) -> impl Iterator<Item = usize> + use<> {
        self.daughters.into_iter().flat_map(|(first, last)| first..=last)
    }
}

/// Read-only ancestry forest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McRecord {
    particles: Vec<McParticle>,
}

impl McRecord {
    /// Wrap an existing particle table as is. Links are checked lazily by the walks.
    pub fn from_particles(particles: Vec<McParticle>) -> Self {
        Self { particles }
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// Whether the record is empty.
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// All particles in record order.
    pub fn particles(&self) -> &[McParticle] {
        &self.particles
    }

    /// Particle at `index`.
    pub fn get(&self, index: usize) -> Option<&McParticle> {
        self.particles.get(index)
    }

    pub(crate) fn particle(&self, index: usize) -> Result<&McParticle> {
        self.particles.get(index).ok_or_else(|| {
            Error::Structural(format!(
                "particle index {} out of range (record has {})",
                index,
                self.particles.len()
            ))
        })
    }

    /// Walk the mother links of `start` (excluded) and return the first
    /// ancestor for which `hit` holds.
    ///
    /// With `max_depth = Some(d)` at most `d` generations are inspected;
    /// without it the walk runs to the root.
    fn walk_up<F>(&self, start: usize, max_depth: Option<usize>, mut hit: F) -> Result<Option<usize>>
    where
        F: FnMut(&McParticle) -> bool,
    {
        let mut visited = vec![start];
        let mut current = self.particle(start)?;
        let mut depth = 0;
        while let Some(mother) = current.mother {
            if max_depth.is_some_and(|d| depth >= d) {
                return Ok(None);
            }
            if depth >= MAX_ANCESTRY_DEPTH {
                return Err(Error::Structural(format!(
                    "ancestry of particle {} deeper than {} generations",
                    start, MAX_ANCESTRY_DEPTH
                )));
            }
            if visited.contains(&mother) {
                return Err(Error::Structural(format!(
                    "ancestry of particle {} revisits particle {}",
                    start, mother
                )));
            }
            visited.push(mother);
            current = self.particle(mother)?;
            depth += 1;
            if hit(current) {
                return Ok(Some(mother));
            }
        }
        Ok(None)
    }

    /// First ancestor of `start` whose code is `pdg_code`, or its conjugate
    /// when `accept_antiparticles` is set.
    ///
    /// Returns the ancestor index and `+1` or `-1` for a conjugate match.
    pub fn find_mother(
        &self,
        start: usize,
        pdg_code: i32,
        accept_antiparticles: bool,
        max_depth: Option<usize>,
    ) -> Result<Option<(usize, i8)>> {
        let found = self.walk_up(start, max_depth, |p| {
            p.pdg_code == pdg_code || (accept_antiparticles && p.pdg_code == -pdg_code)
        })?;
        Ok(found.map(|index| {
            let sign = if self.particles[index].pdg_code == pdg_code { 1 } else { -1 };
            (index, sign)
        }))
    }

    /// Whether any ancestor of `start` satisfies `predicate` on its code.
    pub fn has_ancestor<F>(&self, start: usize, predicate: F) -> Result<bool>
    where
        F: Fn(i32) -> bool,
    {
        Ok(self.walk_up(start, None, |p| predicate(p.pdg_code))?.is_some())
    }

    /// Final-state daughters of `particle`.
    ///
    /// Daughters are expanded until one of them is a leaf, carries one of
    /// `stop_codes` (compared by absolute value), or sits `max_depth`
    /// generations below `particle`. A particle without daughters has no
    /// final state. Output follows record order, depth first.
    pub fn final_daughters(
        &self,
        particle: usize,
        stop_codes: &[i32],
        max_depth: Option<usize>,
    ) -> Result<Vec<usize>> {
        let root = self.particle(particle)?;
        if root.daughters.is_none() {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![(particle, 0usize)];
        while let Some((index, stage)) = stack.pop() {
            if !seen.insert(index) {
                return Err(Error::Structural(format!(
                    "decay tree of particle {} reaches particle {} twice",
                    particle, index
                )));
            }
            if stage > MAX_ANCESTRY_DEPTH {
                return Err(Error::Structural(format!(
                    "decay tree of particle {} deeper than {} generations",
                    particle, MAX_ANCESTRY_DEPTH
                )));
            }
            let p = self.particle(index)?;
            let is_final = p.daughters.is_none()
                || max_depth.is_some_and(|d| stage >= d)
                || (stage > 0 && stop_codes.iter().any(|c| c.abs() == p.pdg_code.abs()));
            if is_final {
                out.push(index);
                continue;
            }
            let daughters: Vec<usize> = p.daughter_indices().collect();
            stack.extend(daughters.into_iter().rev().map(|d| (d, stage + 1)));
        }
        Ok(out)
    }

    /// Direct daughters of `particle`.
    pub fn immediate_daughters(&self, particle: usize) -> Result<Vec<usize>> {
        self.particle(particle)?
            .daughter_indices()
            .map(|d| self.particle(d).map(|_| d))
            .collect()
    }
}

/// Builds a [`McRecord`] from mother links, deriving the daughter ranges.
#[derive(Debug, Clone, Default)]
pub struct McRecordBuilder {
    entries: Vec<(i32, Option<usize>)>,
}

impl McRecordBuilder {
    /// Empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a particle and return its index.
    pub fn push(&mut self, pdg_code: i32, mother: Option<usize>) -> usize {
        self.entries.push((pdg_code, mother));
        self.entries.len() - 1
    }

    /// Resolve the daughter ranges.
    ///
    /// Daughters of one mother must occupy consecutive indices.
    pub fn build(self) -> Result<McRecord> {
        let n = self.entries.len();
        let mut particles: Vec<McParticle> = self
            .entries
            .iter()
            .map(|&(pdg_code, mother)| McParticle { pdg_code, mother, daughters: None })
            .collect();

        for (index, &(_, mother)) in self.entries.iter().enumerate() {
            let Some(m) = mother else { continue };
            if m >= n || m == index {
                return Err(Error::Structural(format!(
                    "particle {} has invalid mother index {}",
                    index, m
                )));
            }
            particles[m].daughters = match particles[m].daughters {
                None => Some((index, index)),
                Some((first, last)) if last + 1 == index => Some((first, index)),
                Some(_) => {
                    return Err(Error::Structural(format!(
                        "daughters of particle {} are not contiguous (particle {})",
                        m, index
                    )));
                }
            };
        }
        Ok(McRecord { particles })
    }
}
