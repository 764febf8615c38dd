//! Configuration bundle for the 3-prong candidate creator.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::pdg;
use crate::{Error, Result};

/// Vertex-finding algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitterVariant {
    /// Closed-form Kalman merge of the daughter states.
    #[default]
    Kalman,
    /// Iterative inverse-covariance-weighted point-of-closest-approach minimiser.
    Iterative,
}

/// Creator configuration.
///
/// Lengths are in cm, the magnetic field in kG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreatorConfig {
    /// Magnetic field along z.
    pub bz: f64,
    /// Report prong momenta at the fitted vertex rather than at the track reference point.
    pub propagate_to_pca: bool,
    /// Reject vertices with a transverse radius above this.
    pub max_r: f64,
    /// Reject (if > 0) seeds whose pairwise z separation exceeds this. Iterative variant only.
    pub max_dz_ini: f64,
    /// Stop when the largest vertex-coordinate change is below this. Iterative variant only.
    pub min_param_change: f64,
    /// Stop when `chi2 / chi2_old` is above this. Iterative variant only.
    pub min_rel_chi2_change: f64,
    /// Hard cap on iterations. Iterative variant only.
    pub max_iterations: usize,
    /// Fill validation histograms.
    pub do_validation_plots: bool,
    /// Vertex-finding algorithm.
    pub fitter: FitterVariant,
    /// Mass-hypothesis species per prong slot: baryon, kaon, pion.
    pub prong_species: [i32; 3],
}

impl Default for CreatorConfig {
    fn default() -> Self {
        Self {
            bz: 5.0,
            propagate_to_pca: true,
            max_r: 200.0,
            max_dz_ini: 4.0,
            min_param_change: 1e-3,
            min_rel_chi2_change: 0.9,
            max_iterations: 20,
            do_validation_plots: true,
            fitter: FitterVariant::Kalman,
            prong_species: [pdg::PROTON, -pdg::K_PLUS, pdg::PI_PLUS],
        }
    }
}

impl CreatorConfig {
    /// Parse and validate a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check every knob; called once at startup.
    pub fn validate(&self) -> Result<()> {
        if !self.bz.is_finite() {
            return Err(Error::Validation(format!("bz must be finite, got {}", self.bz)));
        }
        if !self.max_r.is_finite() || self.max_r <= 0.0 {
            return Err(Error::Validation(format!("max_r must be finite and > 0, got {}", self.max_r)));
        }
        if !self.max_dz_ini.is_finite() {
            return Err(Error::Validation(format!(
                "max_dz_ini must be finite, got {}",
                self.max_dz_ini
            )));
        }
        if !self.min_param_change.is_finite() || self.min_param_change <= 0.0 {
            return Err(Error::Validation(format!(
                "min_param_change must be finite and > 0, got {}",
                self.min_param_change
            )));
        }
        if !(self.min_rel_chi2_change > 0.0 && self.min_rel_chi2_change <= 1.0) {
            return Err(Error::Validation(format!(
                "min_rel_chi2_change must be in (0, 1], got {}",
                self.min_rel_chi2_change
            )));
        }
        if self.max_iterations == 0 {
            return Err(Error::Validation("max_iterations must be >= 1".to_string()));
        }
        for (slot, &code) in self.prong_species.iter().enumerate() {
            if pdg::mass(code).is_none() {
                return Err(Error::Validation(format!(
                    "prong {} species {} has no mass hypothesis",
                    slot, code
                )));
            }
        }
        Ok(())
    }

    /// Mass hypotheses per prong slot. Only valid after [`validate`](Self::validate).
    pub fn prong_masses(&self) -> Result<[f64; 3]> {
        let mut out = [0.0; 3];
        for (m, &code) in out.iter_mut().zip(self.prong_species.iter()) {
            *m = pdg::mass(code)
                .ok_or_else(|| Error::Validation(format!("species {} has no mass", code)))?;
        }
        Ok(out)
    }
}
