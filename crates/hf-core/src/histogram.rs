//! Fixed-binning 1D histograms for validation plots.
//!
//! Histograms are not shared between workers: each worker fills its own
//! partial copy and the partials are combined with [`Histogram1D::merge`].

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A 1D histogram with uniform bins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram1D {
    /// Histogram name.
    pub name: String,
    /// Histogram title (ROOT-style `title;x-axis;y-axis`).
    pub title: String,
    /// Number of bins (excluding under/overflow).
    pub n_bins: usize,
    /// Lower edge of first bin.
    pub x_min: f64,
    /// Upper edge of last bin.
    pub x_max: f64,
    /// Bin contents (length = n_bins).
    pub bin_content: Vec<f64>,
    /// Entries below `x_min`.
    pub underflow: f64,
    /// Entries at or above `x_max`.
    pub overflow: f64,
    /// Total number of fills, including under/overflow.
    pub entries: u64,
}

impl Histogram1D {
    /// Create an empty histogram.
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        n_bins: usize,
        x_min: f64,
        x_max: f64,
    ) -> Result<Self> {
        if n_bins == 0 {
            return Err(Error::Validation("histogram needs at least one bin".to_string()));
        }
        if !x_min.is_finite() || !x_max.is_finite() || x_max <= x_min {
            return Err(Error::Validation(format!(
                "histogram range must be finite with x_max > x_min, got [{}, {})",
                x_min, x_max
            )));
        }
        Ok(Self {
            name: name.into(),
            title: title.into(),
            n_bins,
            x_min,
            x_max,
            bin_content: vec![0.0; n_bins],
            underflow: 0.0,
            overflow: 0.0,
            entries: 0,
        })
    }

    /// Bin index for `x`, or `None` if it falls outside the range.
    pub fn find_bin(&self, x: f64) -> Option<usize> {
        if !(x >= self.x_min && x < self.x_max) {
            return None;
        }
        let width = (self.x_max - self.x_min) / self.n_bins as f64;
        let idx = ((x - self.x_min) / width) as usize;
        // guard against rounding at the upper edge
        Some(idx.min(self.n_bins - 1))
    }

    /// Add one unit-weight entry. Non-finite values are ignored.
    pub fn fill(&mut self, x: f64) {
        if x.is_nan() {
            return;
        }
        self.entries += 1;
        match self.find_bin(x) {
            Some(i) => self.bin_content[i] += 1.0,
            None if x < self.x_min => self.underflow += 1.0,
            None => self.overflow += 1.0,
        }
    }

    /// Bin edges (length = n_bins + 1).
    pub fn bin_edges(&self) -> Vec<f64> {
        let width = (self.x_max - self.x_min) / self.n_bins as f64;
        (0..=self.n_bins).map(|i| self.x_min + width * i as f64).collect()
    }

    /// Sum of in-range bin contents.
    pub fn integral(&self) -> f64 {
        self.bin_content.iter().sum()
    }

    /// Add the contents of `other`, which must have identical binning.
    pub fn merge(&mut self, other: &Histogram1D) -> Result<()> {
        if self.n_bins != other.n_bins || self.x_min != other.x_min || self.x_max != other.x_max {
            return Err(Error::Validation(format!(
                "cannot merge '{}' into '{}': binning differs",
                other.name, self.name
            )));
        }
        for (a, b) in self.bin_content.iter_mut().zip(other.bin_content.iter()) {
            *a += b;
        }
        self.underflow += other.underflow;
        self.overflow += other.overflow;
        self.entries += other.entries;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_and_flows() {
        let mut h = Histogram1D::new("h", "t", 10, 0.0, 1.0).unwrap();
        h.fill(0.05);
        h.fill(0.95);
        h.fill(-0.1);
        h.fill(1.0);
        h.fill(f64::NAN);
        assert_eq!(h.bin_content[0], 1.0);
        assert_eq!(h.bin_content[9], 1.0);
        assert_eq!(h.underflow, 1.0);
        assert_eq!(h.overflow, 1.0);
        assert_eq!(h.entries, 4);
        assert_eq!(h.integral(), 2.0);
    }

    #[test]
    fn test_bin_edges() {
        let h = Histogram1D::new("h", "t", 4, 2.0, 3.0).unwrap();
        let edges = h.bin_edges();
        assert_eq!(edges.len(), 5);
        approx::assert_abs_diff_eq!(edges[1], 2.25, epsilon = 1e-12);
        approx::assert_abs_diff_eq!(edges[4], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_merge_partials() {
        let mut a = Histogram1D::new("m", "", 3, 0.0, 3.0).unwrap();
        let mut b = a.clone();
        a.fill(0.5);
        b.fill(0.5);
        b.fill(2.5);
        b.fill(7.0);
        a.merge(&b).unwrap();
        assert_eq!(a.bin_content, vec![2.0, 0.0, 1.0]);
        assert_eq!(a.overflow, 1.0);
        assert_eq!(a.entries, 4);
    }

    #[test]
    fn test_merge_rejects_mismatched_binning() {
        let mut a = Histogram1D::new("a", "", 3, 0.0, 3.0).unwrap();
        let b = Histogram1D::new("b", "", 4, 0.0, 3.0).unwrap();
        assert!(a.merge(&b).is_err());
    }

    #[test]
    fn test_invalid_range() {
        assert!(Histogram1D::new("h", "", 0, 0.0, 1.0).is_err());
        assert!(Histogram1D::new("h", "", 5, 1.0, 1.0).is_err());
    }
}
