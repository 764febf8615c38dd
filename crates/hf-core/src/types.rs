//! Input data model handed in by the tracking and event layers.
//!
//! All types here are plain data: the fitter and the matcher read them and
//! never write back.

use serde::{Deserialize, Serialize};

/// Index of element `(i, j)` in a packed lower-triangle symmetric matrix.
///
/// The layout is `(0,0), (1,0), (1,1), (2,0), (2,1), (2,2), ...`, so a 3×3
/// matrix packs into 6 values and a 6×6 matrix into 21.
#[inline]
pub fn packed_index(i: usize, j: usize) -> usize {
    let (hi, lo) = if i >= j { (i, j) } else { (j, i) };
    hi * (hi + 1) / 2 + lo
}

/// Track state at its reference point, in global coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackState {
    /// Position `(x, y, z)` in cm.
    pub position: [f64; 3],
    /// Momentum `(px, py, pz)` in GeV/c.
    pub momentum: [f64; 3],
    /// Signed charge in units of e.
    pub charge: i32,
    /// Packed covariance over `(x, y, z, px, py, pz)`, see [`packed_index`].
    pub covariance: [f64; 21],
}

impl TrackState {
    /// Covariance element `(i, j)` of the 6×6 position-momentum matrix.
    #[inline]
    pub fn cov(&self, i: usize, j: usize) -> f64 {
        self.covariance[packed_index(i, j)]
    }

    /// Transverse momentum.
    pub fn pt(&self) -> f64 {
        self.momentum[0].hypot(self.momentum[1])
    }
}

/// Primary (collision) vertex estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrimaryVertex {
    /// Position `(x, y, z)` in cm.
    pub position: [f64; 3],
    /// Packed 3×3 covariance `(xx, yx, yy, zx, zy, zz)`.
    pub covariance: [f64; 6],
}

impl PrimaryVertex {
    /// Covariance element `(i, j)`.
    #[inline]
    pub fn cov(&self, i: usize, j: usize) -> f64 {
        self.covariance[packed_index(i, j)]
    }
}

/// A collision: identifier plus its primary vertex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collision {
    /// Global collision index, kept for traceability.
    pub global_index: usize,
    /// Primary vertex of the collision.
    pub vertex: PrimaryVertex,
}

/// One reconstructed track with its link to the originating collision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Global track index, kept for traceability.
    pub global_index: usize,
    /// Position of the originating collision in the collision table.
    pub collision: usize,
    /// Track state at its reference point.
    pub state: TrackState,
}

/// A candidate triplet: three positions in the track table plus the
/// selection bits set by the combinatorial stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackIndexProng3 {
    /// Positions of prongs 0, 1 and 2 in the track table.
    pub prongs: [usize; 3],
    /// Hypothesis bits from the preselection.
    pub hf_flag: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_index_layout() {
        assert_eq!(packed_index(0, 0), 0);
        assert_eq!(packed_index(1, 0), 1);
        assert_eq!(packed_index(1, 1), 2);
        assert_eq!(packed_index(2, 0), 3);
        assert_eq!(packed_index(2, 2), 5);
        assert_eq!(packed_index(5, 5), 20);
        // symmetric access
        assert_eq!(packed_index(0, 4), packed_index(4, 0));
    }

    #[test]
    fn test_track_cov_accessor() {
        let mut covariance = [0.0; 21];
        covariance[packed_index(3, 1)] = 0.25;
        let t = TrackState {
            position: [0.0; 3],
            momentum: [3.0, 4.0, 0.0],
            charge: 1,
            covariance,
        };
        assert_eq!(t.cov(1, 3), 0.25);
        assert!((t.pt() - 5.0).abs() < 1e-12);
    }
}
