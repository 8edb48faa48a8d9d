use serde::Serialize;

use crate::core::fingerprint::{ChannelGrid, Fingerprint};

const PPM: u128 = 1_000_000;

/// Allowed relative difference between two cells, in parts per million.
///
/// Cell checks are done in integers (`|a - b| * 1e6 <= max(a, b) * ppm`) so
/// the verdict at the threshold boundary does not depend on float rounding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Tolerance {
    ppm: u64,
}

impl Tolerance {
    /// `threshold` is the similarity threshold; the tolerance is `1 - threshold`.
    pub fn from_threshold(threshold: f64) -> Self {
        let fraction = (1.0 - threshold).clamp(0.0, 1.0);
        Self {
            ppm: (fraction * PPM as f64).round() as u64,
        }
    }

    pub fn ppm(&self) -> u64 {
        self.ppm
    }

    pub fn cells_within(&self, a: u64, b: u64) -> bool {
        let delta = u128::from(a.abs_diff(b));
        let allowed = u128::from(a.max(b)) * u128::from(self.ppm);
        delta * PPM <= allowed
    }

    /// Necessary condition on channel totals: summing the per-cell bound
    /// gives `|A - B| <= tol * (A + B)`. Failing it rules out a match without
    /// touching the cells.
    pub fn totals_within(&self, a: u64, b: u64) -> bool {
        let delta = u128::from(a.abs_diff(b));
        let allowed = (u128::from(a) + u128::from(b)) * u128::from(self.ppm);
        delta * PPM <= allowed
    }
}

/// Per-cell tolerance comparison of one channel. Short-circuits on the first
/// cell that differs too much.
pub fn within_threshold(a: &ChannelGrid, b: &ChannelGrid, tolerance: Tolerance) -> bool {
    assert_eq!(a.side(), b.side(), "fingerprints must share a grid shape");
    a.cells()
        .iter()
        .zip(b.cells())
        .all(|(&x, &y)| tolerance.cells_within(x, y))
}

/// Two fingerprints are similar when all three channels pass.
pub fn similar(a: &Fingerprint, b: &Fingerprint, tolerance: Tolerance) -> bool {
    a.channels()
        .into_iter()
        .zip(b.channels())
        .all(|(x, y)| within_threshold(x, y, tolerance))
}

/// Cheap rejection on channel totals. Never rejects a pair that [`similar`]
/// would accept.
pub fn might_be_similar(a: &Fingerprint, b: &Fingerprint, tolerance: Tolerance) -> bool {
    a.channels()
        .into_iter()
        .zip(b.channels())
        .all(|(x, y)| tolerance.totals_within(x.total(), y.total()))
}
