//! Intraday sampling periods.

use super::error::DataError;
use super::provider::ProviderKind;

/// Which sampling periods (in minutes) a provider accepts, and how strictly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodPolicy {
    /// Supported periods, ascending.
    pub allowed: &'static [u32],
    /// `None`: always snap to the nearest allowed period.
    /// `Some(t)`: snap only when the nearest period is within `t` minutes.
    pub tolerance: Option<u32>,
}

impl PeriodPolicy {
    /// Snap `requested` to the nearest allowed period.
    ///
    /// Reported before any network call, so a rejected period costs nothing.
    pub fn resolve(&self, provider: ProviderKind, requested: u32) -> Result<u32, DataError> {
        let unsupported = || DataError::UnsupportedPeriod {
            provider,
            requested,
            allowed: self.allowed.to_vec(),
        };
        let snapped = nearest_period(self.allowed, requested).ok_or_else(unsupported)?;
        match self.tolerance {
            Some(t) if snapped.abs_diff(requested) > t => Err(unsupported()),
            _ => Ok(snapped),
        }
    }
}

/// Nearest value of `allowed` to `requested` by absolute difference.
///
/// Ties go to the smaller value. `None` when `allowed` is empty.
pub fn nearest_period(allowed: &[u32], requested: u32) -> Option<u32> {
    allowed
        .iter()
        .copied()
        .min_by_key(|&p| (p.abs_diff(requested), p))
}
