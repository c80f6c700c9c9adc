use serde::{Deserialize, Serialize};

use crate::error::{AuditError, Result};

/// `-2.5 log10(3630.78 Jy / 1 nJy)`: AB magnitude of a 1 nJy source.
const AB_NJY_ZERO_POINT: f64 = 31.4;

/// Convert an AB magnitude to a flux density in nanojansky.
pub fn ab_mag_to_njy(mag: f64) -> f64 {
    10f64.powf(0.4 * (AB_NJY_ZERO_POINT - mag))
}

/// Plausible flux range in nJy.  Values strictly outside are flagged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub faint: f64,
    pub bright: f64,
}

impl Thresholds {
    pub fn new(faint: f64, bright: f64) -> Result<Self> {
        if !(faint < bright) {
            return Err(AuditError::InvalidThresholds { faint, bright });
        }
        Ok(Thresholds { faint, bright })
    }

    /// Faint limit given directly in nJy, bright limit as an AB magnitude.
    pub fn from_limits(faint_flux_njy: f64, bright_mag_ab: f64) -> Result<Self> {
        Self::new(faint_flux_njy, ab_mag_to_njy(bright_mag_ab))
    }

    pub fn is_out_of_range(&self, value: f64) -> bool {
        value < self.faint || value > self.bright
    }

    /// Per-row out-of-range vector.  NaN compares false and stays in range.
    pub fn classify(&self, flux: &[f64]) -> Vec<bool> {
        flux.iter().map(|&v| self.is_out_of_range(v)).collect()
    }
}
