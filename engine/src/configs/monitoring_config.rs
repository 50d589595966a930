use super::*;

use crate::monitoring::AlertThresholds;
use sp_arithmetic::Permill;

impl EngineConfig {
  pub fn monitoring(&self) -> AlertThresholds {
    AlertThresholds {
      max_failure_rate: Permill::from_parts(self.max_lookup_failure_ppm.min(1_000_000)),
    }
  }
}
