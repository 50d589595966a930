//! Entitlement gate configuration.
//!
//! Status reads use the regular call bound, payments their own looser bound.

use super::*;

use farm_entitlement_gate::EntitlementConfig;

impl EngineConfig {
  pub fn entitlement_gate(&self) -> EntitlementConfig {
    EntitlementConfig {
      call_timeout: self.call_timeout(),
      payment_timeout: Duration::from_millis(self.payment_timeout_ms),
    }
  }
}
