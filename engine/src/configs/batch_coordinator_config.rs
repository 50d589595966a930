//! Batch coordinator configuration.
//!
//! Submissions and reconciliation reads share the ledger call bound.

use super::*;

use farm_batch_coordinator::CoordinatorConfig;

impl EngineConfig {
  pub fn batch_coordinator(&self) -> CoordinatorConfig {
    CoordinatorConfig {
      call_timeout: self.call_timeout(),
    }
  }
}
