use super::*;

use farm_yield_aggregator::AggregatorConfig;

impl EngineConfig {
  pub fn yield_aggregator(&self) -> AggregatorConfig {
    AggregatorConfig {
      call_timeout: self.call_timeout(),
    }
  }
}
