use super::*;

use farm_refresh_scheduler::SchedulerConfig;

impl EngineConfig {
  pub fn refresh_scheduler(&self) -> SchedulerConfig {
    SchedulerConfig {
      period: Duration::from_millis(self.refresh_period_ms),
    }
  }
}
