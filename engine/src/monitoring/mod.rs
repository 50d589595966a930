//! Refresh and batch monitoring
//!
//! Counters for refresh rounds, yield lookup failures and batch outcomes, with the
//! lookup failure rate tracked as a `Permill` and checked against an alert threshold.

use farm_batch_coordinator::{BatchError, BatchReport};
use farm_yield_aggregator::RefreshOutcome;
use primitives::ecosystem::params;
use serde::Serialize;
use sp_arithmetic::{PerThing, Permill};
use std::sync::{Mutex, MutexGuard, PoisonError};

const LOG_TARGET: &str = "farm::monitoring";

/// Alert thresholds for refresh monitoring
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlertThresholds {
  /// Maximum share of failed yield lookups in a single round
  pub max_failure_rate: Permill,
}

impl Default for AlertThresholds {
  fn default() -> Self {
    Self {
      max_failure_rate: params::MAX_LOOKUP_FAILURE_RATE,
    }
  }
}

/// Point-in-time copy of the monitoring counters
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitoringSnapshot {
  /// Aggregation rounds that ran over a non-empty collection
  pub refresh_rounds: u64,
  /// Per-asset yield lookups attempted
  pub lookups: u64,
  /// Per-asset yield lookups that failed or timed out
  pub lookup_failures: u64,
  /// Rounds where the base balance could not be read
  pub base_balance_failures: u64,
  /// Rounds whose failure rate crossed the threshold
  pub alerts: u64,
  /// Batches that settled, including those with failed items
  pub batches_settled: u64,
  /// Settled batches with at least one failed submission
  pub batches_partial: u64,
  /// Batches rejected entirely because the ledger was unreachable
  pub batches_failed: u64,
}

impl MonitoringSnapshot {
  /// Cumulative yield lookup failure rate
  pub fn failure_rate(&self) -> Permill {
    failure_rate(self.lookup_failures, self.lookups)
  }
}

fn failure_rate(failures: u64, lookups: u64) -> Permill {
  if lookups == 0 {
    return Permill::zero();
  }
  Permill::from_rational(failures.min(lookups), lookups)
}

pub struct RefreshMonitor {
  thresholds: AlertThresholds,
  counters: Mutex<MonitoringSnapshot>,
}

impl RefreshMonitor {
  pub fn new(thresholds: AlertThresholds) -> Self {
    Self {
      thresholds,
      counters: Mutex::new(MonitoringSnapshot::default()),
    }
  }

  /// Account one aggregation round. Returns true when the round raised an alert.
  pub fn record_refresh(&self, outcome: &RefreshOutcome) -> bool {
    // Rounds of a closed session, or that neither looked up yields nor failed,
    // carry no signal
    if !outcome.published || (outcome.lookups == 0 && outcome.failures.is_empty()) {
      return false;
    }
    let failed = outcome.asset_failures() as u64;
    let lookups = outcome.lookups as u64;
    let rate = failure_rate(failed, lookups);
    let alert = rate > self.thresholds.max_failure_rate;

    let mut counters = self.counters();
    counters.refresh_rounds += 1;
    counters.lookups += lookups;
    counters.lookup_failures += failed;
    if outcome.failures.len() as u64 > failed {
      counters.base_balance_failures += 1;
    }
    if alert {
      counters.alerts += 1;
      log::warn!(
        target: LOG_TARGET,
        "yield lookup failure rate {:?} above threshold {:?} ({} of {} lookups)",
        rate,
        self.thresholds.max_failure_rate,
        failed,
        lookups
      );
    }
    alert
  }

  /// Account one settled or rejected batch
  pub fn record_batch<T>(&self, result: &Result<BatchReport<T>, BatchError>) {
    let mut counters = self.counters();
    match result {
      Ok(report) if report.attempted() == 0 => {}
      Ok(report) => {
        counters.batches_settled += 1;
        if report.partial_failure().is_some() {
          counters.batches_partial += 1;
        }
      }
      Err(BatchError::TotalFailure { .. }) => counters.batches_failed += 1,
      Err(_) => {}
    }
  }

  pub fn snapshot(&self) -> MonitoringSnapshot {
    self.counters().clone()
  }

  fn counters(&self) -> MutexGuard<'_, MonitoringSnapshot> {
    self.counters.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl Default for RefreshMonitor {
  fn default() -> Self {
    Self::new(AlertThresholds::default())
  }
}
