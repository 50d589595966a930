//! Yield Aggregator
//!
//! Computes the accrued yield of every farming asset and the aggregate balance
//! (`base + Σ accrued`) shown to the holder.
//!
//! Lookups fan out concurrently and every slot resolves: a failed or timed-out lookup
//! contributes zero for the round and is reported back in the outcome instead of
//! failing the round, so the aggregate is always a number.


use futures_util::future::{join, join_all};
use primitives::{
  Address, AssetCollection, Balance, Epoch, LedgerError, LedgerService, bounded,
  ecosystem::params,
};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;

const LOG_TARGET: &str = "farm::yield-aggregator";

/// Configuration of the yield aggregator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregatorConfig {
  /// Upper bound for each ledger lookup
  pub call_timeout: Duration,
}

impl Default for AggregatorConfig {
  fn default() -> Self {
    Self {
      call_timeout: Duration::from_millis(params::SERVICE_CALL_TIMEOUT_MS),
    }
  }
}

/// Base balance plus accrued yield, in GIFT minor units
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AggregateBalance {
  pub base: Balance,
  pub accrued: Balance,
  pub total: Balance,
}

impl AggregateBalance {
  pub fn new(base: Balance, accrued: Balance) -> Self {
    Self {
      base,
      accrued,
      total: base.saturating_add(accrued),
    }
  }
}

/// What a failed lookup was about
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LookupTarget {
  BaseBalance,
  Asset(Address),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookupFailure {
  pub target: LookupTarget,
  pub error: LedgerError,
}

/// Result of one aggregation round
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefreshOutcome {
  pub balance: AggregateBalance,
  /// Per-asset yield lookups attempted this round
  pub lookups: usize,
  pub failures: Vec<LookupFailure>,
  /// False when the round was a no-op or computed for a retired session
  pub published: bool,
}

impl RefreshOutcome {
  /// Failed per-asset lookups (base balance failures excluded)
  pub fn asset_failures(&self) -> usize {
    self
      .failures
      .iter()
      .filter(|f| matches!(f.target, LookupTarget::Asset(_)))
      .count()
  }
}

#[derive(Default)]
struct AggregatorState {
  /// Outcomes computed for collections older than this epoch are not published
  floor: Epoch,
  /// Last base balance the ledger reported in this session
  last_base: Option<Balance>,
}

pub struct YieldAggregator {
  ledger: Arc<dyn LedgerService>,
  config: AggregatorConfig,
  latest: watch::Sender<AggregateBalance>,
  state: Mutex<AggregatorState>,
}

impl YieldAggregator {
  pub fn new(ledger: Arc<dyn LedgerService>, config: AggregatorConfig) -> Self {
    let (latest, _) = watch::channel(AggregateBalance::default());
    Self {
      ledger,
      config,
      latest,
      state: Mutex::new(AggregatorState::default()),
    }
  }

  /// Run one aggregation round over `collection`.
  ///
  /// An empty collection is a no-op returning the previous balance, which avoids a
  /// spurious zero between account load and the first assets arriving.
  pub async fn refresh(&self, collection: &AssetCollection) -> RefreshOutcome {
    if collection.is_empty() {
      return RefreshOutcome {
        balance: self.latest(),
        lookups: 0,
        failures: Vec::new(),
        published: false,
      };
    }

    let timeout = self.config.call_timeout;
    let ledger = &self.ledger;
    let farming: Vec<&Address> = collection.farming().map(|asset| asset.address()).collect();
    let lookups = farming.iter().map(|&address| async move {
      let result = bounded(timeout, ledger.get_accumulated_yield(address)).await;
      (address, result)
    });
    let (base, yields) = join(
      bounded(timeout, ledger.get_base_balance()),
      join_all(lookups),
    )
    .await;

    let mut failures = Vec::new();
    let mut accrued: Balance = 0;
    for (address, result) in yields {
      match result {
        Ok(amount) => accrued = accrued.saturating_add(amount),
        Err(error) => {
          log::warn!(target: LOG_TARGET, "yield lookup for {} failed: {}", address, error);
          failures.push(LookupFailure {
            target: LookupTarget::Asset(address.clone()),
            error,
          });
        }
      }
    }

    let mut state = self.state();
    let published = collection.epoch() >= state.floor;
    let base = match base {
      Ok(base) => {
        if published {
          state.last_base = Some(base);
        }
        base
      }
      Err(error) => {
        log::warn!(target: LOG_TARGET, "base balance lookup failed: {}", error);
        failures.push(LookupFailure {
          target: LookupTarget::BaseBalance,
          error,
        });
        state.last_base.unwrap_or_default()
      }
    };

    let balance = AggregateBalance::new(base, accrued);
    if published {
      self.latest.send_replace(balance);
    } else {
      log::debug!(
        target: LOG_TARGET,
        "dropping round for retired epoch {}",
        collection.epoch().value()
      );
    }
    RefreshOutcome {
      balance,
      lookups: farming.len(),
      failures,
      published,
    }
  }

  /// Most recently published balance
  pub fn latest(&self) -> AggregateBalance {
    *self.latest.borrow()
  }

  /// Receiver notified on every published balance
  pub fn subscribe(&self) -> watch::Receiver<AggregateBalance> {
    self.latest.subscribe()
  }

  /// Stop publishing rounds computed for collections older than `epoch`
  pub fn retire_before(&self, epoch: Epoch) {
    let mut state = self.state();
    state.floor = state.floor.max(epoch);
  }

  /// Session teardown: forget the balance and retire everything older than `epoch`
  pub fn reset(&self, epoch: Epoch) {
    {
      let mut state = self.state();
      state.floor = state.floor.max(epoch);
      state.last_base = None;
    }
    self.latest.send_replace(AggregateBalance::default());
  }

  fn state(&self) -> MutexGuard<'_, AggregatorState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
