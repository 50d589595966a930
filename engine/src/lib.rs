//! GIFT Farm Engine
//!
//! Keeps a holder's local view of NFT farming state consistent with the ledger, keeps
//! the aggregated GIFT balance fresh, and drives batch farming operations.
//!
//! The engine wires the components together around one session per connected
//! account:
//!
//! - the asset store holds the collection and is its single writer,
//! - the yield aggregator publishes `base + Σ accrued` on every refresh round,
//! - the batch coordinator submits start/collect operations and reconciles the store
//!   from the ledger once they settle,
//! - the entitlement gate guards batch operations behind the premium subscription,
//! - the refresh scheduler drives aggregation rounds while the collection is non-empty.

mod configs;
pub mod monitoring;

#[cfg(test)]
mod tests;

pub use configs::{ConfigError, EngineConfig};
pub use farm_asset_store::{AssetStore, StoreError};
pub use farm_batch_coordinator::{BatchError, BatchKind, BatchReport, ItemFailure, PartialFailure};
pub use farm_entitlement_gate::EntitlementGate;
pub use farm_refresh_scheduler::SchedulerState;
pub use farm_yield_aggregator::{AggregateBalance, LookupFailure, LookupTarget, RefreshOutcome};
pub use primitives;

use farm_batch_coordinator::BatchCoordinator;
use farm_refresh_scheduler::{RefreshScheduler, RefreshTask};
use farm_yield_aggregator::YieldAggregator;
use futures_util::FutureExt;
use monitoring::{MonitoringSnapshot, RefreshMonitor};
use primitives::{
  Address, Asset, AssetCollection, AssetDirectory, Balance, EntitlementError, EntitlementService,
  LedgerService, PaymentHandle,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

const LOG_TARGET: &str = "farm::engine";

/// Errors surfaced by engine operations
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
  /// The operation needs a connected account
  #[error("no account connected")]
  NotConnected,
  #[error(transparent)]
  Store(#[from] StoreError),
  #[error(transparent)]
  Batch(#[from] BatchError),
  #[error(transparent)]
  Entitlement(#[from] EntitlementError),
}

/// External collaborators of the engine
#[derive(Clone)]
pub struct Services {
  pub directory: Arc<dyn AssetDirectory>,
  pub ledger: Arc<dyn LedgerService>,
  pub entitlement: Arc<dyn EntitlementService>,
}

/// Dashboard figures of the current session
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmStats {
  pub account: Option<Address>,
  pub total_assets: usize,
  pub farming_assets: usize,
  pub entitled: bool,
  pub balance: AggregateBalance,
  pub refresh_scheduled: bool,
  /// An aggregation round holds the single-flight slot
  pub refresh_in_flight: bool,
  pub refresh_rounds: u64,
  pub skipped_ticks: u64,
  pub monitoring: MonitoringSnapshot,
}

struct Inner {
  store: Arc<AssetStore>,
  aggregator: YieldAggregator,
  coordinator: BatchCoordinator,
  gate: EntitlementGate,
  scheduler: RefreshScheduler,
  monitor: RefreshMonitor,
}

impl Inner {
  /// One aggregation round over the current snapshot
  async fn refresh_round(&self) -> RefreshOutcome {
    let snapshot = self.store.snapshot();
    let outcome = self.aggregator.refresh(&snapshot).await;
    self.monitor.record_refresh(&outcome);
    outcome
  }
}

pub struct FarmEngine {
  inner: Arc<Inner>,
}

impl FarmEngine {
  pub fn new(services: Services, config: EngineConfig) -> Self {
    let store = Arc::new(AssetStore::new(services.directory, config.asset_store()));
    let inner = Inner {
      aggregator: YieldAggregator::new(services.ledger.clone(), config.yield_aggregator()),
      coordinator: BatchCoordinator::new(
        services.ledger,
        store.clone(),
        config.batch_coordinator(),
      ),
      gate: EntitlementGate::new(services.entitlement, config.entitlement_gate()),
      scheduler: RefreshScheduler::new(config.refresh_scheduler()),
      monitor: RefreshMonitor::new(config.monitoring()),
      store,
    };
    Self {
      inner: Arc::new(inner),
    }
  }

  /// Open a session for `account`.
  ///
  /// Any previous session is torn down first. Fails only when the asset directory
  /// cannot be read; an unreachable entitlement service leaves the gate closed.
  pub async fn connect(
    &self,
    account: impl Into<Address>,
  ) -> Result<Arc<AssetCollection>, EngineError> {
    let account = account.into();
    self.disconnect();
    log::info!(target: LOG_TARGET, "connecting {}", account);

    let collection = self.inner.store.load(&account).await?;
    self.inner.aggregator.retire_before(collection.epoch());
    match self.inner.gate.refresh().await {
      Ok(entitled) => log::info!(target: LOG_TARGET, "{} entitled: {}", account, entitled),
      Err(error) => log::warn!(
        target: LOG_TARGET,
        "entitlement of {} unknown, treated as not entitled: {}",
        account,
        error
      ),
    }
    self.sync_schedule(&collection);
    self.refresh_now().await;
    Ok(collection)
  }

  /// Close the session: stop refreshing and forget every piece of account state.
  ///
  /// Idempotent. Requests still in flight complete, but their results are dropped.
  pub fn disconnect(&self) {
    let was_connected = self.inner.store.account().is_some();
    self.inner.scheduler.cancel();
    let epoch = self.inner.store.clear();
    self.inner.gate.reset();
    self.inner.aggregator.reset(epoch);
    if was_connected {
      log::info!(target: LOG_TARGET, "session closed");
    }
  }

  /// Start farming every idle asset. Requires the premium entitlement.
  pub async fn start_all_farming(&self) -> Result<BatchReport<usize>, EngineError> {
    let collection = self.connected()?;
    self.inner.gate.ensure_entitled()?;
    let result = self.inner.coordinator.start_all_farming(&collection).await;
    self.settle(result).await
  }

  /// Collect the rewards of every farming asset. Requires the premium entitlement.
  pub async fn collect_all_rewards(&self) -> Result<BatchReport<Balance>, EngineError> {
    let collection = self.connected()?;
    self.inner.gate.ensure_entitled()?;
    let result = self.inner.coordinator.collect_all_rewards(&collection).await;
    self.settle(result).await
  }

  /// Start farming a single asset. Available without entitlement.
  pub async fn start_farming(
    &self,
    asset: impl Into<Address>,
  ) -> Result<BatchReport<usize>, EngineError> {
    let collection = self.connected()?;
    let result = self
      .inner
      .coordinator
      .start_farming(&collection, &asset.into())
      .await;
    self.settle(result).await
  }

  /// Collect the rewards of a single asset. Available without entitlement.
  pub async fn collect_rewards(
    &self,
    asset: impl Into<Address>,
  ) -> Result<BatchReport<Balance>, EngineError> {
    let collection = self.connected()?;
    let result = self
      .inner
      .coordinator
      .collect_rewards(&collection, &asset.into())
      .await;
    self.settle(result).await
  }

  /// Purchase the premium subscription, then reload the session from its sources.
  ///
  /// Succeeds as soon as the payment is granted. A reload that fails afterwards only
  /// yields `None`; the gate stays open and `force_reconciliation` can be retried.
  pub async fn subscribe(
    &self,
    payment: &PaymentHandle,
  ) -> Result<Option<RefreshOutcome>, EngineError> {
    self.connected()?;
    self.inner.gate.grant_entitlement(payment).await?;
    match self.force_reconciliation().await {
      Ok(outcome) => Ok(Some(outcome)),
      Err(error) => {
        log::warn!(
          target: LOG_TARGET,
          "subscription granted, reload after payment failed: {}",
          error
        );
        Ok(None)
      }
    }
  }

  /// Reload the collection of the connected account and refresh the balance at once.
  pub async fn force_reconciliation(&self) -> Result<RefreshOutcome, EngineError> {
    let account = self
      .inner
      .store
      .account()
      .ok_or(EngineError::NotConnected)?;
    let collection = self.inner.store.load(&account).await?;
    self.inner.aggregator.retire_before(collection.epoch());
    log::info!(
      target: LOG_TARGET,
      "reconciled {} assets for {}",
      collection.len(),
      account
    );
    self.sync_schedule(&collection);
    Ok(self.refresh_now().await)
  }

  /// Run one aggregation round now, after any round already in flight.
  pub async fn refresh_now(&self) -> RefreshOutcome {
    self
      .inner
      .scheduler
      .run_exclusive(self.inner.refresh_round())
      .await
  }

  pub fn account(&self) -> Option<Address> {
    self.inner.store.account()
  }

  pub fn assets(&self) -> Arc<AssetCollection> {
    self.inner.store.snapshot()
  }

  pub fn farming_assets(&self) -> Vec<Asset> {
    self.inner.store.snapshot().farming().cloned().collect()
  }

  pub fn balance(&self) -> AggregateBalance {
    self.inner.aggregator.latest()
  }

  /// Receiver notified on every published balance
  pub fn balance_updates(&self) -> watch::Receiver<AggregateBalance> {
    self.inner.aggregator.subscribe()
  }

  pub fn is_entitled(&self) -> bool {
    self.inner.gate.is_entitled()
  }

  pub fn scheduler_state(&self) -> SchedulerState {
    self.inner.scheduler.state()
  }

  pub fn stats(&self) -> FarmStats {
    let snapshot = self.inner.store.snapshot();
    FarmStats {
      account: snapshot.account().cloned(),
      total_assets: snapshot.len(),
      farming_assets: snapshot.farming_count(),
      entitled: self.inner.gate.is_entitled(),
      balance: self.inner.aggregator.latest(),
      refresh_scheduled: self.inner.scheduler.is_scheduled(),
      refresh_in_flight: self.inner.scheduler.in_flight(),
      refresh_rounds: self.inner.scheduler.rounds(),
      skipped_ticks: self.inner.scheduler.skipped_ticks(),
      monitoring: self.inner.monitor.snapshot(),
    }
  }

  fn connected(&self) -> Result<Arc<AssetCollection>, EngineError> {
    let snapshot = self.inner.store.snapshot();
    if snapshot.account().is_none() {
      return Err(EngineError::NotConnected);
    }
    Ok(snapshot)
  }

  /// Book-keeping after a batch: monitoring, schedule re-evaluation and an
  /// out-of-band refresh so the balance reflects the reconciled state.
  async fn settle<T>(
    &self,
    result: Result<BatchReport<T>, BatchError>,
  ) -> Result<BatchReport<T>, EngineError> {
    self.inner.monitor.record_batch(&result);
    let report = result?;
    if report.attempted() > 0 {
      self.sync_schedule(&self.inner.store.snapshot());
      self.refresh_now().await;
    }
    Ok(report)
  }

  /// Keep the timer armed exactly while a non-empty collection is loaded
  fn sync_schedule(&self, collection: &AssetCollection) {
    let wanted = collection.account().is_some() && !collection.is_empty();
    if wanted && !self.inner.scheduler.is_scheduled() {
      self.inner.scheduler.schedule(self.refresh_task());
    } else if !wanted {
      self.inner.scheduler.cancel();
    }
  }

  fn refresh_task(&self) -> RefreshTask {
    let inner = Arc::downgrade(&self.inner);
    Arc::new(move || {
      let inner = inner.clone();
      async move {
        if let Some(inner) = inner.upgrade() {
          inner.refresh_round().await;
        }
      }
      .boxed()
    })
  }
}

impl Drop for FarmEngine {
  fn drop(&mut self) {
    self.inner.scheduler.cancel();
  }
}
