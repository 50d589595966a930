//! Batch Coordinator
//!
//! Executes start-all and collect-all farming operations against the ledger.
//!
//! Submissions are independent per asset: one failure never blocks or rolls back the
//! others. Once every submission has settled, the farming record of every targeted
//! asset is read back from the ledger and written into the asset store. Local state is
//! never advanced optimistically.

#[cfg(test)]
mod mock;

use farm_asset_store::AssetStore;
use futures_util::future::join_all;
use primitives::{
  Address, AssetCollection, Balance, Epoch, FarmingRecord, LedgerError, LedgerService, bounded,
  ecosystem::params,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

const LOG_TARGET: &str = "farm::batch-coordinator";

/// Configuration of the batch coordinator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoordinatorConfig {
  /// Upper bound for each submission and each reconciliation read
  pub call_timeout: Duration,
}

impl Default for CoordinatorConfig {
  fn default() -> Self {
    Self {
      call_timeout: Duration::from_millis(params::SERVICE_CALL_TIMEOUT_MS),
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchKind {
  Start,
  Collect,
}

impl fmt::Display for BatchKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BatchKind::Start => f.write_str("start"),
      BatchKind::Collect => f.write_str("collect"),
    }
  }
}

impl BatchKind {
  /// Farming state a target is in once the operation has landed
  fn lands_staking(self) -> bool {
    matches!(self, BatchKind::Start)
  }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ItemFailure {
  pub asset: Address,
  pub error: LedgerError,
}

/// Mixed outcome of a batch. Informational: the batch still completed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{failed} of {} submissions failed", .succeeded + .failed)]
pub struct PartialFailure {
  pub succeeded: usize,
  pub failed: usize,
}

/// Errors for the batch coordinator
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
  /// Ledger unreachable for the entire batch; local state left untouched
  #[error("{kind} batch failed for all {attempted} assets: {cause}")]
  TotalFailure {
    kind: BatchKind,
    attempted: usize,
    cause: LedgerError,
  },
  /// Single-asset operation on an address the collection does not hold
  #[error("asset {0} is not part of the collection")]
  UnknownAsset(Address),
}

/// Settled batch: per-asset outcomes plus the reconciliation summary
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchReport<T> {
  /// Count of assets the ledger reports as started, or total amount collected
  pub value: T,
  pub succeeded: Vec<Address>,
  pub failed: Vec<ItemFailure>,
  /// Assets whose local state was overwritten with the ledger record
  pub reconciled: usize,
  /// Targeted assets whose record could not be read back; their local state is unchanged
  pub unreconciled: Vec<ItemFailure>,
}

impl<T> BatchReport<T> {
  pub fn attempted(&self) -> usize {
    self.succeeded.len() + self.failed.len()
  }

  /// Present whenever at least one submission failed
  pub fn partial_failure(&self) -> Option<PartialFailure> {
    if self.failed.is_empty() {
      return None;
    }
    Some(PartialFailure {
      succeeded: self.succeeded.len(),
      failed: self.failed.len(),
    })
  }
}

#[derive(Default)]
struct Settlement {
  succeeded: Vec<(Address, Balance)>,
  failed: Vec<ItemFailure>,
  /// Targets in the requested state per the ledger, or acknowledged if unreadable
  transitioned: usize,
  reconciled: usize,
  unreconciled: Vec<ItemFailure>,
}

impl Settlement {
  fn into_report<T>(self, value: T) -> BatchReport<T> {
    BatchReport {
      value,
      succeeded: self.succeeded.into_iter().map(|(asset, _)| asset).collect(),
      failed: self.failed,
      reconciled: self.reconciled,
      unreconciled: self.unreconciled,
    }
  }
}

pub struct BatchCoordinator {
  ledger: Arc<dyn LedgerService>,
  store: Arc<AssetStore>,
  config: CoordinatorConfig,
}

impl BatchCoordinator {
  pub fn new(
    ledger: Arc<dyn LedgerService>,
    store: Arc<AssetStore>,
    config: CoordinatorConfig,
  ) -> Self {
    Self {
      ledger,
      store,
      config,
    }
  }

  /// Start farming every idle asset of `collection`.
  ///
  /// Returns the number of targeted assets the ledger reports as farming once the
  /// batch settled. A record that cannot be read back counts when its submission was
  /// acknowledged.
  pub async fn start_all_farming(
    &self,
    collection: &AssetCollection,
  ) -> Result<BatchReport<usize>, BatchError> {
    let targets = collection.idle().map(|a| a.address().clone()).collect();
    let settlement = self
      .execute(BatchKind::Start, collection.epoch(), targets)
      .await?;
    let started = settlement.transitioned;
    Ok(settlement.into_report(started))
  }

  /// Collect the rewards of every farming asset of `collection`.
  ///
  /// Returns the total amount collected; zero without contacting the ledger when no
  /// asset is farming.
  pub async fn collect_all_rewards(
    &self,
    collection: &AssetCollection,
  ) -> Result<BatchReport<Balance>, BatchError> {
    let targets = collection.farming().map(|a| a.address().clone()).collect();
    let settlement = self
      .execute(BatchKind::Collect, collection.epoch(), targets)
      .await?;
    let collected = Self::collected(&settlement);
    Ok(settlement.into_report(collected))
  }

  /// Start farming one asset. No-op if it is already farming.
  pub async fn start_farming(
    &self,
    collection: &AssetCollection,
    asset: &Address,
  ) -> Result<BatchReport<usize>, BatchError> {
    let current = collection
      .get(asset.as_str())
      .ok_or_else(|| BatchError::UnknownAsset(asset.clone()))?;
    let targets = if current.is_staking() {
      Vec::new()
    } else {
      vec![asset.clone()]
    };
    let settlement = self
      .execute(BatchKind::Start, collection.epoch(), targets)
      .await?;
    let started = settlement.transitioned;
    Ok(settlement.into_report(started))
  }

  /// Collect the rewards of one asset. No-op if it is not farming.
  pub async fn collect_rewards(
    &self,
    collection: &AssetCollection,
    asset: &Address,
  ) -> Result<BatchReport<Balance>, BatchError> {
    let current = collection
      .get(asset.as_str())
      .ok_or_else(|| BatchError::UnknownAsset(asset.clone()))?;
    let targets = if current.is_staking() {
      vec![asset.clone()]
    } else {
      Vec::new()
    };
    let settlement = self
      .execute(BatchKind::Collect, collection.epoch(), targets)
      .await?;
    let collected = Self::collected(&settlement);
    Ok(settlement.into_report(collected))
  }

  fn collected(settlement: &Settlement) -> Balance {
    settlement
      .succeeded
      .iter()
      .fold(0, |total: Balance, (_, amount)| total.saturating_add(*amount))
  }

  /// Submit for every target, then reconcile the whole request set from the ledger.
  async fn execute(
    &self,
    kind: BatchKind,
    epoch: Epoch,
    targets: Vec<Address>,
  ) -> Result<Settlement, BatchError> {
    if targets.is_empty() {
      log::debug!(target: LOG_TARGET, "{} batch has no eligible assets", kind);
      return Ok(Settlement::default());
    }

    let timeout = self.config.call_timeout;
    let submissions = targets.iter().map(|asset| async move {
      (asset, bounded(timeout, self.submit(kind, asset)).await)
    });
    let mut settlement = Settlement::default();
    for (asset, result) in join_all(submissions).await {
      match result {
        Ok(amount) => settlement.succeeded.push((asset.clone(), amount)),
        Err(error) => {
          log::warn!(target: LOG_TARGET, "{} submission for {} failed: {}", kind, asset, error);
          settlement.failed.push(ItemFailure {
            asset: asset.clone(),
            error,
          });
        }
      }
    }

    if settlement.succeeded.is_empty() && settlement.failed.iter().all(|f| f.error.is_transport()) {
      if let Some(first) = settlement.failed.first() {
        log::warn!(
          target: LOG_TARGET,
          "{} batch of {} assets failed entirely, local state untouched",
          kind,
          targets.len()
        );
        return Err(BatchError::TotalFailure {
          kind,
          attempted: targets.len(),
          cause: first.error.clone(),
        });
      }
    }

    let (records, unreconciled) = self.read_records(&targets).await;
    let landed = records
      .iter()
      .filter(|(_, record)| record.is_staking() == kind.lands_staking())
      .count();
    let acknowledged = unreconciled
      .iter()
      .filter(|item| settlement.succeeded.iter().any(|(asset, _)| *asset == item.asset))
      .count();
    settlement.transitioned = landed + acknowledged;
    settlement.unreconciled = unreconciled;
    settlement.reconciled = self.store.reconcile(epoch, records);
    log::info!(
      target: LOG_TARGET,
      "{} batch settled: {} succeeded, {} failed, {} transitioned, {} reconciled",
      kind,
      settlement.succeeded.len(),
      settlement.failed.len(),
      settlement.transitioned,
      settlement.reconciled
    );
    Ok(settlement)
  }

  async fn submit(&self, kind: BatchKind, asset: &Address) -> Result<Balance, LedgerError> {
    match kind {
      BatchKind::Start => self.ledger.submit_start(asset).await.map(|()| 0),
      BatchKind::Collect => self.ledger.submit_collect(asset).await,
    }
  }

  async fn read_records(
    &self,
    targets: &[Address],
  ) -> (Vec<(Address, FarmingRecord)>, Vec<ItemFailure>) {
    let timeout = self.config.call_timeout;
    let ledger = &self.ledger;
    let reads = targets.iter().map(|asset| async move {
      (asset, bounded(timeout, ledger.get_farming_record(asset)).await)
    });
    let mut records = Vec::with_capacity(targets.len());
    let mut failures = Vec::new();
    for (asset, result) in join_all(reads).await {
      match result {
        Ok(record) => records.push((asset.clone(), record)),
        Err(error) => {
          log::warn!(target: LOG_TARGET, "farming record of {} unavailable: {}", asset, error);
          failures.push(ItemFailure {
            asset: asset.clone(),
            error,
          });
        }
      }
    }
    (records, failures)
  }
}
