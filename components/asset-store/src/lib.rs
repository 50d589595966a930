//! Asset Store
//!
//! Authoritative local view of the connected account's NFTs and their farming state.
//!
//! The store is the single writer of the asset collection. Readers take cheap `Arc`
//! snapshots; writers replace or copy-on-write the collection under a short lock, so a
//! snapshot handed out earlier never changes underneath its holder.

#[cfg(test)]
mod mock;

use primitives::{
  Address, AssetCollection, AssetDirectory, DirectoryError, Epoch, FarmingRecord, bounded,
  ecosystem::{collections::SUPPORTED_COLLECTIONS, params},
};
use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

const LOG_TARGET: &str = "farm::asset-store";

/// Configuration of the asset store
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetStoreConfig {
  /// Upper bound for the directory lookup
  pub call_timeout: Duration,
  /// Collections whose items are kept on load. Empty accepts every collection.
  pub supported_collections: BTreeSet<Address>,
}

impl Default for AssetStoreConfig {
  fn default() -> Self {
    Self {
      call_timeout: Duration::from_millis(params::SERVICE_CALL_TIMEOUT_MS),
      supported_collections: SUPPORTED_COLLECTIONS
        .iter()
        .map(|address| Address::from(*address))
        .collect(),
    }
  }
}

/// Errors for the asset store
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
  /// Initial load cannot proceed
  #[error("asset directory unavailable: {0}")]
  DirectoryUnavailable(#[source] DirectoryError),
  /// A teardown or a newer load happened while this load was in flight
  #[error("load superseded by a newer store operation")]
  Superseded,
}

struct StoreState {
  collection: Arc<AssetCollection>,
  /// Bumped by every load request and every teardown
  generation: u64,
}

pub struct AssetStore {
  directory: Arc<dyn AssetDirectory>,
  config: AssetStoreConfig,
  state: RwLock<StoreState>,
}

impl AssetStore {
  pub fn new(directory: Arc<dyn AssetDirectory>, config: AssetStoreConfig) -> Self {
    Self {
      directory,
      config,
      state: RwLock::new(StoreState {
        collection: Arc::new(AssetCollection::detached(Epoch::GENESIS)),
        generation: 0,
      }),
    }
  }

  /// Replace the collection with the assets `account` owns.
  ///
  /// On failure the previous collection stays in place. The new collection is installed
  /// in one step, so readers never observe a partially loaded set.
  pub async fn load(&self, account: &Address) -> Result<Arc<AssetCollection>, StoreError> {
    let ticket = {
      let mut state = self.write();
      state.generation = state.generation.wrapping_add(1);
      state.generation
    };

    let assets = bounded(
      self.config.call_timeout,
      self.directory.get_user_assets(account),
    )
    .await
    .map_err(|e| {
      log::warn!(target: LOG_TARGET, "directory lookup for {} failed: {}", account, e);
      StoreError::DirectoryUnavailable(e)
    })?;

    let received = assets.len();
    let supported = &self.config.supported_collections;
    let assets: Vec<_> = assets
      .into_iter()
      .filter(|asset| supported.is_empty() || supported.contains(asset.collection_address()))
      .collect();
    if assets.len() < received {
      log::info!(
        target: LOG_TARGET,
        "dropped {} assets of unsupported collections for {}",
        received - assets.len(),
        account
      );
    }

    let mut state = self.write();
    if state.generation != ticket {
      log::debug!(target: LOG_TARGET, "discarding superseded load for {}", account);
      return Err(StoreError::Superseded);
    }
    let epoch = state.collection.epoch().next();
    let collection = Arc::new(AssetCollection::new(account.clone(), epoch, assets));
    state.collection = collection.clone();
    log::info!(
      target: LOG_TARGET,
      "loaded {} assets for {} ({} farming), epoch {}",
      collection.len(),
      account,
      collection.farming_count(),
      epoch.value()
    );
    Ok(collection)
  }

  /// Overwrite one asset's farming state. No-op returning false if the asset is absent.
  pub fn apply_farming_record(&self, address: &str, record: FarmingRecord) -> bool {
    let mut state = self.write();
    if !state.collection.contains(address) {
      return false;
    }
    Arc::make_mut(&mut state.collection).apply(address, record)
  }

  /// Apply ledger records gathered for the collection of `epoch`.
  ///
  /// Records are discarded when the collection was replaced or torn down since; the
  /// return value is the number of assets updated.
  pub fn reconcile<I>(&self, epoch: Epoch, records: I) -> usize
  where
    I: IntoIterator<Item = (Address, FarmingRecord)>,
  {
    let mut state = self.write();
    if state.collection.epoch() != epoch {
      log::debug!(
        target: LOG_TARGET,
        "discarding records for stale epoch {} (current {})",
        epoch.value(),
        state.collection.epoch().value()
      );
      return 0;
    }
    let collection = Arc::make_mut(&mut state.collection);
    records
      .into_iter()
      .filter(|(address, record)| collection.apply(address.as_str(), *record))
      .count()
  }

  /// Immutable view of the current collection
  pub fn snapshot(&self) -> Arc<AssetCollection> {
    self.read().collection.clone()
  }

  pub fn epoch(&self) -> Epoch {
    self.read().collection.epoch()
  }

  pub fn account(&self) -> Option<Address> {
    self.read().collection.account().cloned()
  }

  /// Tear the collection down (disconnect or account change)
  pub fn clear(&self) -> Epoch {
    let mut state = self.write();
    state.generation = state.generation.wrapping_add(1);
    let epoch = state.collection.epoch().next();
    state.collection = Arc::new(AssetCollection::detached(epoch));
    log::info!(target: LOG_TARGET, "asset collection cleared, epoch {}", epoch.value());
    epoch
  }

  fn read(&self) -> RwLockReadGuard<'_, StoreState> {
    self.state.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
    self.state.write().unwrap_or_else(PoisonError::into_inner)
  }
}
