use crate::{BatchCoordinator, CoordinatorConfig};
use async_trait::async_trait;
use farm_asset_store::{AssetStore, AssetStoreConfig};
use primitives::{
  Address, Asset, AssetCollection, AssetDirectory, AssetMetadata, Balance, DirectoryError,
  FarmingRecord, LedgerError, LedgerService, Timestamp,
};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

pub const HOLDER: &str = "EQ-holder";
pub const NOW: Timestamp = 1_700_000_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Call {
  Start,
  Collect,
  Record,
}

// State containers for the stateful ledger mock
thread_local! {
    // Ledger truth: asset -> farming record
    static RECORDS: RefCell<BTreeMap<Address, FarmingRecord>> = const { RefCell::new(BTreeMap::new()) };

    // Asset -> amount paid out by the next collect
    static REWARDS: RefCell<BTreeMap<Address, Balance>> = const { RefCell::new(BTreeMap::new()) };

    // Asset -> error returned by start/collect submissions
    static SUBMIT_ERRORS: RefCell<BTreeMap<Address, LedgerError>> = const { RefCell::new(BTreeMap::new()) };

    // Assets whose submissions are acknowledged but never applied
    static DROPPED: RefCell<BTreeSet<Address>> = const { RefCell::new(BTreeSet::new()) };

    // Assets whose farming record cannot be read
    static UNREADABLE: RefCell<BTreeSet<Address>> = const { RefCell::new(BTreeSet::new()) };

    // When set, every ledger request fails as unreachable
    static LEDGER_DOWN: Cell<bool> = const { Cell::new(false) };

    static SUBMIT_LATENCY: Cell<Option<Duration>> = const { Cell::new(None) };

    // Every ledger request served, in order
    static CALLS: RefCell<Vec<(Call, Address)>> = const { RefCell::new(Vec::new()) };

    // Directory holdings of HOLDER
    static HOLDINGS: RefCell<Vec<Asset>> = const { RefCell::new(Vec::new()) };
}

fn record_call(call: Call, asset: &Address) {
  CALLS.with(|c| c.borrow_mut().push((call, asset.clone())));
}

/// Register an asset both in the directory and on the ledger
pub fn add_nft(address: &str, record: FarmingRecord) {
  let asset = Asset::new(
    Address::from(address),
    Address::from("EQ-collection"),
    AssetMetadata::default(),
  )
  .with_farming(record);
  HOLDINGS.with(|h| h.borrow_mut().push(asset));
  RECORDS.with(|r| r.borrow_mut().insert(Address::from(address), record));
}

pub fn staking_since(start_time: Timestamp) -> FarmingRecord {
  FarmingRecord::staking(start_time).unwrap()
}

pub fn set_ledger_record(address: &str, record: FarmingRecord) {
  RECORDS.with(|r| r.borrow_mut().insert(Address::from(address), record));
}

pub fn ledger_record(address: &str) -> FarmingRecord {
  RECORDS.with(|r| r.borrow().get(address).copied().unwrap_or_default())
}

pub fn set_reward(address: &str, amount: Balance) {
  REWARDS.with(|r| r.borrow_mut().insert(Address::from(address), amount));
}

pub fn reject_submission(address: &str, error: LedgerError) {
  SUBMIT_ERRORS.with(|e| e.borrow_mut().insert(Address::from(address), error));
}

/// Acknowledge submissions for `address` without changing its record
pub fn drop_submission(address: &str) {
  DROPPED.with(|d| d.borrow_mut().insert(Address::from(address)));
}

pub fn make_unreadable(address: &str) {
  UNREADABLE.with(|u| u.borrow_mut().insert(Address::from(address)));
}

pub fn set_ledger_down(down: bool) {
  LEDGER_DOWN.with(|d| d.set(down));
}

pub fn set_submit_latency(latency: Duration) {
  SUBMIT_LATENCY.with(|l| l.set(Some(latency)));
}

pub fn calls_of(call: Call) -> Vec<Address> {
  CALLS.with(|c| {
    c.borrow()
      .iter()
      .filter(|(kind, _)| *kind == call)
      .map(|(_, asset)| asset.clone())
      .collect()
  })
}

pub fn total_calls() -> usize {
  CALLS.with(|c| c.borrow().len())
}

pub struct MockLedger;

impl MockLedger {
  async fn precheck(call: Call, asset: &Address) -> Result<(), LedgerError> {
    record_call(call, asset);
    if call != Call::Record {
      if let Some(latency) = SUBMIT_LATENCY.with(|l| l.get()) {
        tokio::time::sleep(latency).await;
      }
    }
    if LEDGER_DOWN.with(|d| d.get()) {
      return Err(LedgerError::Unavailable("connection refused".into()));
    }
    Ok(())
  }

  fn submit_error(asset: &Address) -> Option<LedgerError> {
    SUBMIT_ERRORS.with(|e| e.borrow().get(asset).cloned())
  }

  fn dropped(asset: &Address) -> bool {
    DROPPED.with(|d| d.borrow().contains(asset))
  }
}

#[async_trait]
impl LedgerService for MockLedger {
  async fn get_accumulated_yield(&self, _asset: &Address) -> Result<Balance, LedgerError> {
    Ok(0)
  }

  async fn get_base_balance(&self) -> Result<Balance, LedgerError> {
    Ok(0)
  }

  async fn submit_start(&self, asset: &Address) -> Result<(), LedgerError> {
    Self::precheck(Call::Start, asset).await?;
    if let Some(error) = Self::submit_error(asset) {
      return Err(error);
    }
    if !Self::dropped(asset) {
      set_ledger_record(asset.as_str(), staking_since(NOW));
    }
    Ok(())
  }

  async fn submit_collect(&self, asset: &Address) -> Result<Balance, LedgerError> {
    Self::precheck(Call::Collect, asset).await?;
    if let Some(error) = Self::submit_error(asset) {
      return Err(error);
    }
    if !Self::dropped(asset) {
      set_ledger_record(asset.as_str(), FarmingRecord::IDLE);
    }
    Ok(REWARDS.with(|r| r.borrow_mut().remove(asset).unwrap_or_default()))
  }

  async fn get_farming_record(&self, asset: &Address) -> Result<FarmingRecord, LedgerError> {
    Self::precheck(Call::Record, asset).await?;
    if UNREADABLE.with(|u| u.borrow().contains(asset)) {
      return Err(LedgerError::Unavailable("record not indexed yet".into()));
    }
    Ok(ledger_record(asset.as_str()))
  }
}

pub struct MockDirectory;

#[async_trait]
impl AssetDirectory for MockDirectory {
  async fn get_user_assets(&self, _account: &Address) -> Result<Vec<Asset>, DirectoryError> {
    Ok(HOLDINGS.with(|h| h.borrow().clone()))
  }
}

pub struct TestExt {
  pub store: Arc<AssetStore>,
  pub coordinator: BatchCoordinator,
}

impl TestExt {
  /// Load the holder's assets into the store and return the snapshot
  pub async fn load(&self) -> Arc<AssetCollection> {
    self.store.load(&Address::from(HOLDER)).await.unwrap()
  }
}

pub fn new_test_ext() -> TestExt {
  RECORDS.with(|r| r.borrow_mut().clear());
  REWARDS.with(|r| r.borrow_mut().clear());
  SUBMIT_ERRORS.with(|e| e.borrow_mut().clear());
  DROPPED.with(|d| d.borrow_mut().clear());
  UNREADABLE.with(|u| u.borrow_mut().clear());
  LEDGER_DOWN.with(|d| d.set(false));
  SUBMIT_LATENCY.with(|l| l.set(None));
  CALLS.with(|c| c.borrow_mut().clear());
  HOLDINGS.with(|h| h.borrow_mut().clear());
  let store = Arc::new(AssetStore::new(
    Arc::new(MockDirectory),
    AssetStoreConfig {
      call_timeout: Duration::from_secs(5),
      supported_collections: BTreeSet::new(),
    },
  ));
  let coordinator = BatchCoordinator::new(
    Arc::new(MockLedger),
    store.clone(),
    CoordinatorConfig {
      call_timeout: Duration::from_secs(5),
    },
  );
  TestExt { store, coordinator }
}
