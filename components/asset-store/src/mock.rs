use crate::{AssetStore, AssetStoreConfig};
use async_trait::async_trait;
use primitives::{Address, Asset, AssetDirectory, AssetMetadata, DirectoryError};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

// State containers for the stateful directory mock
thread_local! {
    // Account -> owned assets, in directory order
    static HOLDINGS: RefCell<BTreeMap<Address, Vec<Asset>>> = const { RefCell::new(BTreeMap::new()) };

    // When set, every lookup fails as unreachable
    static DIRECTORY_DOWN: Cell<bool> = const { Cell::new(false) };

    // Artificial latency applied before answering
    static LATENCY: Cell<Option<Duration>> = const { Cell::new(None) };

    static LOOKUPS: Cell<u32> = const { Cell::new(0) };
}

pub const ALICE: &str = "EQ-alice";
pub const BOB: &str = "EQ-bob";
pub const COLLECTION_A: &str = "EQ-collection-a";
pub const COLLECTION_B: &str = "EQ-collection-b";

pub fn nft(address: &str, collection: &str) -> Asset {
  Asset::new(
    Address::from(address),
    Address::from(collection),
    AssetMetadata {
      name: format!("Gift {address}"),
      image: format!("https://cdn.example.org/{address}.png"),
      ..Default::default()
    },
  )
}

pub fn set_holdings(account: &str, assets: Vec<Asset>) {
  HOLDINGS.with(|h| h.borrow_mut().insert(Address::from(account), assets));
}

pub fn set_directory_down(down: bool) {
  DIRECTORY_DOWN.with(|d| d.set(down));
}

pub fn set_latency(latency: Duration) {
  LATENCY.with(|l| l.set(Some(latency)));
}

pub fn lookups() -> u32 {
  LOOKUPS.with(|c| c.get())
}

pub struct MockDirectory;

#[async_trait]
impl AssetDirectory for MockDirectory {
  async fn get_user_assets(&self, account: &Address) -> Result<Vec<Asset>, DirectoryError> {
    LOOKUPS.with(|c| c.set(c.get() + 1));
    if let Some(latency) = LATENCY.with(|l| l.get()) {
      tokio::time::sleep(latency).await;
    }
    if DIRECTORY_DOWN.with(|d| d.get()) {
      return Err(DirectoryError::Unavailable("connection refused".into()));
    }
    Ok(HOLDINGS.with(|h| h.borrow().get(account).cloned().unwrap_or_default()))
  }
}

/// Store accepting every collection, with a fresh directory state
pub fn new_test_ext() -> AssetStore {
  new_test_ext_with(BTreeSet::new())
}

pub fn new_test_ext_with(supported_collections: BTreeSet<Address>) -> AssetStore {
  HOLDINGS.with(|h| h.borrow_mut().clear());
  DIRECTORY_DOWN.with(|d| d.set(false));
  LATENCY.with(|l| l.set(None));
  LOOKUPS.with(|c| c.set(0));
  AssetStore::new(
    Arc::new(MockDirectory),
    AssetStoreConfig {
      call_timeout: Duration::from_secs(5),
      supported_collections,
    },
  )
}
