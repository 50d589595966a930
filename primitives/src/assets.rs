use crate::ecosystem::Timestamp;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

/// Blockchain address of an account, an NFT item or an NFT collection.
///
/// Addresses are opaque to the engine: they are compared, hashed and displayed, never parsed.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
  pub fn new(address: impl Into<String>) -> Self {
    Address(address.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl From<&str> for Address {
  fn from(address: &str) -> Self {
    Address(address.to_owned())
  }
}

impl From<String> for Address {
  fn from(address: String) -> Self {
    Address(address)
  }
}

impl Borrow<str> for Address {
  fn borrow(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Address {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Session counter of the asset store.
///
/// Bumped by every load and teardown. Work started against an older epoch must not
/// write its results back.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(u64);

impl Epoch {
  pub const GENESIS: Epoch = Epoch(0);

  pub fn next(self) -> Self {
    Epoch(self.0.saturating_add(1))
  }

  pub fn value(self) -> u64 {
    self.0
  }
}

/// A farming record whose flag and start time disagree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("inconsistent farming record: is_staking={is_staking}, start_time={start_time}")]
pub struct InvalidRecord {
  pub is_staking: bool,
  pub start_time: Timestamp,
}

/// Authoritative farming state of one asset, as reported by the ledger.
///
/// A record is farming iff its start time is non-zero; any other combination is
/// rejected at construction, so the invariant carries over to every asset the record
/// is applied to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FarmingRecordRepr", into = "FarmingRecordRepr")]
pub struct FarmingRecord {
  is_staking: bool,
  start_time: Timestamp,
}

impl FarmingRecord {
  /// Record of an asset that is not farming
  pub const IDLE: FarmingRecord = FarmingRecord {
    is_staking: false,
    start_time: 0,
  };

  /// Record of an asset farming since `start_time` (milliseconds, non-zero)
  pub fn staking(start_time: Timestamp) -> Result<Self, InvalidRecord> {
    Self::try_new(true, start_time)
  }

  pub fn try_new(is_staking: bool, start_time: Timestamp) -> Result<Self, InvalidRecord> {
    if is_staking != (start_time > 0) {
      return Err(InvalidRecord {
        is_staking,
        start_time,
      });
    }
    Ok(FarmingRecord {
      is_staking,
      start_time,
    })
  }

  pub fn is_staking(&self) -> bool {
    self.is_staking
  }

  pub fn start_time(&self) -> Timestamp {
    self.start_time
  }
}

#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FarmingRecordRepr {
  is_staking: bool,
  start_time: Timestamp,
}

impl TryFrom<FarmingRecordRepr> for FarmingRecord {
  type Error = InvalidRecord;

  fn try_from(repr: FarmingRecordRepr) -> Result<Self, Self::Error> {
    FarmingRecord::try_new(repr.is_staking, repr.start_time)
  }
}

impl From<FarmingRecord> for FarmingRecordRepr {
  fn from(record: FarmingRecord) -> Self {
    FarmingRecordRepr {
      is_staking: record.is_staking,
      start_time: record.start_time,
    }
  }
}

/// Trait of an NFT item; the directory uses either `trait_type` or `name` as the key
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetAttribute {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub trait_type: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  pub value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBackground {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub color: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pattern: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image: Option<String>,
}

/// Display metadata of an NFT item. Immutable once loaded.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMetadata {
  pub name: String,
  pub image: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default)]
  pub attributes: Vec<AssetAttribute>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub background: Option<AssetBackground>,
}

/// An NFT item owned by the connected account, together with its local farming state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AssetRepr", into = "AssetRepr")]
pub struct Asset {
  address: Address,
  collection_address: Address,
  metadata: AssetMetadata,
  farming: FarmingRecord,
}

impl Asset {
  /// New asset in the idle state
  pub fn new(address: Address, collection_address: Address, metadata: AssetMetadata) -> Self {
    Asset {
      address,
      collection_address,
      metadata,
      farming: FarmingRecord::IDLE,
    }
  }

  pub fn with_farming(mut self, record: FarmingRecord) -> Self {
    self.farming = record;
    self
  }

  pub fn address(&self) -> &Address {
    &self.address
  }

  pub fn collection_address(&self) -> &Address {
    &self.collection_address
  }

  pub fn metadata(&self) -> &AssetMetadata {
    &self.metadata
  }

  pub fn is_staking(&self) -> bool {
    self.farming.is_staking()
  }

  /// Farming start in milliseconds, 0 when not farming
  pub fn staking_start_time(&self) -> Timestamp {
    self.farming.start_time()
  }

  pub fn farming_record(&self) -> FarmingRecord {
    self.farming
  }

  /// Overwrite the local farming state with the ledger's record
  pub fn apply(&mut self, record: FarmingRecord) {
    self.farming = record;
  }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetRepr {
  address: Address,
  collection_address: Address,
  metadata: AssetMetadata,
  #[serde(default)]
  is_staking: bool,
  #[serde(default)]
  staking_start_time: Timestamp,
}

impl TryFrom<AssetRepr> for Asset {
  type Error = InvalidRecord;

  fn try_from(repr: AssetRepr) -> Result<Self, Self::Error> {
    let farming = FarmingRecord::try_new(repr.is_staking, repr.staking_start_time)?;
    Ok(Asset::new(repr.address, repr.collection_address, repr.metadata).with_farming(farming))
  }
}

impl From<Asset> for AssetRepr {
  fn from(asset: Asset) -> Self {
    AssetRepr {
      address: asset.address,
      collection_address: asset.collection_address,
      metadata: asset.metadata,
      is_staking: asset.farming.is_staking(),
      staking_start_time: asset.farming.start_time(),
    }
  }
}

/// Assets of one connected account, ordered by arrival and keyed by address.
///
/// Handed out to readers as an immutable `Arc` snapshot; only the asset store mutates it.
#[derive(Clone, Debug, Default)]
pub struct AssetCollection {
  account: Option<Address>,
  epoch: Epoch,
  assets: Vec<Asset>,
  index: BTreeMap<Address, usize>,
}

impl AssetCollection {
  /// Build a collection for `account`. Duplicate addresses keep their first occurrence.
  pub fn new(account: Address, epoch: Epoch, assets: impl IntoIterator<Item = Asset>) -> Self {
    let mut collection = AssetCollection {
      account: Some(account),
      epoch,
      ..Default::default()
    };
    for asset in assets {
      if collection.index.contains_key(asset.address()) {
        continue;
      }
      collection
        .index
        .insert(asset.address().clone(), collection.assets.len());
      collection.assets.push(asset);
    }
    collection
  }

  /// Collection with no account attached (nothing connected)
  pub fn detached(epoch: Epoch) -> Self {
    AssetCollection {
      epoch,
      ..Default::default()
    }
  }

  pub fn account(&self) -> Option<&Address> {
    self.account.as_ref()
  }

  pub fn epoch(&self) -> Epoch {
    self.epoch
  }

  pub fn len(&self) -> usize {
    self.assets.len()
  }

  pub fn is_empty(&self) -> bool {
    self.assets.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &Asset> {
    self.assets.iter()
  }

  pub fn get(&self, address: &str) -> Option<&Asset> {
    self.index.get(address).map(|&i| &self.assets[i])
  }

  pub fn contains(&self, address: &str) -> bool {
    self.index.contains_key(address)
  }

  /// Assets currently farming
  pub fn farming(&self) -> impl Iterator<Item = &Asset> {
    self.assets.iter().filter(|a| a.is_staking())
  }

  /// Assets not farming
  pub fn idle(&self) -> impl Iterator<Item = &Asset> {
    self.assets.iter().filter(|a| !a.is_staking())
  }

  pub fn farming_count(&self) -> usize {
    self.farming().count()
  }

  /// Apply a ledger record to one asset. Returns false if the asset is not present.
  pub fn apply(&mut self, address: &str, record: FarmingRecord) -> bool {
    match self.index.get(address) {
      Some(&i) => {
        self.assets[i].apply(record);
        true
      }
      None => false,
    }
  }
}
