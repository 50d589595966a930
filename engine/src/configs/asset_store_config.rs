//! Asset store configuration.
//!
//! Restricts loaded items to the configured collections.

use super::*;

use farm_asset_store::AssetStoreConfig;

impl EngineConfig {
  pub fn asset_store(&self) -> AssetStoreConfig {
    AssetStoreConfig {
      call_timeout: self.call_timeout(),
      supported_collections: self.supported_collections.iter().cloned().collect(),
    }
  }
}
