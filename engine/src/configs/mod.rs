//! Engine configuration.
//!
//! A single `EngineConfig` is read from JSON; every field is optional and falls back
//! to the ecosystem constants in `primitives::ecosystem`. The per-component modules
//! derive each component's own configuration from it.

mod asset_store_config;
mod batch_coordinator_config;
mod entitlement_gate_config;
mod monitoring_config;
mod refresh_scheduler_config;
mod yield_aggregator_config;

use primitives::{
  Address,
  ecosystem::{collections::SUPPORTED_COLLECTIONS, params},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Errors for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("malformed engine configuration: {0}")]
  Malformed(#[from] serde_json::Error),
  #[error("{0} must be greater than zero")]
  ZeroDuration(&'static str),
  #[error("failure rate threshold of {0} ppm exceeds one million")]
  RateOutOfRange(u32),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct EngineConfig {
  /// Period of the balance refresh timer
  pub refresh_period_ms: u64,
  /// Upper bound for every ledger and directory call
  pub call_timeout_ms: u64,
  /// Upper bound for the subscription payment flow
  pub payment_timeout_ms: u64,
  /// Collections kept on load; an empty list accepts every collection
  pub supported_collections: Vec<Address>,
  /// Lookup failure rate (parts per million) above which a refresh round raises an alert
  pub max_lookup_failure_ppm: u32,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self {
      refresh_period_ms: params::REFRESH_PERIOD_MS,
      call_timeout_ms: params::SERVICE_CALL_TIMEOUT_MS,
      payment_timeout_ms: params::PAYMENT_TIMEOUT_MS,
      supported_collections: SUPPORTED_COLLECTIONS
        .iter()
        .map(|address| Address::from(*address))
        .collect(),
      max_lookup_failure_ppm: params::MAX_LOOKUP_FAILURE_RATE.deconstruct(),
    }
  }
}

impl EngineConfig {
  /// Parse and validate a JSON configuration document
  pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
    let config: Self = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.refresh_period_ms == 0 {
      return Err(ConfigError::ZeroDuration("refreshPeriodMs"));
    }
    if self.call_timeout_ms == 0 {
      return Err(ConfigError::ZeroDuration("callTimeoutMs"));
    }
    if self.payment_timeout_ms == 0 {
      return Err(ConfigError::ZeroDuration("paymentTimeoutMs"));
    }
    if self.max_lookup_failure_ppm > 1_000_000 {
      return Err(ConfigError::RateOutOfRange(self.max_lookup_failure_ppm));
    }
    Ok(())
  }

  fn call_timeout(&self) -> Duration {
    Duration::from_millis(self.call_timeout_ms)
  }
}
