//! Entitlement Gate
//!
//! Cached premium-subscription status. Batch farming operations are only permitted
//! while the holder is entitled.

#[cfg(test)]
mod mock;

use primitives::{EntitlementError, EntitlementService, PaymentHandle, ecosystem::params};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

const LOG_TARGET: &str = "farm::entitlement-gate";

/// Configuration of the entitlement gate
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntitlementConfig {
  /// Upper bound for a status read
  pub call_timeout: Duration,
  /// Upper bound for the whole payment flow
  pub payment_timeout: Duration,
}

impl Default for EntitlementConfig {
  fn default() -> Self {
    Self {
      call_timeout: Duration::from_millis(params::SERVICE_CALL_TIMEOUT_MS),
      payment_timeout: Duration::from_millis(params::PAYMENT_TIMEOUT_MS),
    }
  }
}

pub struct EntitlementGate {
  service: Arc<dyn EntitlementService>,
  config: EntitlementConfig,
  entitled: AtomicBool,
  /// Bumped on teardown; answers that started in an older session are dropped
  session: AtomicU64,
}

impl EntitlementGate {
  pub fn new(service: Arc<dyn EntitlementService>, config: EntitlementConfig) -> Self {
    Self {
      service,
      config,
      entitled: AtomicBool::new(false),
      session: AtomicU64::new(0),
    }
  }

  /// Cached entitlement flag
  pub fn is_entitled(&self) -> bool {
    self.entitled.load(Ordering::Acquire)
  }

  /// Fails with `NotEntitled` unless the cached flag is set
  pub fn ensure_entitled(&self) -> Result<(), EntitlementError> {
    if self.is_entitled() {
      Ok(())
    } else {
      Err(EntitlementError::NotEntitled)
    }
  }

  /// Re-read the flag from the entitlement service. The cache is kept on failure.
  pub async fn refresh(&self) -> Result<bool, EntitlementError> {
    let session = self.session.load(Ordering::Acquire);
    let entitled = tokio::time::timeout(self.config.call_timeout, self.service.is_entitled())
      .await
      .map_err(|_| EntitlementError::Unavailable("entitlement status timed out".into()))??;
    self.store(session, entitled);
    Ok(entitled)
  }

  /// Purchase the subscription. On success the cached flag flips to true and the
  /// caller is expected to force a full reconciliation.
  pub async fn grant_entitlement(&self, payment: &PaymentHandle) -> Result<(), EntitlementError> {
    let session = self.session.load(Ordering::Acquire);
    let result = tokio::time::timeout(self.config.payment_timeout, self.service.subscribe(payment))
      .await
      .unwrap_or(Err(EntitlementError::PaymentTimeout));
    if let Err(error) = result {
      log::warn!(target: LOG_TARGET, "subscription payment failed: {}", error);
      return Err(error);
    }
    log::info!(target: LOG_TARGET, "subscription granted");
    self.store(session, true);
    Ok(())
  }

  /// Session teardown: forget the flag and drop answers still in flight
  pub fn reset(&self) {
    self.session.fetch_add(1, Ordering::AcqRel);
    self.entitled.store(false, Ordering::Release);
  }

  fn store(&self, session: u64, entitled: bool) {
    if self.session.load(Ordering::Acquire) != session {
      log::debug!(target: LOG_TARGET, "dropping entitlement answer from a closed session");
      return;
    }
    self.entitled.store(entitled, Ordering::Release);
  }
}
