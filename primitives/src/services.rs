//! Adapter traits for the external services
//!
//! Three traits abstract every collaborator the engine talks to, keeping the components
//! independent of any transport, wallet or ledger implementation.

use crate::assets::{Address, Asset, FarmingRecord, InvalidRecord};
use crate::ecosystem::Balance;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// Failure of a single ledger request.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
  /// The ledger could not be reached
  #[error("ledger unavailable: {0}")]
  Unavailable(String),
  /// The ledger refused the request for this asset (eligibility, ownership, ...)
  #[error("ledger rejected the request: {0}")]
  Rejected(String),
  /// No answer within the call bound
  #[error("ledger call timed out after {0:?}")]
  Timeout(Duration),
  /// The ledger answered with an inconsistent farming record
  #[error(transparent)]
  InvalidRecord(#[from] InvalidRecord),
}

impl LedgerError {
  /// True when the failure says nothing about the asset itself, only about reachability.
  pub fn is_transport(&self) -> bool {
    matches!(self, LedgerError::Unavailable(_) | LedgerError::Timeout(_))
  }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
  #[error("asset directory unavailable: {0}")]
  Unavailable(String),
  #[error("asset directory timed out after {0:?}")]
  Timeout(Duration),
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EntitlementError {
  #[error("payment rejected: {0}")]
  PaymentRejected(String),
  #[error("payment timed out")]
  PaymentTimeout,
  #[error("entitlement service unavailable: {0}")]
  Unavailable(String),
  /// Batch operations require an active subscription
  #[error("premium entitlement required")]
  NotEntitled,
}

/// Opaque handle the wallet connector hands over to authorize a subscription payment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentHandle(String);

impl PaymentHandle {
  pub fn new(handle: impl Into<String>) -> Self {
    PaymentHandle(handle.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

/// Read-only lookup of the NFT items an account owns.
#[async_trait]
pub trait AssetDirectory: Send + Sync {
  async fn get_user_assets(&self, account: &Address) -> Result<Vec<Asset>, DirectoryError>;
}

/// Source of truth for farming state and balances; executor of farming transactions.
///
/// Every method may fail independently per asset.
#[async_trait]
pub trait LedgerService: Send + Sync {
  /// Yield accrued by `asset` since its farming start
  async fn get_accumulated_yield(&self, asset: &Address) -> Result<Balance, LedgerError>;

  /// Collected GIFT balance of the connected account
  async fn get_base_balance(&self) -> Result<Balance, LedgerError>;

  /// Submit a start-farming transaction for `asset`
  async fn submit_start(&self, asset: &Address) -> Result<(), LedgerError>;

  /// Submit a collect transaction for `asset`, returning the amount collected
  async fn submit_collect(&self, asset: &Address) -> Result<Balance, LedgerError>;

  /// Current farming record of `asset`
  async fn get_farming_record(&self, asset: &Address) -> Result<FarmingRecord, LedgerError>;
}

/// Premium subscription status and purchase.
#[async_trait]
pub trait EntitlementService: Send + Sync {
  async fn is_entitled(&self) -> Result<bool, EntitlementError>;

  /// Fails with `PaymentRejected` or `PaymentTimeout`
  async fn subscribe(&self, payment: &PaymentHandle) -> Result<(), EntitlementError>;
}

/// Errors that can express "no answer within the bound".
pub trait TimedOut {
  fn timed_out(after: Duration) -> Self;
}

impl TimedOut for LedgerError {
  fn timed_out(after: Duration) -> Self {
    LedgerError::Timeout(after)
  }
}

impl TimedOut for DirectoryError {
  fn timed_out(after: Duration) -> Self {
    DirectoryError::Timeout(after)
  }
}

/// Run a service call with an upper bound, turning the elapsed bound into the
/// service's own timeout error.
pub async fn bounded<T, E, F>(limit: Duration, call: F) -> Result<T, E>
where
  E: TimedOut,
  F: Future<Output = Result<T, E>>,
{
  match tokio::time::timeout(limit, call).await {
    Ok(result) => result,
    Err(_) => Err(E::timed_out(limit)),
  }
}
