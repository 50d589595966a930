//! Ecosystem Constants for the GIFT Farm
//!
//! This module centralizes the system-level constants shared by every component:
//! balance units, timing parameters and the list of supported NFT collections.
//!
//! These constants are the single source of truth for default configuration and are
//! re-used by the engine's configuration layer via the primitives crate.

/// Balance type alias for consistency across the farm (GIFT minor units)
pub type Balance = u128;

/// Millisecond Unix timestamp as reported by the ledger
pub type Timestamp = u64;

/// Farm parameters defining units, cadences and thresholds.
pub mod params {
  use super::Balance;
  use sp_arithmetic::Permill;

  /// Number of decimals of the GIFT token.
  pub const GIFT_DECIMALS: u32 = 9;

  /// One whole GIFT expressed in minor units (10^9).
  ///
  /// Accrued yield and base balances are exchanged with the ledger in minor units,
  /// so fractional GIFT amounts stay exact through aggregation.
  pub const PRECISION: Balance = Balance::pow(10, GIFT_DECIMALS);

  /// Period between two aggregation rounds (2 seconds).
  pub const REFRESH_PERIOD_MS: u64 = 2_000;

  /// Upper bound for a single ledger or directory request (5 seconds).
  ///
  /// Every fan-out slot resolves within this bound, either with a value or a captured
  /// timeout failure.
  pub const SERVICE_CALL_TIMEOUT_MS: u64 = 5_000;

  /// Upper bound for the subscription payment flow (2 minutes).
  ///
  /// Payments wait on a wallet confirmation, so the bound is much looser than for
  /// ledger reads.
  pub const PAYMENT_TIMEOUT_MS: u64 = 120_000;

  /// Yield lookup failure rate above which monitoring raises an alert (20%).
  pub const MAX_LOOKUP_FAILURE_RATE: Permill = Permill::from_percent(20);
}

/// NFT collections whose items are eligible for farming.
pub mod collections {
  /// Collection addresses accepted by the default configuration
  pub const SUPPORTED_COLLECTIONS: [&str; 10] = [
    "EQC6zjid8vJNEWqcXk10XjsdDLRKbcPZzbHusuEW6FokOWIm",
    "EQD6mH9bwbn6S3M_tCRWOvqAIW8M34kRwbI01niGLRPeDPsl",
    "EQBMcfMAZlMUr1W3X8kdEw3fJMUAaWH4-XcmE5R5RfFIY0E2",
    "EQDQ6DjRabTYSAxf2xrZsnsXtqcIm1bj9dF5x_h8lNjWPmH4",
    "EQCefrjhCD2_7HRIr2lmwt9ZaqeG_tdseBvADC66833kBS3y",
    "EQBD8aBKC4NsnYMqtkCfPQk2EVnieynJQp1UgZVyx1VmR5Ml",
    "EQCBK_JBASAA5XVz1D17Pn--kQaMWm0b9wReVtsEdRO4Tgy9",
    "EQAwzubeoJwnqmmBuTPpnUSurRzWPB8ERzcfzx55Z2YjE0jx",
    "EQCwEFfUbbR-22fn3VgxUpBil7bwBQqEHm7wgQYbWY9c08YJ",
    "EQAaTIR7oJyowDiumYLVN0oe61kGE3I6EPEn7WgHPGuWAeCy",
  ];
}
