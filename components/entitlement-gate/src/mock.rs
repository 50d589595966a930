use crate::{EntitlementConfig, EntitlementGate};
use async_trait::async_trait;
use primitives::{EntitlementError, EntitlementService, PaymentHandle};
use std::cell::{Cell, RefCell};
use std::sync::Arc;
use std::time::Duration;

pub const PAYMENT_TIMEOUT: Duration = Duration::from_secs(60);

// State containers for the stateful subscription mock
thread_local! {
    static SUBSCRIBED: Cell<bool> = const { Cell::new(false) };

    // Outcome of the next payment; `None` succeeds
    static PAYMENT_FAILURE: RefCell<Option<EntitlementError>> = const { RefCell::new(None) };

    static SERVICE_DOWN: Cell<bool> = const { Cell::new(false) };

    // Artificial latency of both status reads and payments
    static LATENCY: Cell<Option<Duration>> = const { Cell::new(None) };

    static PAYMENTS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

pub fn set_subscribed(subscribed: bool) {
  SUBSCRIBED.with(|s| s.set(subscribed));
}

pub fn fail_next_payment(error: EntitlementError) {
  PAYMENT_FAILURE.with(|f| *f.borrow_mut() = Some(error));
}

pub fn set_service_down(down: bool) {
  SERVICE_DOWN.with(|d| d.set(down));
}

pub fn set_latency(latency: Duration) {
  LATENCY.with(|l| l.set(Some(latency)));
}

pub fn payments() -> Vec<String> {
  PAYMENTS.with(|p| p.borrow().clone())
}

pub struct MockSubscriptions;

impl MockSubscriptions {
  async fn delay() {
    if let Some(latency) = LATENCY.with(|l| l.get()) {
      tokio::time::sleep(latency).await;
    }
  }
}

#[async_trait]
impl EntitlementService for MockSubscriptions {
  async fn is_entitled(&self) -> Result<bool, EntitlementError> {
    Self::delay().await;
    if SERVICE_DOWN.with(|d| d.get()) {
      return Err(EntitlementError::Unavailable("subscription api down".into()));
    }
    Ok(SUBSCRIBED.with(|s| s.get()))
  }

  async fn subscribe(&self, payment: &PaymentHandle) -> Result<(), EntitlementError> {
    Self::delay().await;
    PAYMENTS.with(|p| p.borrow_mut().push(payment.as_str().to_owned()));
    if let Some(error) = PAYMENT_FAILURE.with(|f| f.borrow_mut().take()) {
      return Err(error);
    }
    SUBSCRIBED.with(|s| s.set(true));
    Ok(())
  }
}

pub fn new_test_ext() -> EntitlementGate {
  SUBSCRIBED.with(|s| s.set(false));
  PAYMENT_FAILURE.with(|f| *f.borrow_mut() = None);
  SERVICE_DOWN.with(|d| d.set(false));
  LATENCY.with(|l| l.set(None));
  PAYMENTS.with(|p| p.borrow_mut().clear());
  EntitlementGate::new(
    Arc::new(MockSubscriptions),
    EntitlementConfig {
      call_timeout: Duration::from_secs(5),
      payment_timeout: PAYMENT_TIMEOUT,
    },
  )
}
