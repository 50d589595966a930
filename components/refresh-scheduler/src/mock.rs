use crate::{RefreshScheduler, RefreshTask, SchedulerConfig};
use futures_util::FutureExt;
use std::cell::{Cell, RefCell};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub const PERIOD: Duration = Duration::from_millis(2_000);

// State containers for the recording refresh task
thread_local! {
    static STARTED: Cell<u32> = const { Cell::new(0) };
    static FINISHED: Cell<u32> = const { Cell::new(0) };

    // How long every round takes
    static ROUND_DURATION: Cell<Duration> = const { Cell::new(Duration::ZERO) };

    static EVENTS: RefCell<Vec<&'static str>> = const { RefCell::new(Vec::new()) };

    static ORIGIN: Cell<Option<Instant>> = const { Cell::new(None) };
    static STARTS: RefCell<Vec<Duration>> = const { RefCell::new(Vec::new()) };
}

pub fn set_round_duration(duration: Duration) {
  ROUND_DURATION.with(|d| d.set(duration));
}

pub fn started() -> u32 {
  STARTED.with(|s| s.get())
}

pub fn finished() -> u32 {
  FINISHED.with(|f| f.get())
}

pub fn record(event: &'static str) {
  EVENTS.with(|e| e.borrow_mut().push(event));
}

pub fn events() -> Vec<&'static str> {
  EVENTS.with(|e| e.borrow().clone())
}

/// Offsets from `new_test_ext()` at which rounds started
pub fn start_offsets() -> Vec<Duration> {
  STARTS.with(|s| s.borrow().clone())
}

fn elapsed() -> Duration {
  ORIGIN.with(|o| o.get().map(|origin| origin.elapsed()).unwrap_or_default())
}

/// Refresh task recording every round it runs under `label`
pub fn recording_task(label: &'static str) -> RefreshTask {
  Arc::new(move || {
    async move {
      STARTED.with(|s| s.set(s.get() + 1));
      STARTS.with(|s| s.borrow_mut().push(elapsed()));
      record(label);
      let duration = ROUND_DURATION.with(|d| d.get());
      if !duration.is_zero() {
        tokio::time::sleep(duration).await;
      }
      FINISHED.with(|f| f.set(f.get() + 1));
    }
    .boxed()
  })
}

pub fn new_test_ext() -> RefreshScheduler {
  STARTED.with(|s| s.set(0));
  FINISHED.with(|f| f.set(0));
  ROUND_DURATION.with(|d| d.set(Duration::ZERO));
  EVENTS.with(|e| e.borrow_mut().clear());
  STARTS.with(|s| s.borrow_mut().clear());
  ORIGIN.with(|o| o.set(Some(Instant::now())));
  RefreshScheduler::new(SchedulerConfig { period: PERIOD })
}
