//! Refresh Scheduler
//!
//! Periodic timer driving balance refresh rounds while a collection is loaded.
//!
//! At most one round is in flight at any time. A tick that fires while a round is
//! still pending is dropped and counted, never queued behind it. Explicit rounds
//! requested through [`RefreshScheduler::run_exclusive`] wait for the pending round
//! instead of being dropped.

#[cfg(test)]
mod mock;

use futures_util::future::BoxFuture;
use primitives::ecosystem::params;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const LOG_TARGET: &str = "farm::refresh-scheduler";

/// One refresh round, started afresh on every tick
pub type RefreshTask = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Configuration of the refresh scheduler
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
  /// Fixed tick period; the first tick fires immediately
  pub period: Duration,
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    Self {
      period: Duration::from_millis(params::REFRESH_PERIOD_MS),
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
  Idle,
  Scheduled,
}

#[derive(Default)]
struct Counters {
  rounds: AtomicU64,
  skipped: AtomicU64,
}

pub struct RefreshScheduler {
  config: SchedulerConfig,
  /// Held for the whole duration of a round
  round: Arc<tokio::sync::Mutex<()>>,
  counters: Arc<Counters>,
  timer: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
  pub fn new(config: SchedulerConfig) -> Self {
    Self {
      config,
      round: Arc::new(tokio::sync::Mutex::new(())),
      counters: Arc::new(Counters::default()),
      timer: Mutex::new(None),
    }
  }

  /// Arm the periodic timer with `task`, replacing any previous schedule.
  ///
  /// Must be called from within a tokio runtime.
  pub fn schedule(&self, task: RefreshTask) {
    let mut timer = self.timer();
    if let Some(previous) = timer.take() {
      previous.abort();
    }
    let period = self.config.period.max(Duration::from_millis(1));
    let handle = tokio::spawn(Self::tick_loop(
      period,
      task,
      self.round.clone(),
      self.counters.clone(),
    ));
    *timer = Some(handle);
    log::info!(target: LOG_TARGET, "refresh scheduled every {:?}", period);
  }

  /// Return to `Idle`. A round already running is left to finish.
  pub fn cancel(&self) -> bool {
    match self.timer().take() {
      Some(handle) => {
        handle.abort();
        log::info!(target: LOG_TARGET, "refresh schedule cancelled");
        true
      }
      None => false,
    }
  }

  pub fn state(&self) -> SchedulerState {
    match self.timer().as_ref() {
      Some(handle) if !handle.is_finished() => SchedulerState::Scheduled,
      _ => SchedulerState::Idle,
    }
  }

  pub fn is_scheduled(&self) -> bool {
    self.state() == SchedulerState::Scheduled
  }

  /// True while a round holds the single-flight slot
  pub fn in_flight(&self) -> bool {
    self.round.try_lock().is_err()
  }

  /// Run `round` in the single-flight slot, waiting for a pending round first.
  pub async fn run_exclusive<F: Future>(&self, round: F) -> F::Output {
    let _slot = self.round.lock().await;
    self.counters.rounds.fetch_add(1, Ordering::Relaxed);
    round.await
  }

  /// Rounds started, by ticks and explicit requests alike
  pub fn rounds(&self) -> u64 {
    self.counters.rounds.load(Ordering::Relaxed)
  }

  /// Ticks dropped because a round was in flight
  pub fn skipped_ticks(&self) -> u64 {
    self.counters.skipped.load(Ordering::Relaxed)
  }

  async fn tick_loop(
    period: Duration,
    task: RefreshTask,
    round: Arc<tokio::sync::Mutex<()>>,
    counters: Arc<Counters>,
  ) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
      ticker.tick().await;
      match round.clone().try_lock_owned() {
        Ok(slot) => {
          counters.rounds.fetch_add(1, Ordering::Relaxed);
          let pending = task();
          tokio::spawn(async move {
            pending.await;
            drop(slot);
          });
        }
        Err(_) => {
          let skipped = counters.skipped.fetch_add(1, Ordering::Relaxed) + 1;
          log::debug!(target: LOG_TARGET, "round in flight, tick dropped ({} so far)", skipped);
        }
      }
    }
  }

  fn timer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
    self.timer.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

impl Drop for RefreshScheduler {
  fn drop(&mut self) {
    let timer = self
      .timer
      .get_mut()
      .unwrap_or_else(PoisonError::into_inner)
      .take();
    if let Some(handle) = timer {
      handle.abort();
    }
  }
}
