/* src/server/core/rust/src/deadline.rs */

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::abort::AbortHandle;

pub const DEFAULT_RENDER_DEADLINE: Duration = Duration::from_secs(10);

/// Per-request watchdog. Fires the abort handle once `budget` elapses;
/// dropping the guard cancels the timer.
#[derive(Debug)]
pub struct DeadlineGuard {
  budget: Duration,
  timer: JoinHandle<()>,
}

impl DeadlineGuard {
  pub fn arm(budget: Duration, abort: AbortHandle) -> Self {
    let timer = tokio::spawn(async move {
      tokio::time::sleep(budget).await;
      if !abort.is_aborted() {
        tracing::warn!(budget_ms = budget.as_millis() as u64, "render deadline exceeded, aborting");
      }
      abort.abort();
    });
    Self { budget, timer }
  }

  pub fn budget(&self) -> Duration {
    self.budget
  }

  pub fn is_expired(&self) -> bool {
    self.timer.is_finished()
  }
}

impl Drop for DeadlineGuard {
  fn drop(&mut self) {
    self.timer.abort();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::abort::abort_pair;

  #[tokio::test]
  async fn fires_after_budget() {
    let (handle, mut signal) = abort_pair();
    let guard = DeadlineGuard::arm(Duration::from_millis(10), handle);
    tokio::time::timeout(Duration::from_secs(1), signal.aborted()).await.unwrap();
    assert!(signal.is_aborted());
    assert_eq!(guard.budget(), Duration::from_millis(10));
  }

  #[tokio::test]
  async fn drop_cancels_timer() {
    let (handle, signal) = abort_pair();
    let guard = DeadlineGuard::arm(Duration::from_millis(20), handle);
    drop(guard);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!signal.is_aborted());
  }
}
