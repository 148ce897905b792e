/* src/server/core/rust/src/abort.rs */

use std::sync::Arc;

use tokio::sync::watch;

/// Fires a request's abort signal. Cloneable; firing twice is harmless.
#[derive(Debug, Clone)]
pub struct AbortHandle {
  tx: Arc<watch::Sender<bool>>,
}

/// Observes a request's abort signal.
#[derive(Debug, Clone)]
pub struct AbortSignal {
  rx: watch::Receiver<bool>,
}

pub fn abort_pair() -> (AbortHandle, AbortSignal) {
  let (tx, rx) = watch::channel(false);
  (AbortHandle { tx: Arc::new(tx) }, AbortSignal { rx })
}

impl AbortHandle {
  pub fn new() -> Self {
    abort_pair().0
  }

  pub fn abort(&self) {
    self.tx.send_replace(true);
  }

  pub fn is_aborted(&self) -> bool {
    *self.tx.borrow()
  }

  pub fn signal(&self) -> AbortSignal {
    AbortSignal { rx: self.tx.subscribe() }
  }
}

impl Default for AbortHandle {
  fn default() -> Self {
    Self::new()
  }
}

impl AbortSignal {
  pub fn is_aborted(&self) -> bool {
    *self.rx.borrow()
  }

  /// Resolves once the signal fires. Never resolves if every handle is
  /// dropped without firing.
  pub async fn aborted(&mut self) {
    if self.rx.wait_for(|fired| *fired).await.is_err() {
      std::future::pending::<()>().await;
    }
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use super::*;

  #[tokio::test]
  async fn abort_wakes_waiters() {
    let (handle, mut signal) = abort_pair();
    assert!(!signal.is_aborted());
    let waiter = tokio::spawn(async move {
      signal.aborted().await;
      true
    });
    handle.abort();
    handle.abort();
    assert!(waiter.await.unwrap());
    assert!(handle.is_aborted());
    assert!(handle.signal().is_aborted());
  }

  #[tokio::test]
  async fn dropped_handle_never_fires() {
    let (handle, mut signal) = abort_pair();
    drop(handle);
    let waited = tokio::time::timeout(Duration::from_millis(20), signal.aborted()).await;
    assert!(waited.is_err());
  }
}
