//! Process-wide shutdown signal.
//!
//! A [`ShutdownTrigger`] fires once; every [`ShutdownSignal`] cloned from
//! it resolves when that happens. Sessions select on the signal so that
//! shutting the server down moves every open stream into `Closing`.

use std::sync::Arc;

use tokio::sync::watch;

/// Fires the shutdown signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: Arc<watch::Sender<bool>>,
}

/// Resolves once the paired [`ShutdownTrigger`] fires.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

/// Create a connected trigger/signal pair.
pub fn channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx: Arc::new(tx) }, ShutdownSignal { rx })
}

impl ShutdownTrigger {
    /// Signal shutdown to every listener. Idempotent.
    pub fn fire(&self) {
        self.tx.send_replace(true);
    }

    /// A new signal tied to this trigger.
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl ShutdownSignal {
    /// Whether shutdown has already been signalled.
    pub fn is_fired(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until shutdown is signalled.
    ///
    /// If every trigger is dropped without firing, this never resolves.
    pub async fn fired(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn signal_resolves_after_fire() {
        let (trigger, mut signal) = channel();
        assert!(!signal.is_fired());
        trigger.fire();
        tokio::time::timeout(Duration::from_secs(1), signal.fired())
            .await
            .unwrap_or_else(|_| panic!("signal did not resolve"));
        assert!(signal.is_fired());
    }

    #[tokio::test]
    async fn dropped_trigger_does_not_resolve() {
        let (trigger, mut signal) = channel();
        drop(trigger);
        let waited = tokio::time::timeout(Duration::from_millis(50), signal.fired()).await;
        assert!(waited.is_err());
    }
}
