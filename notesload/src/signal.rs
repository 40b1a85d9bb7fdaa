use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Lets a driver stop a virtual user at its next pause.
///
/// Requests in flight are never interrupted; the signal is only observed while pausing.
#[derive(Clone, Debug)]
pub struct StopSignal {
    rx: Option<watch::Receiver<bool>>,
}

/// Sending half of a [`StopSignal`].
#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopSignal {
    pub fn channel() -> (StopHandle, StopSignal) {
        let (tx, rx) = watch::channel(false);
        (StopHandle { tx }, StopSignal { rx: Some(rx) })
    }

    /// A signal that never fires.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_stopped(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Sleep for `duration`. Returns `false` if a stop was requested before or during the pause.
    pub async fn pause(&mut self, duration: Duration) -> bool {
        if self.is_stopped() {
            return false;
        }

        let Some(rx) = self.rx.as_mut() else {
            tokio::time::sleep(duration).await;
            return true;
        };

        let deadline = Instant::now() + duration;
        let stopped = tokio::select! {
            _ = tokio::time::sleep_until(deadline) => false,
            stopped = wait_for_stop(rx) => stopped,
        };

        if stopped {
            return false;
        }

        // The handle was dropped early; finish the pause.
        tokio::time::sleep_until(deadline).await;
        true
    }
}

// Resolves to `false` if the handle is dropped without stopping
async fn wait_for_stop(rx: &mut watch::Receiver<bool>) -> bool {
    loop {
        if *rx.borrow_and_update() {
            return true;
        }
        if rx.changed().await.is_err() {
            return false;
        }
    }
}

impl StopHandle {
    pub fn stop(&self) {
        // Receivers may already be gone
        let _ = self.tx.send(true);
    }
}
