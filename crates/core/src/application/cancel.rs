// Wait Cancellation Token

use tokio::sync::watch;

/// Cancellation signal for an in-progress wait
#[derive(Clone)]
pub struct CancelToken {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelToken {
    /// A token that never fires
    pub fn never() -> Self {
        Self { rx: None }
    }

    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolve once cancellation is requested
    pub async fn cancelled(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            let fired = rx.wait_for(|cancelled| *cancelled).await.map(|_| ()).is_ok();
            if fired {
                return;
            }
        }
        // No handle, or handle dropped without cancelling: never fires.
        std::future::pending::<()>().await;
    }
}

/// Cancel sender
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Signal cancellation to every clone of the token
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Create a cancel channel
pub fn cancel_channel() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx: Some(rx) })
}
