//! The single readiness gate every controller operation awaits.
//!
//! Resolves once, on the first `ready` or the first pre-ready `error`.
//! Whether an error rejects the gate or reaches the error hook is decided
//! purely by its timing relative to `ready`.

use pvault_error::PvaultError;
use tokio::sync::watch;

/// The resolving half, owned by the controller's pump task.
#[derive(Debug)]
pub(crate) struct ReadySetter {
    tx: watch::Sender<Option<Result<(), PvaultError>>>,
}

/// The awaiting half, shared by every handle operation.
#[derive(Debug, Clone)]
pub(crate) struct ReadyGate {
    rx: watch::Receiver<Option<Result<(), PvaultError>>>,
}

pub(crate) fn gate() -> (ReadySetter, ReadyGate) {
    let (tx, rx) = watch::channel(None);
    (ReadySetter { tx }, ReadyGate { rx })
}

impl ReadySetter {
    /// Resolve the gate. Later calls are ignored; only the first `ready` or
    /// `error` counts.
    pub(crate) fn resolve(&self, result: Result<(), PvaultError>) {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(result.clone());
            true
        });
    }

    /// Whether the gate already resolved as ready.
    pub(crate) fn is_ready(&self) -> bool {
        matches!(*self.tx.borrow(), Some(Ok(())))
    }
}

impl ReadyGate {
    /// Wait for resolution. `destroy` ignores the error case; everything
    /// else propagates it.
    pub(crate) async fn wait(&self) -> Result<(), PvaultError> {
        let mut rx = self.rx.clone();
        let resolved = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| PvaultError::initialization("sandbox frame is gone"))?;
        resolved
            .clone()
            .unwrap_or(Err(PvaultError::initialization("sandbox frame is gone")))
    }
}
