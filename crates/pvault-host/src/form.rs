//! The protected-form controller.

use std::sync::{Arc, Mutex, MutexGuard};

use pvault_error::PvaultError;
use pvault_sandbox::channel::{self, Envelope, Inbox, Sender};
use pvault_sandbox::logger::Logger;
use pvault_sandbox::protocol::{form_options_schema, form_outbound_schema, FormSandboxEvent};
use pvault_sandbox::session::{spawn_form_frame, ClientFactory, UserHandle};
use pvault_sandbox::{Frame, FormOptions, Size, SubmitResult};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::hooks::FormHooks;
use crate::ready::{self, ReadyGate, ReadySetter};

type SubmitValue = Option<Result<SubmitResult, PvaultError>>;

struct PendingSubmit {
    tx: watch::Sender<SubmitValue>,
    rx: watch::Receiver<SubmitValue>,
}

type SubmitSlot = Arc<Mutex<Option<PendingSubmit>>>;

fn lock_slot(slot: &SubmitSlot) -> MutexGuard<'_, Option<PendingSubmit>> {
    // the lock is never held across await points
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn resolve_pending(slot: &SubmitSlot, result: Result<SubmitResult, PvaultError>) {
    if let Some(pending) = lock_slot(slot).take() {
        let _ = pending.tx.send(Some(result));
    }
}

/// Validates `options` the way the sandbox will, so bad configuration fails
/// fast with no frame spawned.
fn validated_payload(options: &FormOptions) -> Result<serde_json::Value, PvaultError> {
    let payload = serde_json::to_value(options)
        .map_err(|_| PvaultError::initialization("Invalid options provided"))?;
    if !form_options_schema().parse(&payload) {
        return Err(PvaultError::initialization("Invalid options provided"));
    }
    Ok(payload)
}

/// Creates a protected form: validates options, spawns the sandbox frame,
/// sends `init` plus the initial container size, and returns the handle.
pub fn create_protected_form(
    clients: ClientFactory,
    container: Size,
    options: FormOptions,
    hooks: FormHooks,
) -> Result<ProtectedForm, PvaultError> {
    let payload = validated_payload(&options)?;
    let logger = Logger::new("host", options.debug.unwrap_or(false));

    let frame = spawn_form_frame(clients);
    let (host_port, host_inbox) = channel::channel();
    let sender = Sender::bound(frame.port(), host_port, logger);

    let (setter, gate) = ready::gate();
    let pending: SubmitSlot = Arc::new(Mutex::new(None));
    let (content_tx, content_rx) = watch::channel(Size::default());

    let pump = tokio::spawn(pump(
        host_inbox,
        setter,
        pending.clone(),
        content_tx,
        hooks,
        logger,
    ));

    sender.send("init", Some(payload));
    if let Ok(size) = serde_json::to_value(container) {
        sender.send("container-size", Some(size));
    }

    Ok(ProtectedForm {
        frame,
        sender,
        gate,
        pending,
        content_rx,
        pump,
    })
}

async fn pump(
    mut inbox: Inbox,
    setter: ReadySetter,
    pending: SubmitSlot,
    content_tx: watch::Sender<Size>,
    hooks: FormHooks,
    logger: Logger,
) {
    while let Some(envelope) = inbox.recv().await {
        let Envelope { data, source } = envelope;
        if source.is_none() {
            logger.log("dropped message with null source");
            continue;
        }
        if !form_outbound_schema().parse(&data) {
            logger.log("dropped invalid message");
            continue;
        }
        let Ok(event) = serde_json::from_value::<FormSandboxEvent>(data) else {
            logger.log("dropped invalid message");
            continue;
        };

        match event {
            FormSandboxEvent::Ready => {
                logger.log("received \"ready\" event");
                setter.resolve(Ok(()));
            }
            FormSandboxEvent::ContentSize(size) => {
                content_tx.send_replace(size);
            }
            FormSandboxEvent::Submit(result) => {
                if let Some(on_submit) = &hooks.on_submit {
                    on_submit(&result);
                }
                resolve_pending(&pending, Ok(result));
            }
            FormSandboxEvent::Error(payload) => {
                let Some(error) = PvaultError::from_payload(&payload) else {
                    logger.log("dropped invalid message");
                    continue;
                };
                // timing relative to `ready` decides: reject the gate, or
                // report through the hook and fail any in-flight submit
                if !setter.is_ready() {
                    setter.resolve(Err(error));
                    continue;
                }
                if let Some(on_error) = &hooks.on_error {
                    on_error(&error);
                }
                resolve_pending(&pending, Err(error));
            }
        }
    }
}

/// Handle to a running protected form.
///
/// Every operation awaits the readiness gate first.
pub struct ProtectedForm {
    frame: Frame,
    sender: Sender,
    gate: ReadyGate,
    pending: SubmitSlot,
    content_rx: watch::Receiver<Size>,
    pump: JoinHandle<()>,
}

impl ProtectedForm {
    /// Submits the form.
    ///
    /// Concurrent calls coalesce: while one submission is in flight, further
    /// calls share its result instead of issuing a second round-trip.
    pub async fn submit(&self) -> Result<SubmitResult, PvaultError> {
        self.gate.wait().await?;

        let rx = {
            let mut slot = lock_slot(&self.pending);
            match &*slot {
                Some(pending) => pending.rx.clone(),
                None => {
                    let (tx, rx) = watch::channel(None);
                    *slot = Some(PendingSubmit {
                        tx,
                        rx: rx.clone(),
                    });
                    self.sender.send("submit", None);
                    rx
                }
            }
        };

        let mut rx = rx;
        let resolved = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| PvaultError::initialization("sandbox frame is gone"))?;
        resolved
            .clone()
            .unwrap_or(Err(PvaultError::initialization("sandbox frame is gone")))
    }

    /// Replaces the form configuration. Re-validates locally before sending.
    pub async fn update(&self, options: &FormOptions) -> Result<(), PvaultError> {
        self.gate.wait().await?;
        let payload = validated_payload(options)?;
        self.sender.send("update", Some(payload));
        Ok(())
    }

    /// Forwards the host container size. Never gated on readiness.
    pub fn resize(&self, size: Size) {
        if let Ok(payload) = serde_json::to_value(size) {
            self.sender.send("container-size", Some(payload));
        }
    }

    /// The last content size the sandbox reported.
    pub fn content_size(&self) -> Size {
        *self.content_rx.borrow()
    }

    /// Drives user interactions inside the sandbox document.
    pub fn user(&self) -> UserHandle {
        self.frame.user()
    }

    /// Tears the frame down. Awaits readiness first (even a failed one), so
    /// teardown never races initialization.
    pub async fn destroy(self) {
        let _ = self.gate.wait().await;
        self.pump.abort();
        drop(self.frame);
    }
}
