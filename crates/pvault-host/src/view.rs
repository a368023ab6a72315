//! The protected-view controller.

use pvault_error::PvaultError;
use pvault_sandbox::channel::{self, Envelope, Inbox, Sender};
use pvault_sandbox::logger::Logger;
use pvault_sandbox::protocol::{
    view_options_schema, view_outbound_schema, CopyRequest, ViewSandboxEvent,
};
use pvault_sandbox::session::{spawn_view_frame, ClientFactory, UserHandle};
use pvault_sandbox::{Frame, Size, ViewOptions};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::hooks::ViewHooks;
use crate::ready::{self, ReadyGate, ReadySetter};

fn validated_payload(options: &ViewOptions) -> Result<serde_json::Value, PvaultError> {
    let payload = serde_json::to_value(options)
        .map_err(|_| PvaultError::initialization("Invalid options provided"))?;
    if !view_options_schema().parse(&payload) {
        return Err(PvaultError::initialization("Invalid options provided"));
    }
    Ok(payload)
}

/// Creates a protected view: validates options, spawns the sandbox frame,
/// sends `init` plus the initial container size, and returns the handle.
pub fn create_protected_view(
    clients: ClientFactory,
    container: Size,
    options: ViewOptions,
    hooks: ViewHooks,
) -> Result<ProtectedView, PvaultError> {
    let payload = validated_payload(&options)?;
    let logger = Logger::new("host", options.debug.unwrap_or(false));

    let frame = spawn_view_frame(clients);
    let (host_port, host_inbox) = channel::channel();
    let sender = Sender::bound(frame.port(), host_port, logger);

    let (setter, gate) = ready::gate();
    let (content_tx, content_rx) = watch::channel(Size::default());

    let pump = tokio::spawn(pump(host_inbox, setter, content_tx, hooks, logger));

    sender.send("init", Some(payload));
    if let Ok(size) = serde_json::to_value(container) {
        sender.send("container-size", Some(size));
    }

    Ok(ProtectedView {
        frame,
        sender,
        gate,
        content_rx,
        pump,
    })
}

async fn pump(
    mut inbox: Inbox,
    setter: ReadySetter,
    content_tx: watch::Sender<Size>,
    hooks: ViewHooks,
    logger: Logger,
) {
    while let Some(envelope) = inbox.recv().await {
        let Envelope { data, source } = envelope;
        if source.is_none() {
            logger.log("dropped message with null source");
            continue;
        }
        if !view_outbound_schema().parse(&data) {
            logger.log("dropped invalid message");
            continue;
        }
        let Ok(event) = serde_json::from_value::<ViewSandboxEvent>(data) else {
            logger.log("dropped invalid message");
            continue;
        };

        match event {
            ViewSandboxEvent::Ready => {
                logger.log("received \"ready\" event");
                setter.resolve(Ok(()));
            }
            ViewSandboxEvent::ContentSize(size) => {
                content_tx.send_replace(size);
            }
            ViewSandboxEvent::Click(interaction) => {
                if let Some(on_click) = &hooks.on_click {
                    on_click(&interaction);
                }
            }
            ViewSandboxEvent::Mouseenter(interaction) => {
                if let Some(on_mouseenter) = &hooks.on_mouseenter {
                    on_mouseenter(&interaction);
                }
            }
            ViewSandboxEvent::Mouseleave(interaction) => {
                if let Some(on_mouseleave) = &hooks.on_mouseleave {
                    on_mouseleave(&interaction);
                }
            }
            ViewSandboxEvent::Error(payload) => {
                let Some(error) = PvaultError::from_payload(&payload) else {
                    logger.log("dropped invalid message");
                    continue;
                };
                if !setter.is_ready() {
                    setter.resolve(Err(error));
                    continue;
                }
                if let Some(on_error) = &hooks.on_error {
                    on_error(&error);
                }
            }
        }
    }
}

/// Handle to a running protected view.
pub struct ProtectedView {
    frame: Frame,
    sender: Sender,
    gate: ReadyGate,
    content_rx: watch::Receiver<Size>,
    pump: JoinHandle<()>,
}

impl ProtectedView {
    /// Replaces the view configuration. Re-validates locally before sending.
    pub async fn update(&self, options: &ViewOptions) -> Result<(), PvaultError> {
        self.gate.wait().await?;
        let payload = validated_payload(options)?;
        self.sender.send("update", Some(payload));
        Ok(())
    }

    /// Asks the sandbox to copy the value at `path` to its clipboard. The
    /// resolved value never crosses back to the host; failures surface
    /// through the error hook.
    pub async fn copy(
        &self,
        path: &str,
        trusted_event_key: Option<&str>,
    ) -> Result<(), PvaultError> {
        self.gate.wait().await?;
        let request = CopyRequest {
            path: path.to_owned(),
            trusted_event_key: trusted_event_key.map(str::to_owned),
        };
        if let Ok(payload) = serde_json::to_value(request) {
            self.sender.send("copy", Some(payload));
        }
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
