//! The sandbox-side runtime: one task per frame, pumping the wire inbox and
//! local user events through the session state machine.
//!
//! Every inbound envelope is handled in three steps: drop it silently when
//! the platform attached no source, check it against the closed per-direction
//! schema, and only then deserialize and dispatch. The reply sender is bound
//! to the source of the `init` message that started the session, so a
//! spoofed message from another context cannot hijack the reply channel.

use std::sync::Arc;

use pvault_client::{VaultApi, VaultConfig};
use pvault_error::PvaultError;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::channel::{self, Envelope, Inbox, Port, Sender};
use crate::form::FormModel;
use crate::logger::Logger;
use crate::options::{FormOptions, ViewOptions};
use crate::protocol::{
    form_inbound_schema, view_inbound_schema, CopyRequest, FormHostEvent, ViewHostEvent,
};
use crate::ui::Document;
use crate::view::ViewModel;

/// Builds a vault client for the connection settings carried by `init` and
/// `update` payloads.
pub type ClientFactory = Arc<dyn Fn(&VaultConfig) -> Arc<dyn VaultApi> + Send + Sync>;

/// A user interaction inside the sandbox document.
#[derive(Debug)]
pub enum UserEvent {
    /// An input field was edited.
    Input {
        /// Field name.
        name: String,
        /// New value.
        value: String,
    },
    /// The rendered submit button was pressed.
    PressSubmit,
    /// A display value was clicked.
    Click {
        /// Display path of the clicked node.
        path: String,
    },
    /// The pointer entered a display value.
    PointerEnter {
        /// Display path of the node.
        path: String,
        /// Pointer x coordinate.
        x: f64,
        /// Pointer y coordinate.
        y: f64,
    },
    /// The pointer left a display value.
    PointerLeave {
        /// Display path of the node.
        path: String,
    },
    /// Snapshot the sandbox document, for tests and tooling.
    Inspect(oneshot::Sender<Document>),
}

/// Drives user interactions into a running frame.
#[derive(Debug, Clone)]
pub struct UserHandle {
    tx: mpsc::UnboundedSender<UserEvent>,
}

impl UserHandle {
    /// Edit a field.
    pub fn input(&self, name: &str, value: &str) {
        let _ = self.tx.send(UserEvent::Input {
            name: name.to_owned(),
            value: value.to_owned(),
        });
    }

    /// Press the rendered submit button.
    pub fn press_submit(&self) {
        let _ = self.tx.send(UserEvent::PressSubmit);
    }

    /// Click a display value.
    pub fn click(&self, path: &str) {
        let _ = self.tx.send(UserEvent::Click {
            path: path.to_owned(),
        });
    }

    /// Move the pointer onto a display value.
    pub fn pointer_enter(&self, path: &str, x: f64, y: f64) {
        let _ = self.tx.send(UserEvent::PointerEnter {
            path: path.to_owned(),
            x,
            y,
        });
    }

    /// Move the pointer off a display value.
    pub fn pointer_leave(&self, path: &str) {
        let _ = self.tx.send(UserEvent::PointerLeave {
            path: path.to_owned(),
        });
    }

    /// Snapshot the current sandbox document.
    pub async fn inspect(&self) -> Option<Document> {
        let (reply, response) = oneshot::channel();
        self.tx.send(UserEvent::Inspect(reply)).ok()?;
        response.await.ok()
    }
}

/// A spawned sandbox frame: the port the host delivers to, plus a handle for
/// user interactions.
#[derive(Debug)]
pub struct Frame {
    port: Port,
    user: UserHandle,
    task: JoinHandle<()>,
}

impl Frame {
    /// The port messages to this frame are delivered to.
    pub fn port(&self) -> Port {
        self.port.clone()
    }

    /// The user-interaction handle.
    pub fn user(&self) -> UserHandle {
        self.user.clone()
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn a form frame.
pub fn spawn_form_frame(clients: ClientFactory) -> Frame {
    let (port, inbox) = channel::channel();
    let (user_tx, user_rx) = mpsc::unbounded_channel();
    let session = FormSession::new(port.clone(), clients);
    let task = tokio::spawn(session.run(inbox, user_rx));
    Frame {
        port,
        user: UserHandle { tx: user_tx },
        task,
    }
}

/// Spawn a view frame.
pub fn spawn_view_frame(clients: ClientFactory) -> Frame {
    let (port, inbox) = channel::channel();
    let (user_tx, user_rx) = mpsc::unbounded_channel();
    let session = ViewSession::new(port.clone(), clients);
    let task = tokio::spawn(session.run(inbox, user_rx));
    Frame {
        port,
        user: UserHandle { tx: user_tx },
        task,
    }
}

fn error_payload(error: &PvaultError) -> Option<serde_json::Value> {
    Some(error.to_payload())
}

struct FormSession {
    self_port: Port,
    clients: ClientFactory,
    sender: Sender,
    logger: Logger,
    document: Document,
    state: Option<FormState>,
}

struct FormState {
    model: FormModel,
    client: Arc<dyn VaultApi>,
    allow_updates: bool,
    has_submit_button: bool,
}

impl FormSession {
    fn new(self_port: Port, clients: ClientFactory) -> Self {
        let logger = Logger::disabled("sandbox");
        FormSession {
            self_port,
            clients,
            sender: Sender::unbound(logger),
            logger,
            document: Document::default(),
            state: None,
        }
    }

    async fn run(
        mut self,
        mut inbox: Inbox,
        mut user_rx: mpsc::UnboundedReceiver<UserEvent>,
    ) {
        loop {
            // wire messages are drained before user events, matching the
            // in-order delivery of the underlying channel
            tokio::select! {
                biased;
                envelope = inbox.recv() => match envelope {
                    Some(envelope) => self.handle_envelope(envelope).await,
                    None => break,
                },
                event = user_rx.recv() => match event {
                    Some(event) => self.handle_user_event(event).await,
                    None => break,
                },
            }
        }
    }

    async fn handle_envelope(&mut self, envelope: Envelope) {
        // extension-spoofed messages carry no source and are never processed
        let Some(source) = envelope.source else {
            self.logger.log("dropped message with null source");
            return;
        };

        if !form_inbound_schema().parse(&envelope.data) {
            self.sender
                .send("error", error_payload(&PvaultError::invalid_event()));
            return;
        }

        let Ok(event) = serde_json::from_value::<FormHostEvent>(envelope.data) else {
            self.sender
                .send("error", error_payload(&PvaultError::invalid_event()));
            return;
        };

        match event {
            FormHostEvent::Init(options) => self.init(source, &options),
            FormHostEvent::Update(options) => self.update(&options),
            FormHostEvent::Submit => self.submit().await,
            FormHostEvent::ContainerSize(size) => self.document.size = size,
        }
    }

    fn init(&mut self, source: Port, options: &FormOptions) {
        self.logger = Logger::new("sandbox", options.debug.unwrap_or(false));
        // replies always go to the source of this exact init message
        self.sender = Sender::bound(source, self.self_port.clone(), self.logger);
        self.logger.log("received \"init\" event");

        if self.state.is_some() {
            self.sender.send(
                "error",
                error_payload(&PvaultError::initialization("Form already initialized")),
            );
            return;
        }

        let client = (self.clients)(&VaultConfig {
            vault_url: options.vault_url.clone(),
            api_key: options.api_key.clone(),
        });
        let mut model = FormModel::new(options, self.logger);
        self.document.replace_body(model.render());
        self.state = Some(FormState {
            model,
            client,
            allow_updates: options.allow_updates.unwrap_or(false),
            has_submit_button: options.submit_button.is_some(),
        });
        self.sender.send("ready", None);
        self.report_content_size();
    }

    fn update(&mut self, options: &FormOptions) {
        let Some(state) = &mut self.state else {
            self.sender.send(
                "error",
                error_payload(&PvaultError::initialization("Form not initialized")),
            );
            return;
        };
        if !state.allow_updates {
            self.sender.send(
                "error",
                error_payload(&PvaultError::update("Updates are not allowed")),
            );
            return;
        }

        state.client = (self.clients)(&VaultConfig {
            vault_url: options.vault_url.clone(),
            api_key: options.api_key.clone(),
        });
        state.model.update(options);
        state.allow_updates = options.allow_updates.unwrap_or(false);
        state.has_submit_button = options.submit_button.is_some();
        self.document.replace_body(state.model.render());
        self.report_content_size();
    }

    async fn submit(&mut self) {
        let Some(state) = &mut self.state else {
            self.sender.send(
                "error",
                error_payload(&PvaultError::initialization("Form not initialized")),
            );
            return;
        };

        let outcome = state.model.submit(state.client.as_ref()).await;
        self.document.replace_body(state.model.render());
        self.report_content_size();
        match outcome {
            Ok(result) => match serde_json::to_value(&result) {
                Ok(payload) => self.sender.send("submit", Some(payload)),
                Err(_) => self.sender.send(
                    "error",
                    error_payload(&PvaultError::network("unserializable result")),
                ),
            },
            Err(error) => self.sender.send("error", error_payload(&error)),
        }
    }

    async fn handle_user_event(&mut self, event: UserEvent) {
        match event {
            UserEvent::Input { name, value } => {
                if let Some(state) = &mut self.state {
                    state.model.set_value(&name, &value);
                    self.document.replace_body(state.model.render());
                    self.report_content_size();
                }
            }
            UserEvent::PressSubmit => {
                let has_button = self
                    .state
                    .as_ref()
                    .is_some_and(|state| state.has_submit_button);
                if has_button {
                    self.submit().await;
                }
            }
            UserEvent::Inspect(reply) => {
                let _ = reply.send(self.document.clone());
            }
            // pointer events are meaningful for views only
            UserEvent::Click { .. }
            | UserEvent::PointerEnter { .. }
            | UserEvent::PointerLeave { .. } => {}
        }
    }

    fn report_content_size(&self) {
        let size = self.document.measure();
        let Ok(payload) = serde_json::to_value(size) else {
            return;
        };
        self.sender.send("content-size", Some(payload));
    }
}

struct ViewSession {
    self_port: Port,
    clients: ClientFactory,
    sender: Sender,
    logger: Logger,
    document: Document,
    state: Option<ViewState>,
}

struct ViewState {
    model: ViewModel,
    client: Arc<dyn VaultApi>,
    allow_updates: bool,
}

impl ViewSession {
    fn new(self_port: Port, clients: ClientFactory) -> Self {
        let logger = Logger::disabled("sandbox");
        ViewSession {
            self_port,
            clients,
            sender: Sender::unbound(logger),
            logger,
            document: Document::default(),
            state: None,
        }
    }

    async fn run(
        mut self,
        mut inbox: Inbox,
        mut user_rx: mpsc::UnboundedReceiver<UserEvent>,
    ) {
        loop {
            tokio::select! {
                biased;
                envelope = inbox.recv() => match envelope {
                    Some(envelope) => self.handle_envelope(envelope).await,
                    None => break,
                },
                event = user_rx.recv() => match event {
                    Some(event) => self.handle_user_event(event),
                    None => break,
                },
            }
        }
    }

    async fn handle_envelope(&mut self, envelope: Envelope) {
        let Some(source) = envelope.source else {
            self.logger.log("dropped message with null source");
            return;
        };

        if !view_inbound_schema().parse(&envelope.data) {
            self.sender
                .send("error", error_payload(&PvaultError::invalid_event()));
            return;
        }

        let Ok(event) = serde_json::from_value::<ViewHostEvent>(envelope.data) else {
            self.sender
                .send("error", error_payload(&PvaultError::invalid_event()));
            return;
        };

        match event {
            ViewHostEvent::Init(options) => self.init(source, options).await,
            ViewHostEvent::Update(options) => self.update(options).await,
            ViewHostEvent::Copy(request) => self.copy(&request),
            ViewHostEvent::ContainerSize(size) => self.document.size = size,
        }
    }

    async fn init(&mut self, source: Port, options: ViewOptions) {
        self.logger = Logger::new("sandbox", options.debug.unwrap_or(false));
        self.sender = Sender::bound(source, self.self_port.clone(), self.logger);
        self.logger.log("received \"init\" event");

        if self.state.is_some() {
            self.sender.send(
                "error",
                error_payload(&PvaultError::initialization("View already initialized")),
            );
            return;
        }

        let client = (self.clients)(&VaultConfig {
            vault_url: options.vault_url.clone(),
            api_key: options.api_key.clone(),
        });
        let mut state = ViewState {
            model: ViewModel::new(),
            client,
            allow_updates: options.dynamic.unwrap_or(false),
        };
        let rendered = state.model.render(&options, state.client.as_ref()).await;
        // a failed fetch still consumes the one init; a later `init` is
        // rejected, and only `update` (when dynamic) can fetch again
        self.state = Some(state);
        match rendered {
            Ok(body) => {
                self.document.replace_body(body);
                self.sender.send("ready", None);
                self.report_content_size();
            }
            Err(error) => {
                self.logger.log(&format!("render failed: {error}"));
                self.sender.send(
                    "error",
                    error_payload(&PvaultError::initialization(error.to_string())),
                );
            }
        }
    }

    async fn update(&mut self, options: ViewOptions) {
        let Some(state) = &mut self.state else {
            self.sender.send(
                "error",
                error_payload(&PvaultError::initialization("View not initialized")),
            );
            return;
        };
        if !state.allow_updates {
            self.sender.send(
                "error",
                error_payload(&PvaultError::update("Updates are not allowed")),
            );
            return;
        }

        state.client = (self.clients)(&VaultConfig {
            vault_url: options.vault_url.clone(),
            api_key: options.api_key.clone(),
        });
        // the flag follows the incoming options even when the fetch fails
        state.allow_updates = options.dynamic.unwrap_or(false);
        match state.model.render(&options, state.client.as_ref()).await {
            Ok(body) => {
                self.document.replace_body(body);
                self.report_content_size();
            }
            Err(error) => {
                self.logger.log(&format!("render failed: {error}"));
                self.sender.send(
                    "error",
                    error_payload(&PvaultError::update(error.to_string())),
                );
            }
        }
    }

    // The resolved value is written to the sandbox clipboard only; it never
    // crosses the channel back to the host.
    fn copy(&mut self, request: &CopyRequest) {
        if request.trusted_event_key.is_none() {
            self.sender.send(
                "error",
                error_payload(&PvaultError::update("Copy requires a trusted event")),
            );
            return;
        }
        let Some(state) = &self.state else {
            self.sender.send(
                "error",
                error_payload(&PvaultError::initialization("View not initialized")),
            );
            return;
        };
        match state.model.resolve(&request.path) {
            Ok(value) => {
                let text = match value {
                    serde_json::Value::String(text) => text,
                    other => other.to_string(),
                };
                self.document.clipboard = Some(text);
            }
            Err(error) => {
                self.sender.send(
                    "error",
                    error_payload(&PvaultError::update(error.to_string())),
                );
            }
        }
    }

    fn handle_user_event(&mut self, event: UserEvent) {
        match event {
            UserEvent::Click { path } => {
                self.sender.send("click", Some(json!({ "path": path })));
            }
            UserEvent::PointerEnter { path, x, y } => {
                self.sender
                    .send("mouseenter", Some(json!({ "path": path, "x": x, "y": y })));
            }
            UserEvent::PointerLeave { path } => {
                self.sender.send("mouseleave", Some(json!({ "path": path })));
            }
            UserEvent::Inspect(reply) => {
                let _ = reply.send(self.document.clone());
            }
            // form-only interactions
            UserEvent::Input { .. } | UserEvent::PressSubmit => {}
        }
    }

    fn report_content_size(&self) {
        let size = self.document.measure();
        let Ok(payload) = serde_json::to_value(size) else {
            return;
        };
        self.sender.send("content-size", Some(payload));
    }
}
