#![warn(missing_docs)]

//! # pvault-sandbox
//!
//! Sandbox-side runtime for protected PII collection and display.
//!
//! A sandbox is an isolated document that alone holds sensitive field values.
//! The host page talks to it only over an asynchronous message channel, and
//! only ever receives derived identifiers (tokens, ciphertexts, object ids)
//! or pre-sanitized display fragments back — never the raw values.
//!
//! ## Security model
//!
//! - **Validate before trust**: every inbound message is structurally
//!   validated against a closed per-direction schema before any field of its
//!   payload is read. Unknown keys reject the whole message.
//! - **Source binding**: replies go to the reply port of the `init` message
//!   that started the session, never to a statically-known peer, so a spoofed
//!   message from another context cannot hijack the reply channel.
//! - **Null-source drop**: messages without a reply port (the shape produced
//!   by browser-extension spoofing) are silently dropped, whatever their
//!   event type.
//! - **Single whitelisted egress**: collected values leave the sandbox only
//!   through the submission strategy, as vault-derived identifiers.

pub mod channel;
pub mod component;
pub mod form;
pub mod logger;
pub mod options;
pub mod protocol;
pub mod session;
pub mod strategy;
pub mod ui;
pub mod validations;
pub mod view;

pub use channel::{Envelope, Inbox, Port, Sender};
pub use options::{Field, FormOptions, Size, Strategy, Style, ViewOptions, ViewStrategy};
pub use session::{spawn_form_frame, spawn_view_frame, ClientFactory, Frame, UserEvent, UserHandle};
pub use strategy::{apply_strategy, SubmitRequest, SubmitResult};
