#![warn(missing_docs)]

//! # pvault-host
//!
//! Host-side controllers for protected PII forms and views.
//!
//! The host page never holds sensitive values. A controller validates its
//! options locally, spawns a sandbox frame, sends `init`, and exposes a
//! handle whose every operation first awaits the single readiness gate. The
//! gate resolves on the first `ready` and rejects on the first pre-ready
//! `error`; errors after `ready` go to the registered error hook instead.
//!
//! Inbound sandbox messages are structurally validated before dispatch, the
//! same closed-world discipline the sandbox applies in the other direction.

mod form;
mod hooks;
mod ready;
mod view;

pub use form::{create_protected_form, ProtectedForm};
pub use hooks::{ErrorHook, FormHooks, InteractionHook, SubmitHook, ViewHooks};
pub use view::{create_protected_view, ProtectedView};
