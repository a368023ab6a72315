//! Caller-registered callbacks.
//!
//! Hooks stay on the host side; they are never serialized into the `init`
//! payload and never cross the channel.

use std::sync::Arc;

use pvault_error::PvaultError;
use pvault_sandbox::protocol::Interaction;
use pvault_sandbox::SubmitResult;

/// Called with every successful submission result.
pub type SubmitHook = Arc<dyn Fn(&SubmitResult) + Send + Sync>;

/// Called with every error that arrives after `ready`.
pub type ErrorHook = Arc<dyn Fn(&PvaultError) + Send + Sync>;

/// Called with view interaction payloads.
pub type InteractionHook = Arc<dyn Fn(&Interaction) + Send + Sync>;

/// Hooks for a protected form.
#[derive(Clone, Default)]
pub struct FormHooks {
    /// Successful submission.
    pub on_submit: Option<SubmitHook>,
    /// Post-ready error.
    pub on_error: Option<ErrorHook>,
}

/// Hooks for a protected view.
#[derive(Clone, Default)]
pub struct ViewHooks {
    /// Post-ready error.
    pub on_error: Option<ErrorHook>,
    /// A display value was clicked.
    pub on_click: Option<InteractionHook>,
    /// The pointer entered a display value.
    pub on_mouseenter: Option<InteractionHook>,
    /// The pointer left a display value.
    pub on_mouseleave: Option<InteractionHook>,
}
