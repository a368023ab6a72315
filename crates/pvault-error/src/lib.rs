#![warn(missing_docs)]

//! # pvault-error
//!
//! The protocol error taxonomy shared by both sides of the sandbox channel.
//!
//! Every `error` event on the wire carries a [`PvaultError`]: a kind tag, a
//! message, and optionally per-field context (used by validation errors).
//! Whether an error rejects the controller's readiness future or reaches the
//! error hook is decided by its *timing* relative to `ready`, not by its kind.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// The closed set of protocol error kinds.
///
/// All kinds are recoverable in the sense that the reporting side's state is
/// unchanged; `vault` and `network` are additionally terminal for the remote
/// call that produced them (the runtime never retries on its own).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum ErrorKind {
    /// An inbound message failed structural validation and was dropped.
    InvalidEvent,
    /// State-machine misuse: double init, operate before ready, submit
    /// before init.
    Initialization,
    /// An `update` was sent to a session that does not allow updates.
    Update,
    /// Field-level input validation failed at submit time; no remote call
    /// was made.
    Validation,
    /// The remote vault API returned an error body, surfaced verbatim.
    Vault,
    /// A transport-level failure reaching the remote vault API.
    Network,
}

impl ErrorKind {
    /// The wire tag for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidEvent => "invalid-event",
            Self::Initialization => "initialization",
            Self::Update => "update",
            Self::Validation => "validation",
            Self::Vault => "vault",
            Self::Network => "network",
        }
    }

    /// Parse a wire tag back into a kind.
    pub fn from_wire(tag: &str) -> Option<Self> {
        match tag {
            "invalid-event" => Some(Self::InvalidEvent),
            "initialization" => Some(Self::Initialization),
            "update" => Some(Self::Update),
            "validation" => Some(Self::Validation),
            "vault" => Some(Self::Vault),
            "network" => Some(Self::Network),
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A protocol error as it crosses the channel and as it surfaces to callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct PvaultError {
    /// The error kind tag.
    pub kind: ErrorKind,
    /// Human-readable message. Never echoes rejected payloads.
    pub message: String,
    /// Optional per-field context, e.g. validation messages keyed by field
    /// name.
    pub context: Option<BTreeMap<String, String>>,
}

impl PvaultError {
    /// A generic structural-validation rejection.
    ///
    /// Deliberately not descriptive: the rejected payload is attacker
    /// controlled and must not be reflected back into logs or UI.
    pub fn invalid_event() -> Self {
        Self::new(ErrorKind::InvalidEvent, "Invalid event data.")
    }

    /// A state-machine misuse error.
    pub fn initialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Initialization, message)
    }

    /// A disallowed-update error.
    pub fn update(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Update, message)
    }

    /// A field-validation error with per-field messages.
    pub fn validation(
        message: impl Into<String>,
        context: BTreeMap<String, String>,
    ) -> Self {
        Self {
            kind: ErrorKind::Validation,
            message: message.into(),
            context: Some(context),
        }
    }

    /// A vault API error, message taken verbatim from the error body.
    pub fn vault(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Vault, message)
    }

    /// A transport-level failure reaching the vault.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: None,
        }
    }

    /// Serialize into an `error` event payload.
    pub fn to_payload(&self) -> Value {
        let mut payload = serde_json::Map::new();
        payload.insert("type".into(), Value::String(self.kind.as_str().into()));
        payload.insert("message".into(), Value::String(self.message.clone()));
        if let Some(context) = &self.context {
            payload.insert(
                "context".into(),
                Value::Object(
                    context
                        .iter()
                        .map(|(key, message)| (key.clone(), Value::String(message.clone())))
                        .collect(),
                ),
            );
        }
        Value::Object(payload)
    }

    /// Rebuild from a structurally validated `error` event payload.
    ///
    /// Returns `None` when the payload shape or kind tag is unrecognized;
    /// callers treat that as a structurally invalid message.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let map = payload.as_object()?;
        let kind = ErrorKind::from_wire(map.get("type")?.as_str()?)?;
        let message = map.get("message")?.as_str()?.to_owned();
        let context = match map.get("context") {
            None => None,
            Some(Value::Object(entries)) => Some(
                entries
                    .iter()
                    .map(|(key, message)| Some((key.clone(), message.as_str()?.to_owned())))
                    .collect::<Option<BTreeMap<_, _>>>()?,
            ),
            Some(_) => return None,
        };
        Some(Self {
            kind,
            message,
            context,
        })
    }
}

// Compile-time assertion: PvaultError must be Send + Sync + 'static
const _: fn() = || {
    fn assert_bounds<T: Send + Sync + 'static>() {}
    assert_bounds::<PvaultError>();
};
