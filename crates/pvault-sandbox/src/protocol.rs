//! Per-direction wire schemas and typed message enums.
//!
//! Every inbound message is checked against the closed-world schema for its
//! direction before any part of the payload is read. Validation failures are
//! answered with a generic `invalid-event` error that never echoes the
//! rejected payload. Only after a message validates is it deserialized into
//! the typed enums below.

use std::collections::BTreeMap;

use pvault_schema::{
    any, array, boolean, literal, number, object, one_of, or, record, string, Validator,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::options::{FormOptions, Size, ViewOptions};
use crate::strategy::SubmitResult;

const STRATEGIES: [&str; 5] = [
    "tokenize-object",
    "tokenize-fields",
    "encrypt-object",
    "encrypt-fields",
    "store-object",
];

const REASONS: [&str; 10] = [
    "AppFunctionality",
    "Analytics",
    "Notifications",
    "Marketing",
    "ThirdPartyMarketing",
    "FraudPreventionSecurityAndCompliance",
    "AccountManagement",
    "Maintenance",
    "DataSubjectRequest",
    "Other",
];

const ERROR_KINDS: [&str; 6] = [
    "invalid-event",
    "initialization",
    "update",
    "validation",
    "vault",
    "network",
];

fn field_schema() -> Validator {
    object([
        ("name", string()),
        ("dataTypeName", string()),
        ("label", string().optional()),
        ("placeholder", string().optional()),
        ("required", boolean().optional()),
        ("value", string().optional()),
    ])
}

fn style_schema() -> Validator {
    let theme = string().enum_of(["none", "default", "floating-label"]);
    let variables = record(
        string().enum_of([
            "primary",
            "primaryDark",
            "background",
            "focusBackground",
            "placeholderColor",
            "borderColor",
        ]),
        string(),
    );
    object([
        ("theme", theme.optional()),
        ("variables", variables.optional()),
        ("css", string().optional()),
    ])
}

/// Schema for the form `init`/`update` payload.
pub fn form_options_schema() -> Validator {
    object([
        ("vaultURL", string()),
        ("apiKey", string()),
        ("debug", boolean().optional()),
        ("allowUpdates", boolean().optional()),
        ("strategy", string().enum_of(STRATEGIES).optional()),
        ("globalVaultIdentifiers", boolean().optional()),
        ("collection", string()),
        ("tenantId", string().optional()),
        ("reason", string().enum_of(REASONS).optional()),
        ("expiration", number().optional()),
        ("fields", array(field_schema())),
        ("submitButton", string().optional()),
        ("style", style_schema().optional()),
    ])
}

fn view_strategy_schema() -> Validator {
    one_of([
        object([
            ("type", literal("read-objects")),
            ("collection", string()),
            ("ids", array(string())),
            ("props", array(string())),
            ("transformationParam", string().optional()),
        ]),
        object([
            ("type", literal("invoke-action")),
            ("action", string()),
            ("input", any()),
        ]),
    ])
}

fn display_schema() -> Validator {
    array(object([
        ("label", string().optional()),
        ("path", string().optional()),
        ("format", string().optional()),
    ]))
}

/// Schema for the view `init`/`update` payload.
pub fn view_options_schema() -> Validator {
    object([
        ("vaultURL", string()),
        ("apiKey", string()),
        ("debug", boolean().optional()),
        ("dynamic", boolean().optional()),
        ("reason", string().enum_of(REASONS).optional()),
        ("strategy", view_strategy_schema()),
        ("display", display_schema().optional()),
        ("css", string().optional()),
    ])
}

fn size_schema() -> Validator {
    object([("width", number()), ("height", number())])
}

fn error_payload_schema() -> Validator {
    object([
        ("type", string().enum_of(ERROR_KINDS)),
        ("message", string()),
        ("context", record(string(), string()).optional()),
    ])
}

/// Host-to-sandbox event union for form sessions.
pub fn form_inbound_schema() -> Validator {
    one_of([
        object([("event", literal("init")), ("payload", form_options_schema())]),
        object([("event", literal("update")), ("payload", form_options_schema())]),
        object([("event", literal("submit"))]),
        object([("event", literal("container-size")), ("payload", size_schema())]),
    ])
}

/// Host-to-sandbox event union for view sessions.
pub fn view_inbound_schema() -> Validator {
    let copy_payload = object([
        ("path", string()),
        ("trustedEventKey", string().optional()),
    ]);
    one_of([
        object([("event", literal("init")), ("payload", view_options_schema())]),
        object([("event", literal("update")), ("payload", view_options_schema())]),
        object([("event", literal("container-size")), ("payload", size_schema())]),
        object([("event", literal("copy")), ("payload", copy_payload)]),
    ])
}

/// Sandbox-to-host event union for form sessions.
pub fn form_outbound_schema() -> Validator {
    let result = or(string(), record(string(), string()));
    one_of([
        object([("event", literal("ready"))]),
        object([("event", literal("error")), ("payload", error_payload_schema())]),
        object([("event", literal("submit")), ("payload", result)]),
        object([("event", literal("content-size")), ("payload", size_schema())]),
    ])
}

/// Sandbox-to-host event union for view sessions.
pub fn view_outbound_schema() -> Validator {
    let click_payload = object([("path", string())]);
    let enter_payload = object([("path", string()), ("x", number()), ("y", number())]);
    let leave_payload = object([("path", string())]);
    one_of([
        object([("event", literal("ready"))]),
        object([("event", literal("error")), ("payload", error_payload_schema())]),
        object([("event", literal("content-size")), ("payload", size_schema())]),
        object([("event", literal("click")), ("payload", click_payload)]),
        object([("event", literal("mouseenter")), ("payload", enter_payload)]),
        object([("event", literal("mouseleave")), ("payload", leave_payload)]),
    ])
}

/// A `copy` request payload: resolve `path` into the fetched result and put
/// the value on the sandbox-side clipboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyRequest {
    /// Path into the fetched result.
    pub path: String,
    /// Opaque key proving the request originated from a trusted user event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trusted_event_key: Option<String>,
}

/// Interaction payload attached to view `click`/`mouseenter`/`mouseleave`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// Display path of the node the interaction happened on.
    pub path: String,
    /// Pointer x coordinate; present on `mouseenter` only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    /// Pointer y coordinate; present on `mouseenter` only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
}

/// Typed host-to-sandbox form events, deserialized after schema validation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum FormHostEvent {
    /// Initialize the form.
    Init(FormOptions),
    /// Replace the form configuration.
    Update(FormOptions),
    /// Trigger a programmatic submit.
    Submit,
    /// Resize to the host container.
    ContainerSize(Size),
}

/// Typed host-to-sandbox view events.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum ViewHostEvent {
    /// Initialize the view.
    Init(ViewOptions),
    /// Replace the view configuration.
    Update(ViewOptions),
    /// Resize to the host container.
    ContainerSize(Size),
    /// Copy a resolved value to the sandbox clipboard.
    Copy(CopyRequest),
}

/// Typed sandbox-to-host form events, deserialized by the host after schema
/// validation. The error payload stays a raw value and is lifted with
/// [`pvault_error::PvaultError::from_payload`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum FormSandboxEvent {
    /// The form rendered and accepts operations.
    Ready,
    /// A protocol or runtime failure.
    Error(Value),
    /// Submission finished with derived identifiers.
    Submit(SubmitResult),
    /// The rendered content changed size.
    ContentSize(Size),
}

/// Typed sandbox-to-host view events.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum ViewSandboxEvent {
    /// The view rendered and accepts operations.
    Ready,
    /// A protocol or runtime failure.
    Error(Value),
    /// The rendered content changed size.
    ContentSize(Size),
    /// A display value was clicked.
    Click(Interaction),
    /// The pointer entered a display value.
    Mouseenter(Interaction),
    /// The pointer left a display value.
    Mouseleave(Interaction),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn form_init(payload: Value) -> Value {
        json!({"event": "init", "payload": payload})
    }

    fn minimal_form_options() -> Value {
        json!({
            "vaultURL": "http://localhost:8123",
            "apiKey": "pvaultauth",
            "collection": "credit_cards",
            "fields": [{"name": "card_number", "dataTypeName": "CC_NUMBER"}],
        })
    }

    #[test]
    fn form_inbound_accepts_minimal_init() {
        assert!(form_inbound_schema().parse(&form_init(minimal_form_options())));
    }

    #[test]
    fn form_inbound_rejects_unknown_payload_key() {
        let mut options = minimal_form_options();
        options["__proto__"] = json!({"polluted": true});
        assert!(!form_inbound_schema().parse(&form_init(options)));
    }

    #[test]
    fn form_inbound_rejects_unknown_event() {
        assert!(!form_inbound_schema().parse(&json!({"event": "eval"})));
    }

    #[test]
    fn submit_event_carries_no_payload() {
        let schema = form_inbound_schema();
        assert!(schema.parse(&json!({"event": "submit"})));
        assert!(!schema.parse(&json!({"event": "submit", "payload": {}})));
    }

    #[test]
    fn view_inbound_accepts_both_strategies() {
        let schema = view_inbound_schema();
        let read = json!({
            "event": "init",
            "payload": {
                "vaultURL": "http://localhost:8123",
                "apiKey": "pvaultauth",
                "strategy": {
                    "type": "read-objects",
                    "collection": "users",
                    "ids": ["a"],
                    "props": ["name"],
                },
            },
        });
        assert!(schema.parse(&read));

        let invoke = json!({
            "event": "init",
            "payload": {
                "vaultURL": "http://localhost:8123",
                "apiKey": "pvaultauth",
                "strategy": {"type": "invoke-action", "action": "mask", "input": [1, 2]},
            },
        });
        assert!(schema.parse(&invoke));
    }

    #[test]
    fn view_inbound_rejects_unknown_strategy_type() {
        let bad = json!({
            "event": "init",
            "payload": {
                "vaultURL": "http://localhost:8123",
                "apiKey": "pvaultauth",
                "strategy": {"type": "delete-objects", "collection": "users"},
            },
        });
        assert!(!view_inbound_schema().parse(&bad));
    }

    #[test]
    fn outbound_accepts_both_result_shapes() {
        let schema = form_outbound_schema();
        assert!(schema.parse(&json!({"event": "submit", "payload": "pvlt:read_object:c::id:"})));
        assert!(schema.parse(&json!({"event": "submit", "payload": {"ssn": "token"}})));
        assert!(!schema.parse(&json!({"event": "submit", "payload": 7})));
    }

    #[test]
    fn outbound_error_requires_known_kind() {
        let schema = form_outbound_schema();
        assert!(schema.parse(&json!({
            "event": "error",
            "payload": {"type": "vault", "message": "boom"},
        })));
        assert!(!schema.parse(&json!({
            "event": "error",
            "payload": {"type": "panic", "message": "boom"},
        })));
    }

    #[test]
    fn typed_events_deserialize_after_validation() {
        let raw = form_init(minimal_form_options());
        assert!(form_inbound_schema().parse(&raw));
        let event: FormHostEvent = serde_json::from_value(raw).unwrap();
        match event {
            FormHostEvent::Init(options) => assert_eq!(options.collection, "credit_cards"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn style_variables_keys_are_closed() {
        let mut options = minimal_form_options();
        options["style"] = json!({"variables": {"primary": "#333"}});
        assert!(form_inbound_schema().parse(&form_init(options.clone())));
        options["style"] = json!({"variables": {"evil": "#333"}});
        assert!(!form_inbound_schema().parse(&form_init(options)));
    }
}
