//! Typed configuration crossing the channel in `init`/`update` payloads.
//!
//! These structs are deserialized only *after* the raw value passed the
//! structural schemas in [`crate::protocol`]; on the host side they are the
//! public options surface and serialize into the wire payloads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The submission strategy: what transformation is applied to collected
/// fields before identifiers are returned to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Tokenize the entire object and return a single token.
    TokenizeObject,
    /// Tokenize each field independently and return a token per field.
    TokenizeFields,
    /// Encrypt the entire object and return a single ciphertext.
    EncryptObject,
    /// Encrypt each field independently and return a ciphertext per field.
    EncryptFields,
    /// Store the entire object and return an object id.
    StoreObject,
}

impl Strategy {
    /// The wire tag for this strategy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TokenizeObject => "tokenize-object",
            Self::TokenizeFields => "tokenize-fields",
            Self::EncryptObject => "encrypt-object",
            Self::EncryptFields => "encrypt-fields",
            Self::StoreObject => "store-object",
        }
    }
}

/// Audit reason attached to every vault call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reason {
    /// Default reason.
    AppFunctionality,
    /// Analytics use.
    Analytics,
    /// Notification delivery.
    Notifications,
    /// First-party marketing.
    Marketing,
    /// Third-party marketing.
    ThirdPartyMarketing,
    /// Fraud prevention, security and compliance.
    FraudPreventionSecurityAndCompliance,
    /// Account management.
    AccountManagement,
    /// Maintenance.
    Maintenance,
    /// Data subject request.
    DataSubjectRequest,
    /// Anything else.
    Other,
}

impl Reason {
    /// The wire tag for this reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppFunctionality => "AppFunctionality",
            Self::Analytics => "Analytics",
            Self::Notifications => "Notifications",
            Self::Marketing => "Marketing",
            Self::ThirdPartyMarketing => "ThirdPartyMarketing",
            Self::FraudPreventionSecurityAndCompliance => {
                "FraudPreventionSecurityAndCompliance"
            }
            Self::AccountManagement => "AccountManagement",
            Self::Maintenance => "Maintenance",
            Self::DataSubjectRequest => "DataSubjectRequest",
            Self::Other => "Other",
        }
    }
}

/// Declarative description of one collected input.
///
/// Descriptors are pure configuration: they own no UI state. Widgets are
/// derived from them and replaced (with explicit unmount) when a descriptor
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// Field name as defined in the vault collection.
    pub name: String,
    /// Data type name as defined in the vault collection; selects the
    /// validation rule.
    pub data_type_name: String,
    /// Label to display for the field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Placeholder to display for the field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Whether the field is required.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    /// Initial value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Visual theme name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Theme {
    /// No styling.
    None,
    /// Default styling.
    Default,
    /// Floating-label styling.
    FloatingLabel,
}

impl Theme {
    /// The wire tag for this theme, also used as the theme class.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Default => "default",
            Self::FloatingLabel => "floating-label",
        }
    }
}

/// Style options. Carried as data and applied to the rendered tree only;
/// style changes never trigger remote calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Style {
    /// Theme to apply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    /// CSS variable overrides (closed key set, validated on the wire).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<BTreeMap<String, String>>,
    /// Custom CSS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
}

/// Options for a protected form session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormOptions {
    /// URL of the vault to connect to.
    #[serde(rename = "vaultURL")]
    pub vault_url: String,
    /// API key used to connect to the vault.
    pub api_key: String,
    /// Print debug traces. Never prints sensitive information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
    /// Whether `update` events are accepted after initialization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_updates: Option<bool>,
    /// Submission strategy; defaults to `tokenize-fields`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    /// Whether returned identifiers are wrapped as self-describing
    /// `pvlt:` references. Defaults to true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_vault_identifiers: Option<bool>,
    /// Vault collection name.
    pub collection: String,
    /// Tenant scoping for vault calls (best-effort metadata).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Audit reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
    /// Expiration in seconds for the derived token/object/ciphertext.
    /// Negative means no expiration; absent uses the vault default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration: Option<f64>,
    /// The fields to render.
    pub fields: Vec<Field>,
    /// Label for a rendered submit button; absent means programmatic
    /// submission only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit_button: Option<String>,
    /// Style options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<Style>,
}

/// What a protected view fetches from the vault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ViewStrategy {
    /// Read whole objects by id and display the requested props.
    #[serde(rename_all = "camelCase")]
    ReadObjects {
        /// Vault collection name.
        collection: String,
        /// Object ids to fetch (at most 10, UUID formatted).
        ids: Vec<String>,
        /// Props to fetch and display, in display order.
        props: Vec<String>,
        /// Extra transformation parameter forwarded to the vault.
        #[serde(skip_serializing_if = "Option::is_none")]
        transformation_param: Option<String>,
    },
    /// Invoke a named vault action and display its response.
    InvokeAction {
        /// Action name.
        action: String,
        /// JSON input forwarded opaquely to the action.
        input: Value,
    },
}

/// Declarative description of one projected display value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayField {
    /// Label to render next to the value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Path into the fetched result (see `pvault-path`); absent shows the
    /// whole result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Display template; `{}` is replaced with the resolved value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Options for a protected view session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewOptions {
    /// URL of the vault to connect to.
    #[serde(rename = "vaultURL")]
    pub vault_url: String,
    /// API key used to connect to the vault.
    pub api_key: String,
    /// Print debug traces. Never prints sensitive information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
    /// Whether the view may re-render after initialization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic: Option<bool>,
    /// Audit reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
    /// What to fetch and display.
    pub strategy: ViewStrategy,
    /// Projected display values; absent renders every fetched prop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<Vec<DisplayField>>,
    /// Custom CSS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
}

/// A width/height pair, exchanged by the `container-size` and
/// `content-size` events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn form_options_wire_names() {
        let options = FormOptions {
            vault_url: "http://localhost:8123".into(),
            api_key: "pvaultauth".into(),
            debug: None,
            allow_updates: Some(true),
            strategy: Some(Strategy::StoreObject),
            global_vault_identifiers: None,
            collection: "credit_cards".into(),
            tenant_id: Some("tenant-1".into()),
            reason: Some(Reason::AppFunctionality),
            expiration: None,
            fields: vec![Field {
                name: "card_number".into(),
                data_type_name: "CC_NUMBER".into(),
                label: Some("Card number".into()),
                placeholder: None,
                required: Some(true),
                value: None,
            }],
            submit_button: None,
            style: None,
        };
        let wire = serde_json::to_value(&options).unwrap();
        assert_eq!(wire["vaultURL"], "http://localhost:8123");
        assert_eq!(wire["apiKey"], "pvaultauth");
        assert_eq!(wire["allowUpdates"], true);
        assert_eq!(wire["strategy"], "store-object");
        assert_eq!(wire["tenantId"], "tenant-1");
        assert_eq!(wire["reason"], "AppFunctionality");
        assert_eq!(wire["fields"][0]["dataTypeName"], "CC_NUMBER");
        assert!(wire.get("debug").is_none());
    }

    #[test]
    fn view_strategy_wire_tags() {
        let read = ViewStrategy::ReadObjects {
            collection: "users".into(),
            ids: vec!["id".into()],
            props: vec!["name".into()],
            transformation_param: None,
        };
        assert_eq!(serde_json::to_value(&read).unwrap()["type"], "read-objects");

        let invoke = ViewStrategy::InvokeAction {
            action: "mask".into(),
            input: json!({"value": 1}),
        };
        let wire = serde_json::to_value(&invoke).unwrap();
        assert_eq!(wire["type"], "invoke-action");
        assert_eq!(wire["input"]["value"], 1);
    }

    #[test]
    fn strategy_tags_match_as_str() {
        for strategy in [
            Strategy::TokenizeObject,
            Strategy::TokenizeFields,
            Strategy::EncryptObject,
            Strategy::EncryptFields,
            Strategy::StoreObject,
        ] {
            assert_eq!(
                serde_json::to_value(strategy).unwrap(),
                json!(strategy.as_str())
            );
        }
    }
}
