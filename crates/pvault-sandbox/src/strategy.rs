//! Strategy dispatcher: turns collected field values into derived vault
//! identifiers.
//!
//! The strategy is selected by exact string match with `tokenize-fields` as
//! the default. Remote failures propagate unmodified; there is no fallback
//! strategy and no retry.

use std::collections::BTreeMap;

use pvault_client::{
    AddObjectRequest, EncryptObjectRequest, EncryptRequest, ObjectFields,
    TokenizeObjectRequest, TokenizeRequest, VaultApi, VaultError,
};
use pvault_error::PvaultError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::options::{FormOptions, Reason};

/// A strategy dispatch failure.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// The requested strategy is not in the dispatch table.
    #[error("unknown strategy \"{0}\"")]
    UnknownStrategy(String),
    /// The vault call failed.
    #[error(transparent)]
    Vault(#[from] VaultError),
}

impl From<StrategyError> for PvaultError {
    fn from(error: StrategyError) -> Self {
        match error {
            StrategyError::UnknownStrategy(_) => PvaultError::initialization(error.to_string()),
            StrategyError::Vault(vault_error) => vault_error.into(),
        }
    }
}

/// The submission parameters, extracted from the form configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    /// Strategy tag; `None` means `tokenize-fields`.
    pub strategy: Option<String>,
    /// Vault collection name.
    pub collection: String,
    /// Tenant scoping for the call.
    pub tenant_id: Option<String>,
    /// Wrap derived ids as `pvlt:` references; `None` means true.
    pub global_vault_identifiers: Option<bool>,
    /// Audit reason; `None` means `AppFunctionality`.
    pub reason: Option<Reason>,
    /// Expiration in seconds; negative means no expiration.
    pub expiration: Option<f64>,
}

impl SubmitRequest {
    /// Extracts the submission parameters from form options.
    pub fn from_options(options: &FormOptions) -> Self {
        SubmitRequest {
            strategy: options.strategy.map(|strategy| strategy.as_str().to_owned()),
            collection: options.collection.clone(),
            tenant_id: options.tenant_id.clone(),
            global_vault_identifiers: options.global_vault_identifiers,
            reason: options.reason,
            expiration: options.expiration,
        }
    }

    fn reason(&self) -> &'static str {
        self.reason.unwrap_or(Reason::AppFunctionality).as_str()
    }

    fn wrap(&self, operation: &str, id: &str, property: Option<&str>) -> String {
        if self.global_vault_identifiers.unwrap_or(true) {
            format!(
                "pvlt:{operation}:{collection}:{property}:{id}:",
                collection = self.collection,
                property = property.unwrap_or("")
            )
        } else {
            id.to_owned()
        }
    }
}

/// The outcome of a submission: a single identifier for the whole-object
/// strategies, or one identifier per field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubmitResult {
    /// One identifier covering the whole object.
    Object(String),
    /// One identifier per submitted field.
    Fields(BTreeMap<String, String>),
}

/// Dispatches the collected values to the vault according to the request's
/// strategy and returns the derived identifiers.
pub async fn apply_strategy(
    values: &BTreeMap<String, String>,
    request: &SubmitRequest,
    client: &dyn VaultApi,
) -> Result<SubmitResult, StrategyError> {
    match request.strategy.as_deref().unwrap_or("tokenize-fields") {
        "store-object" => store_object(values, request, client).await,
        "tokenize-object" => tokenize_object(values, request, client).await,
        "tokenize-fields" => tokenize_fields(values, request, client).await,
        "encrypt-object" => encrypt_object(values, request, client).await,
        "encrypt-fields" => encrypt_fields(values, request, client).await,
        other => Err(StrategyError::UnknownStrategy(other.to_owned())),
    }
}

fn as_fields(values: &BTreeMap<String, String>) -> ObjectFields {
    values
        .iter()
        .map(|(name, value)| (name.clone(), Value::String(value.clone())))
        .collect()
}

fn as_expiration_secs(expiration: Option<f64>) -> Option<String> {
    expiration.map(|secs| {
        if secs < 0.0 {
            String::new()
        } else {
            format_secs(secs)
        }
    })
}

// The wire format carries expiration as a decimal string; whole-number
// values must not pick up a trailing ".0".
fn format_secs(secs: f64) -> String {
    if secs.fract() == 0.0 {
        format!("{}", secs as i64)
    } else {
        format!("{secs}")
    }
}

async fn store_object(
    values: &BTreeMap<String, String>,
    request: &SubmitRequest,
    client: &dyn VaultApi,
) -> Result<SubmitResult, StrategyError> {
    let id = client
        .add_object(AddObjectRequest {
            collection: request.collection.clone(),
            reason: request.reason().to_owned(),
            fields: as_fields(values),
            tenant_id: request.tenant_id.clone(),
            expiration_secs: as_expiration_secs(request.expiration),
        })
        .await?;

    Ok(SubmitResult::Object(request.wrap("read_object", &id, None)))
}

async fn tokenize_object(
    values: &BTreeMap<String, String>,
    request: &SubmitRequest,
    client: &dyn VaultApi,
) -> Result<SubmitResult, StrategyError> {
    let tokens = client
        .tokenize(TokenizeRequest {
            collection: request.collection.clone(),
            reason: request.reason().to_owned(),
            requests: vec![TokenizeObjectRequest {
                fields: as_fields(values),
                token_type: "pci".to_owned(),
                props: values.keys().cloned().collect(),
            }],
            tenant_id: request.tenant_id.clone(),
            expiration_secs: as_expiration_secs(request.expiration),
        })
        .await?;

    let token = tokens
        .first()
        .ok_or_else(|| VaultError::Network("empty tokenize response".to_owned()))?;
    Ok(SubmitResult::Object(request.wrap(
        "detokenize",
        &token.token_id,
        None,
    )))
}

async fn tokenize_fields(
    values: &BTreeMap<String, String>,
    request: &SubmitRequest,
    client: &dyn VaultApi,
) -> Result<SubmitResult, StrategyError> {
    let names: Vec<&String> = values.keys().collect();
    let tokens = client
        .tokenize(TokenizeRequest {
            collection: request.collection.clone(),
            reason: request.reason().to_owned(),
            requests: values
                .iter()
                .map(|(name, value)| TokenizeObjectRequest {
                    fields: ObjectFields::from([(name.clone(), Value::String(value.clone()))]),
                    token_type: "pci".to_owned(),
                    props: vec![name.clone()],
                })
                .collect(),
            tenant_id: request.tenant_id.clone(),
            expiration_secs: as_expiration_secs(request.expiration),
        })
        .await?;

    if tokens.len() != names.len() {
        return Err(VaultError::Network("short tokenize response".to_owned()).into());
    }
    Ok(SubmitResult::Fields(
        names
            .iter()
            .zip(&tokens)
            .map(|(name, token)| {
                let id = request.wrap("detokenize", &token.token_id, Some(name));
                ((*name).clone(), id)
            })
            .collect(),
    ))
}

async fn encrypt_object(
    values: &BTreeMap<String, String>,
    request: &SubmitRequest,
    client: &dyn VaultApi,
) -> Result<SubmitResult, StrategyError> {
    let mut fields = as_fields(values);
    if let Some(tenant_id) = &request.tenant_id {
        fields.insert("_tenant_id".to_owned(), Value::String(tenant_id.clone()));
    }
    let encrypted = client
        .encrypt(EncryptRequest {
            collection: request.collection.clone(),
            reason: request.reason().to_owned(),
            requests: vec![EncryptObjectRequest {
                fields,
                props: None,
            }],
            expiration_secs: as_expiration_secs(request.expiration),
        })
        .await?;

    let value = encrypted
        .first()
        .ok_or_else(|| VaultError::Network("empty encrypt response".to_owned()))?;
    Ok(SubmitResult::Object(request.wrap(
        "decrypt_object",
        &value.ciphertext,
        None,
    )))
}

async fn encrypt_fields(
    values: &BTreeMap<String, String>,
    request: &SubmitRequest,
    client: &dyn VaultApi,
) -> Result<SubmitResult, StrategyError> {
    let names: Vec<&String> = values.keys().collect();
    let encrypted = client
        .encrypt(EncryptRequest {
            collection: request.collection.clone(),
            reason: request.reason().to_owned(),
            requests: values
                .iter()
                .map(|(name, value)| {
                    let mut fields =
                        ObjectFields::from([(name.clone(), Value::String(value.clone()))]);
                    if let Some(tenant_id) = &request.tenant_id {
                        fields.insert(
                            "_tenant_id".to_owned(),
                            Value::String(tenant_id.clone()),
                        );
                    }
                    EncryptObjectRequest {
                        fields,
                        props: Some(vec![name.clone()]),
                    }
                })
                .collect(),
            expiration_secs: as_expiration_secs(request.expiration),
        })
        .await?;

    if encrypted.len() != names.len() {
        return Err(VaultError::Network("short encrypt response".to_owned()).into());
    }
    Ok(SubmitResult::Fields(
        names
            .iter()
            .zip(&encrypted)
            .map(|(name, value)| {
                let id = request.wrap("decrypt_object", &value.ciphertext, Some(name));
                ((*name).clone(), id)
            })
            .collect(),
    ))
}
