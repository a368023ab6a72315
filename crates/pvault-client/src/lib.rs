#![warn(missing_docs)]

//! # pvault-client
//!
//! Typed request/response client for the remote vault API.
//!
//! The sandbox runtime talks to the vault only through the [`VaultApi`]
//! trait: create-object, tokenize, encrypt, decrypt, list-objects-by-id and
//! invoke-action. [`HttpVaultClient`] is the production implementation
//! (JSON over HTTP); [`MemoryVault`] is an in-process implementation for
//! tests and local development.
//!
//! The client performs no retries and no fallback of any kind: a vault error
//! body or a transport failure propagates unmodified to the caller.

pub mod http;
pub mod memory;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use http::HttpVaultClient;
pub use memory::MemoryVault;

/// Connection settings for a vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    /// Base URL of the vault server.
    pub vault_url: String,
    /// API key sent as a bearer token.
    pub api_key: String,
}

/// Errors from vault operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum VaultError {
    /// The vault returned an error body. The message is surfaced verbatim.
    #[error("vault error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message from the vault's error body.
        message: String,
    },

    /// A transport-level failure reaching the vault.
    #[error("network error: {0}")]
    Network(String),
}

impl From<VaultError> for pvault_error::PvaultError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::Api { message, .. } => pvault_error::PvaultError::vault(message),
            VaultError::Network(message) => pvault_error::PvaultError::network(message),
        }
    }
}

/// The fields of one vault object, keyed by property name.
pub type ObjectFields = BTreeMap<String, Value>;

/// Request to create one object from a set of fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddObjectRequest {
    /// Target collection.
    pub collection: String,
    /// Audit reason.
    pub reason: String,
    /// The object fields.
    pub fields: ObjectFields,
    /// Optional tenant scoping (best-effort metadata).
    pub tenant_id: Option<String>,
    /// Expiration in seconds as a decimal string; empty string means never.
    pub expiration_secs: Option<String>,
}

/// One tokenization unit: a set of fields tokenized together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizeObjectRequest {
    /// The fields to tokenize as one unit.
    pub fields: ObjectFields,
    /// Token type, e.g. `pci`.
    #[serde(rename = "type")]
    pub token_type: String,
    /// The properties covered by the token.
    pub props: Vec<String>,
}

/// Request to tokenize one or more units in a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizeRequest {
    /// Target collection.
    pub collection: String,
    /// Audit reason.
    pub reason: String,
    /// The units to tokenize, one response entry per unit.
    pub requests: Vec<TokenizeObjectRequest>,
    /// Optional tenant scoping.
    pub tenant_id: Option<String>,
    /// Expiration in seconds as a decimal string; empty string means never.
    pub expiration_secs: Option<String>,
}

/// One tokenization result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizedValue {
    /// The opaque token id.
    pub token_id: String,
}

/// One encryption unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptObjectRequest {
    /// The fields to encrypt as one ciphertext.
    pub fields: ObjectFields,
    /// The properties covered, when encrypting a single property.
    pub props: Option<Vec<String>>,
}

/// Request to encrypt one or more units in a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptRequest {
    /// Target collection.
    pub collection: String,
    /// Audit reason.
    pub reason: String,
    /// The units to encrypt, one response entry per unit.
    pub requests: Vec<EncryptObjectRequest>,
    /// Expiration in seconds as a decimal string; empty string means never.
    pub expiration_secs: Option<String>,
}

/// One encryption result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedValue {
    /// The opaque ciphertext.
    pub ciphertext: String,
}

/// Request to decrypt one or more ciphertexts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecryptRequest {
    /// Target collection.
    pub collection: String,
    /// Audit reason.
    pub reason: String,
    /// The ciphertexts to decrypt.
    pub ciphertexts: Vec<String>,
}

/// Request to read objects by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListObjectsRequest {
    /// Target collection.
    pub collection: String,
    /// Audit reason.
    pub reason: String,
    /// Object ids to fetch (UUID-v4 formatted strings).
    pub ids: Vec<String>,
    /// The properties to fetch for each object.
    pub props: Vec<String>,
    /// Extra transformation parameter forwarded to the vault.
    pub transformation_param: Option<String>,
}

/// Request to invoke a named vault action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeActionRequest {
    /// The action name.
    pub action: String,
    /// Audit reason.
    pub reason: String,
    /// JSON input passed to the action.
    pub input: Value,
}

/// Typed vault operations used by the sandbox runtime.
///
/// Contract: synchronous-per-call success/failure, JSON bodies, object ids
/// are UUID-v4 formatted strings.
#[async_trait::async_trait]
pub trait VaultApi: Send + Sync {
    /// Create one object from a set of fields and return its id.
    async fn add_object(&self, request: AddObjectRequest) -> Result<String, VaultError>;

    /// Tokenize one or more units; one result per request unit, in order.
    async fn tokenize(
        &self,
        request: TokenizeRequest,
    ) -> Result<Vec<TokenizedValue>, VaultError>;

    /// Encrypt one or more units; one result per request unit, in order.
    async fn encrypt(&self, request: EncryptRequest) -> Result<Vec<EncryptedValue>, VaultError>;

    /// Decrypt ciphertexts back into field sets, in order.
    async fn decrypt(&self, request: DecryptRequest) -> Result<Vec<ObjectFields>, VaultError>;

    /// Read objects by id, returning the requested properties.
    async fn list_objects(
        &self,
        request: ListObjectsRequest,
    ) -> Result<Vec<ObjectFields>, VaultError>;

    /// Invoke a named action with a JSON input.
    async fn invoke_action(&self, request: InvokeActionRequest) -> Result<Value, VaultError>;
}
