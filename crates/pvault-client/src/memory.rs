//! In-memory implementation of [`VaultApi`] for tests and local development.
//!
//! Keeps objects, tokens and ciphertexts in process memory and counts calls
//! per operation so tests can assert exactly how many remote round-trips a
//! flow produced.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde_json::Value;
use uuid::Uuid;

use crate::{
    AddObjectRequest, DecryptRequest, EncryptRequest, EncryptedValue, InvokeActionRequest,
    ListObjectsRequest, ObjectFields, TokenizeRequest, TokenizedValue, VaultApi, VaultError,
};

/// Per-operation call counters.
#[derive(Debug, Default)]
pub struct CallCounters {
    /// Calls to `add_object`.
    pub add_object: AtomicU64,
    /// Calls to `tokenize`.
    pub tokenize: AtomicU64,
    /// Calls to `encrypt`.
    pub encrypt: AtomicU64,
    /// Calls to `decrypt`.
    pub decrypt: AtomicU64,
    /// Calls to `list_objects`.
    pub list_objects: AtomicU64,
    /// Calls to `invoke_action`.
    pub invoke_action: AtomicU64,
}

#[derive(Default)]
struct State {
    // collection -> id -> fields
    objects: HashMap<String, HashMap<String, ObjectFields>>,
    // token id -> fields
    tokens: HashMap<String, ObjectFields>,
    // ciphertext -> fields
    ciphertexts: HashMap<String, ObjectFields>,
    // action name -> canned response
    actions: HashMap<String, Value>,
    // injected failure consumed by the next operation
    fail_next: Option<VaultError>,
}

/// An in-process vault.
#[derive(Default)]
pub struct MemoryVault {
    state: Mutex<State>,
    /// Call counters, readable by tests.
    pub calls: CallCounters,
}

impl MemoryVault {
    /// Create an empty vault.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object and return its generated id.
    pub fn insert_object(&self, collection: &str, fields: ObjectFields) -> String {
        let id = Uuid::new_v4().to_string();
        self.lock()
            .objects
            .entry(collection.to_owned())
            .or_default()
            .insert(id.clone(), fields);
        id
    }

    /// Register a canned response for a named action.
    pub fn register_action(&self, action: &str, response: Value) {
        self.lock().actions.insert(action.to_owned(), response);
    }

    /// Fail the next operation with `error` instead of performing it.
    pub fn fail_next(&self, error: VaultError) {
        self.lock().fail_next = Some(error);
    }

    /// Look up the fields stored behind a token id.
    pub fn token_fields(&self, token_id: &str) -> Option<ObjectFields> {
        self.lock().tokens.get(token_id).cloned()
    }

    /// Look up the fields stored behind a ciphertext.
    pub fn ciphertext_fields(&self, ciphertext: &str) -> Option<ObjectFields> {
        self.lock().ciphertexts.get(ciphertext).cloned()
    }

    /// Look up a stored object by collection and id.
    pub fn object(&self, collection: &str, id: &str) -> Option<ObjectFields> {
        self.lock().objects.get(collection)?.get(id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // the lock is never held across await points
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn take_failure(&self) -> Option<VaultError> {
        self.lock().fail_next.take()
    }
}

#[async_trait::async_trait]
impl VaultApi for MemoryVault {
    async fn add_object(&self, request: AddObjectRequest) -> Result<String, VaultError> {
        self.calls.add_object.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        Ok(self.insert_object(&request.collection, request.fields))
    }

    async fn tokenize(
        &self,
        request: TokenizeRequest,
    ) -> Result<Vec<TokenizedValue>, VaultError> {
        self.calls.tokenize.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        let mut state = self.lock();
        Ok(request
            .requests
            .into_iter()
            .map(|unit| {
                let token_id = Uuid::new_v4().to_string();
                state.tokens.insert(token_id.clone(), unit.fields);
                TokenizedValue { token_id }
            })
            .collect())
    }

    async fn encrypt(&self, request: EncryptRequest) -> Result<Vec<EncryptedValue>, VaultError> {
        self.calls.encrypt.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        let mut state = self.lock();
        Ok(request
            .requests
            .into_iter()
            .map(|unit| {
                let ciphertext = format!("pvenc:{}", Uuid::new_v4());
                state.ciphertexts.insert(ciphertext.clone(), unit.fields);
                EncryptedValue { ciphertext }
            })
            .collect())
    }

    async fn decrypt(&self, request: DecryptRequest) -> Result<Vec<ObjectFields>, VaultError> {
        self.calls.decrypt.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        let state = self.lock();
        request
            .ciphertexts
            .iter()
            .map(|ciphertext| {
                state
                    .ciphertexts
                    .get(ciphertext)
                    .cloned()
                    .ok_or_else(|| VaultError::Api {
                        status: 400,
                        message: "invalid ciphertext".into(),
                    })
            })
            .collect()
    }

    async fn list_objects(
        &self,
        request: ListObjectsRequest,
    ) -> Result<Vec<ObjectFields>, VaultError> {
        self.calls.list_objects.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        let state = self.lock();
        let collection = state.objects.get(&request.collection);
        request
            .ids
            .iter()
            .map(|id| {
                let fields = collection
                    .and_then(|objects| objects.get(id))
                    .ok_or_else(|| VaultError::Api {
                        status: 404,
                        message: format!("object not found: {id}"),
                    })?;
                let mut projected = ObjectFields::new();
                for prop in &request.props {
                    if prop == "id" {
                        projected.insert("id".into(), Value::String(id.clone()));
                    } else if let Some(value) = fields.get(prop) {
                        projected.insert(prop.clone(), value.clone());
                    }
                }
                Ok(projected)
            })
            .collect()
    }

    async fn invoke_action(&self, request: InvokeActionRequest) -> Result<Value, VaultError> {
        self.calls.invoke_action.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        self.lock()
            .actions
            .get(&request.action)
            .cloned()
            .ok_or_else(|| VaultError::Api {
                status: 404,
                message: format!("action not found: {}", request.action),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EncryptObjectRequest, TokenizeObjectRequest};
    use serde_json::json;

    fn fields(entries: &[(&str, &str)]) -> ObjectFields {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), json!(value)))
            .collect()
    }

    #[tokio::test]
    async fn add_object_returns_uuid_and_stores_fields() {
        let vault = MemoryVault::new();
        let id = vault
            .add_object(AddObjectRequest {
                collection: "users".into(),
                reason: "AppFunctionality".into(),
                fields: fields(&[("name", "john")]),
                tenant_id: None,
                expiration_secs: None,
            })
            .await
            .unwrap();
        assert!(Uuid::parse_str(&id).is_ok());
        assert_eq!(vault.object("users", &id), Some(fields(&[("name", "john")])));
        assert_eq!(vault.calls.add_object.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tokenize_returns_one_token_per_unit() {
        let vault = MemoryVault::new();
        let tokens = vault
            .tokenize(TokenizeRequest {
                collection: "users".into(),
                reason: "AppFunctionality".into(),
                requests: vec![
                    TokenizeObjectRequest {
                        fields: fields(&[("ssn", "444-21-4357")]),
                        token_type: "pci".into(),
                        props: vec!["ssn".into()],
                    },
                    TokenizeObjectRequest {
                        fields: fields(&[("name", "john")]),
                        token_type: "pci".into(),
                        props: vec!["name".into()],
                    },
                ],
                tenant_id: None,
                expiration_secs: None,
            })
            .await
            .unwrap();
        assert_eq!(tokens.len(), 2);
        assert_eq!(
            vault.token_fields(&tokens[0].token_id),
            Some(fields(&[("ssn", "444-21-4357")]))
        );
    }

    #[tokio::test]
    async fn encrypt_then_decrypt_round_trips() {
        let vault = MemoryVault::new();
        let encrypted = vault
            .encrypt(EncryptRequest {
                collection: "users".into(),
                reason: "AppFunctionality".into(),
                requests: vec![EncryptObjectRequest {
                    fields: fields(&[("email", "john@example.com")]),
                    props: None,
                }],
                expiration_secs: None,
            })
            .await
            .unwrap();
        let decrypted = vault
            .decrypt(DecryptRequest {
                collection: "users".into(),
                reason: "AppFunctionality".into(),
                ciphertexts: vec![encrypted[0].ciphertext.clone()],
            })
            .await
            .unwrap();
        assert_eq!(decrypted[0], fields(&[("email", "john@example.com")]));
    }

    #[tokio::test]
    async fn list_objects_projects_requested_props() {
        let vault = MemoryVault::new();
        let id = vault.insert_object("users", fields(&[("name", "john"), ("email", "j@x.com")]));
        let objects = vault
            .list_objects(ListObjectsRequest {
                collection: "users".into(),
                reason: "AppFunctionality".into(),
                ids: vec![id.clone()],
                props: vec!["name".into()],
                transformation_param: None,
            })
            .await
            .unwrap();
        assert_eq!(objects, vec![fields(&[("name", "john")])]);

        let missing = vault
            .list_objects(ListObjectsRequest {
                collection: "users".into(),
                reason: "AppFunctionality".into(),
                ids: vec![Uuid::new_v4().to_string()],
                props: vec!["name".into()],
                transformation_param: None,
            })
            .await;
        assert!(matches!(missing, Err(VaultError::Api { status: 404, .. })));
    }

    #[tokio::test]
    async fn injected_failure_is_consumed_once() {
        let vault = MemoryVault::new();
        vault.fail_next(VaultError::Network("connection refused".into()));
        let first = vault
            .invoke_action(InvokeActionRequest {
                action: "noop".into(),
                reason: "AppFunctionality".into(),
                input: json!({}),
            })
            .await;
        assert_eq!(first, Err(VaultError::Network("connection refused".into())));

        vault.register_action("noop", json!({"ok": true}));
        let second = vault
            .invoke_action(InvokeActionRequest {
                action: "noop".into(),
                reason: "AppFunctionality".into(),
                input: json!({}),
            })
            .await;
        assert_eq!(second, Ok(json!({"ok": true})));
    }
}
