//! HTTP implementation of [`VaultApi`] using JSON request/response bodies.

use serde_json::Value;

use crate::{
    AddObjectRequest, DecryptRequest, EncryptRequest, EncryptedValue, InvokeActionRequest,
    ListObjectsRequest, ObjectFields, TokenizeRequest, TokenizedValue, VaultApi, VaultConfig,
    VaultError,
};

/// A vault client speaking the vault's JSON REST API.
pub struct HttpVaultClient {
    config: VaultConfig,
    http: reqwest::Client,
}

impl HttpVaultClient {
    /// Create a client for the vault at `config.vault_url`.
    pub fn new(config: VaultConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn data_url(&self, collection: &str, suffix: &str) -> String {
        format!(
            "{}/api/pvlt/1.0/data/collections/{collection}/{suffix}",
            self.config.vault_url.trim_end_matches('/')
        )
    }

    async fn post_json<T: for<'de> serde::Deserialize<'de>>(
        &self,
        url: String,
        query: &[(&str, String)],
        tenant_id: Option<&str>,
        body: &Value,
    ) -> Result<T, VaultError> {
        let mut request = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .query(query)
            .json(body);
        if let Some(tenant_id) = tenant_id {
            request = request.header("X-Tenant-Id", tenant_id);
        }

        tracing::debug!(target: "pvault::client", %url, "vault request");
        let response = request
            .send()
            .await
            .map_err(|err| VaultError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // Surface the vault's error body verbatim
            let body = response
                .text()
                .await
                .map_err(|err| VaultError::Network(err.to_string()))?;
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|value| value.get("message")?.as_str().map(str::to_owned))
                .unwrap_or(body);
            return Err(VaultError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|err| VaultError::Network(err.to_string()))
    }
}

fn expiration_query(expiration_secs: &Option<String>) -> Vec<(&'static str, String)> {
    match expiration_secs {
        Some(secs) => vec![("expiration_secs", secs.clone())],
        None => Vec::new(),
    }
}

#[derive(serde::Deserialize)]
struct AddObjectResponse {
    id: String,
}

#[derive(serde::Deserialize)]
struct ListObjectsResponse {
    results: Vec<ObjectFields>,
}

#[async_trait::async_trait]
impl VaultApi for HttpVaultClient {
    async fn add_object(&self, request: AddObjectRequest) -> Result<String, VaultError> {
        let mut query = vec![("reason", request.reason.clone())];
        query.extend(expiration_query(&request.expiration_secs));
        let response: AddObjectResponse = self
            .post_json(
                self.data_url(&request.collection, "objects"),
                &query,
                request.tenant_id.as_deref(),
                &Value::Object(request.fields.into_iter().collect()),
            )
            .await?;
        Ok(response.id)
    }

    async fn tokenize(
        &self,
        request: TokenizeRequest,
    ) -> Result<Vec<TokenizedValue>, VaultError> {
        let mut query = vec![("reason", request.reason.clone())];
        query.extend(expiration_query(&request.expiration_secs));
        let body = serde_json::to_value(&request.requests)
            .map_err(|err| VaultError::Network(err.to_string()))?;
        self.post_json(
            self.data_url(&request.collection, "tokens"),
            &query,
            request.tenant_id.as_deref(),
            &body,
        )
        .await
    }

    async fn encrypt(&self, request: EncryptRequest) -> Result<Vec<EncryptedValue>, VaultError> {
        let mut query = vec![("reason", request.reason.clone())];
        query.extend(expiration_query(&request.expiration_secs));
        let body = serde_json::to_value(&request.requests)
            .map_err(|err| VaultError::Network(err.to_string()))?;
        self.post_json(
            self.data_url(&request.collection, "encrypt/objects"),
            &query,
            None,
            &body,
        )
        .await
    }

    async fn decrypt(&self, request: DecryptRequest) -> Result<Vec<ObjectFields>, VaultError> {
        let query = vec![("reason", request.reason.clone())];
        let body = serde_json::to_value(&request.ciphertexts)
            .map_err(|err| VaultError::Network(err.to_string()))?;
        self.post_json(
            self.data_url(&request.collection, "decrypt/objects"),
            &query,
            None,
            &body,
        )
        .await
    }

    async fn list_objects(
        &self,
        request: ListObjectsRequest,
    ) -> Result<Vec<ObjectFields>, VaultError> {
        let mut query = vec![
            ("reason", request.reason.clone()),
            ("ids", request.ids.join(",")),
            ("props", request.props.join(",")),
        ];
        if let Some(param) = &request.transformation_param {
            query.push(("trans_param", param.clone()));
        }
        // The list endpoint is a POST search to keep ids out of access logs
        let response: ListObjectsResponse = self
            .post_json(
                self.data_url(&request.collection, "query/objects"),
                &query,
                None,
                &Value::Object(serde_json::Map::new()),
            )
            .await?;
        Ok(response.results)
    }

    async fn invoke_action(&self, request: InvokeActionRequest) -> Result<Value, VaultError> {
        let url = format!(
            "{}/api/pvlt/1.0/system/actions/{}/invoke",
            self.config.vault_url.trim_end_matches('/'),
            request.action
        );
        self.post_json(url, &[("reason", request.reason.clone())], None, &request.input)
            .await
    }
}
