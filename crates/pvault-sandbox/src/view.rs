//! The rendered view: cached vault fetch plus display projection.
//!
//! The fetch result is reused across re-renders unless a fetch-affecting
//! option changed; style-only updates never produce a second vault call.

use std::sync::LazyLock;

use pvault_client::{
    InvokeActionRequest, ListObjectsRequest, ObjectFields, VaultApi, VaultError,
};
use pvault_path::follow_path;
use regex::Regex;
use serde_json::{json, Value};
use thiserror::Error;

use crate::options::{DisplayField, Reason, Style, ViewOptions, ViewStrategy};
use crate::ui::{apply_style, UiNode};

static OBJECT_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap()
});

const MAX_OBJECTS: usize = 10;

/// A view fetch or projection failure.
#[derive(Debug, Error)]
pub enum ViewError {
    /// More ids were requested than a single view may fetch.
    #[error("Too many objects")]
    TooManyObjects,
    /// An id is not UUID formatted.
    #[error("Invalid object ID")]
    InvalidObjectId,
    /// A display path did not resolve into the fetched result.
    #[error("invalid display path \"{0}\"")]
    InvalidPath(String),
    /// The vault call failed.
    #[error("{}", vault_message(.0))]
    Vault(#[from] VaultError),
}

fn vault_message(error: &VaultError) -> String {
    match error {
        VaultError::Api { message, .. } => message.clone(),
        VaultError::Network(message) => format!("network error: {message}"),
        other => other.to_string(),
    }
}

/// The fetched result, shaped by the strategy that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    /// Objects from a `read-objects` strategy, fields in props order.
    Objects(Vec<ObjectFields>),
    /// The raw response of an `invoke-action` strategy.
    Response(Value),
}

impl FetchResult {
    /// The result as a JSON value, the root that display paths resolve
    /// against.
    pub fn as_value(&self) -> Value {
        match self {
            FetchResult::Objects(objects) => json!(objects),
            FetchResult::Response(response) => response.clone(),
        }
    }
}

/// The view model: last applied options and the cached fetch.
pub struct ViewModel {
    cached: Option<(String, FetchResult)>,
}

impl ViewModel {
    /// An empty view with nothing fetched yet.
    pub fn new() -> Self {
        ViewModel { cached: None }
    }

    /// Renders the view for `options`, fetching from the vault only when a
    /// fetch-affecting option changed since the last render.
    pub async fn render(
        &mut self,
        options: &ViewOptions,
        client: &dyn VaultApi,
    ) -> Result<UiNode, ViewError> {
        let key = fetch_key(options);
        let result = match &self.cached {
            Some((cached_key, result)) if *cached_key == key => result.clone(),
            _ => {
                let result = fetch(options, client).await?;
                self.cached = Some((key, result.clone()));
                result
            }
        };
        let tree = project(&result, options.display.as_deref())?;
        Ok(match &options.css {
            Some(css) => apply_style(
                tree,
                &Style {
                    css: Some(css.clone()),
                    ..Style::default()
                },
            ),
            None => tree,
        })
    }

    /// The cached result, if a fetch succeeded.
    pub fn result(&self) -> Option<&FetchResult> {
        self.cached.as_ref().map(|(_, result)| result)
    }

    /// Resolves `path` into the fetched result, for copy and interaction
    /// payloads. The resolved value never leaves the sandbox.
    pub fn resolve(&self, path: &str) -> Result<Value, ViewError> {
        let root = self
            .result()
            .map(FetchResult::as_value)
            .ok_or_else(|| ViewError::InvalidPath(path.to_owned()))?;
        follow_path(&root, Some(path))
            .map(Value::clone)
            .map_err(|_| ViewError::InvalidPath(path.to_owned()))
    }
}

impl Default for ViewModel {
    fn default() -> Self {
        Self::new()
    }
}

// CSS-only and display-only changes must keep the cache; everything that
// shapes the remote call participates in the key.
fn fetch_key(options: &ViewOptions) -> String {
    json!({
        "vaultURL": options.vault_url,
        "apiKey": options.api_key,
        "reason": options.reason.unwrap_or(Reason::AppFunctionality).as_str(),
        "strategy": options.strategy,
    })
    .to_string()
}

async fn fetch(options: &ViewOptions, client: &dyn VaultApi) -> Result<FetchResult, ViewError> {
    let reason = options.reason.unwrap_or(Reason::AppFunctionality).as_str();
    match &options.strategy {
        ViewStrategy::ReadObjects {
            collection,
            ids,
            props,
            transformation_param,
        } => {
            if ids.len() > MAX_OBJECTS {
                return Err(ViewError::TooManyObjects);
            }
            if ids.iter().any(|id| !OBJECT_ID.is_match(id)) {
                return Err(ViewError::InvalidObjectId);
            }
            let objects = client
                .list_objects(ListObjectsRequest {
                    collection: collection.clone(),
                    reason: reason.to_owned(),
                    ids: ids.clone(),
                    props: props.clone(),
                    transformation_param: transformation_param.clone(),
                })
                .await?;
            Ok(FetchResult::Objects(
                objects
                    .into_iter()
                    .map(|object| reorder(object, props))
                    .collect(),
            ))
        }
        ViewStrategy::InvokeAction { action, input } => {
            let response = client
                .invoke_action(InvokeActionRequest {
                    action: action.clone(),
                    reason: reason.to_owned(),
                    input: input.clone(),
                })
                .await?;
            Ok(FetchResult::Response(response))
        }
    }
}

// Field order follows the requested props order, not the vault's.
fn reorder(object: ObjectFields, props: &[String]) -> ObjectFields {
    let mut ordered = ObjectFields::new();
    for prop in props {
        if let Some(value) = object.get(prop) {
            ordered.insert(prop.clone(), value.clone());
        }
    }
    for (name, value) in object {
        ordered.entry(name).or_insert(value);
    }
    ordered
}

fn project(
    result: &FetchResult,
    display: Option<&[DisplayField]>,
) -> Result<UiNode, ViewError> {
    match display {
        Some(fields) => project_display(result, fields),
        None => Ok(default_view(result)),
    }
}

fn project_display(
    result: &FetchResult,
    fields: &[DisplayField],
) -> Result<UiNode, ViewError> {
    let root = result.as_value();
    let mut view = UiNode::new("div").class("view");
    for field in fields {
        let value = follow_path(&root, field.path.as_deref())
            .map_err(|_| ViewError::InvalidPath(field.path.clone().unwrap_or_default()))?;
        let rendered = match &field.format {
            Some(format) => format.replace("{}", &value_text(value)),
            None => value_text(value),
        };
        let mut node = UiNode::new("div")
            .class("field")
            .attr("data-path", field.path.as_deref().unwrap_or(""));
        if let Some(label) = &field.label {
            node = node.child(UiNode::new("label").text(label));
        }
        node = node.child(UiNode::new("span").class("value").text(&rendered));
        view = view.child(node);
    }
    Ok(view)
}

fn default_view(result: &FetchResult) -> UiNode {
    let view = UiNode::new("div").class("view");
    match result {
        FetchResult::Objects(objects) => {
            view.extend(objects.iter().map(object_view))
        }
        FetchResult::Response(response) => view.child(value_node(response)),
    }
}

// `id` and underscore-prefixed fields are fetched but never displayed.
fn object_view(object: &ObjectFields) -> UiNode {
    UiNode::new("div").class("object").extend(
        object
            .iter()
            .filter(|(name, _)| *name != "id" && !name.starts_with('_'))
            .map(|(name, value)| {
                UiNode::new("div")
                    .class("field")
                    .attr("data-name", name)
                    .child(UiNode::new("label").text(name))
                    .child(value_node(value).class("value"))
            }),
    )
}

fn value_node(value: &Value) -> UiNode {
    match value {
        Value::Object(map) => {
            let fields: ObjectFields = map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            object_view(&fields)
        }
        Value::Array(items) => UiNode::new("div").class("list").extend(items.iter().map(value_node)),
        other => UiNode::new("span").text(&value_text(other)),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pvault_client::MemoryVault;
    use std::sync::atomic::Ordering;
    use uuid::Uuid;

    fn read_options(collection: &str, ids: Vec<String>, props: Vec<&str>) -> ViewOptions {
        ViewOptions {
            vault_url: "http://localhost:8123".into(),
            api_key: "pvaultauth".into(),
            debug: None,
            dynamic: Some(true),
            reason: None,
            strategy: ViewStrategy::ReadObjects {
                collection: collection.into(),
                ids,
                props: props.into_iter().map(String::from).collect(),
                transformation_param: None,
            },
            display: None,
            css: None,
        }
    }

    fn seeded_vault() -> (MemoryVault, String) {
        let vault = MemoryVault::new();
        let id = vault.insert_object(
            "users",
            ObjectFields::from([
                ("name".to_owned(), json!("John")),
                ("email".to_owned(), json!("john@example.com")),
                ("_internal".to_owned(), json!("hidden")),
            ]),
        );
        (vault, id)
    }

    #[tokio::test]
    async fn renders_objects_with_hidden_fields_filtered() {
        let (vault, id) = seeded_vault();
        let mut view = ViewModel::new();
        let options = read_options("users", vec![id], vec!["name", "email", "_internal", "id"]);
        let rendered = view.render(&options, &vault).await.unwrap();
        assert!(rendered
            .find(&|node| node.text.as_deref() == Some("John"))
            .is_some());
        assert!(rendered
            .find(&|node| node.text.as_deref() == Some("hidden"))
            .is_none());
        assert!(rendered
            .find(&|node| node.attrs.get("data-name").map(String::as_str) == Some("id"))
            .is_none());
    }

    #[tokio::test]
    async fn cache_survives_css_changes_but_not_id_changes() {
        let (vault, id) = seeded_vault();
        let second = vault.insert_object("users", ObjectFields::from([("name".to_owned(), json!("Jane"))]));
        let mut view = ViewModel::new();
        let mut options = read_options("users", vec![id.clone()], vec!["name"]);
        view.render(&options, &vault).await.unwrap();
        assert_eq!(vault.calls.list_objects.load(Ordering::SeqCst), 1);

        options.css = Some(".view { color: red }".into());
        let rendered = view.render(&options, &vault).await.unwrap();
        assert_eq!(vault.calls.list_objects.load(Ordering::SeqCst), 1);
        assert_eq!(rendered.children[0].tag, "style");
        assert_eq!(
            rendered.children[0].text.as_deref(),
            Some(".view { color: red }")
        );

        options.strategy = ViewStrategy::ReadObjects {
            collection: "users".into(),
            ids: vec![id, second],
            props: vec!["name".into()],
            transformation_param: None,
        };
        view.render(&options, &vault).await.unwrap();
        assert_eq!(vault.calls.list_objects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rejects_too_many_or_malformed_ids() {
        let vault = MemoryVault::new();
        let mut view = ViewModel::new();
        let ids: Vec<String> = (0..11).map(|_| Uuid::new_v4().to_string()).collect();
        let error = view
            .render(&read_options("users", ids, vec!["name"]), &vault)
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "Too many objects");

        let error = view
            .render(
                &read_options("users", vec!["not-a-uuid".into()], vec!["name"]),
                &vault,
            )
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "Invalid object ID");
        assert_eq!(vault.calls.list_objects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn vault_failures_surface_their_message() {
        let (vault, id) = seeded_vault();
        vault.fail_next(VaultError::Api {
            status: 403,
            message: "collection access denied".into(),
        });
        let mut view = ViewModel::new();
        let error = view
            .render(&read_options("users", vec![id.clone()], vec!["name"]), &vault)
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "collection access denied");
        assert!(view.result().is_none());

        vault.fail_next(VaultError::Network("connection refused".into()));
        let error = view
            .render(&read_options("users", vec![id], vec!["name"]), &vault)
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "network error: connection refused");
    }

    #[tokio::test]
    async fn invoke_action_renders_the_response() {
        let vault = MemoryVault::new();
        vault.register_action("mask", json!({"masked": "***-**-1234"}));
        let mut view = ViewModel::new();
        let options = ViewOptions {
            vault_url: "http://localhost:8123".into(),
            api_key: "pvaultauth".into(),
            debug: None,
            dynamic: None,
            reason: None,
            strategy: ViewStrategy::InvokeAction {
                action: "mask".into(),
                input: json!({"ssn": "123-12-1234"}),
            },
            display: None,
            css: None,
        };
        let rendered = view.render(&options, &vault).await.unwrap();
        assert!(rendered
            .find(&|node| node.text.as_deref() == Some("***-**-1234"))
            .is_some());
    }

    #[tokio::test]
    async fn display_projection_resolves_paths_and_formats() {
        let (vault, id) = seeded_vault();
        let mut options = read_options("users", vec![id], vec!["name", "email"]);
        options.display = Some(vec![DisplayField {
            label: Some("Name".into()),
            path: Some("[0].name".into()),
            format: Some("Hello {}".into()),
        }]);
        let mut view = ViewModel::new();
        let rendered = view.render(&options, &vault).await.unwrap();
        assert!(rendered
            .find(&|node| node.text.as_deref() == Some("Hello John"))
            .is_some());

        assert_eq!(view.resolve("[0].email").unwrap(), json!("john@example.com"));
        assert!(view.resolve("[0].missing").is_err());
    }
}
