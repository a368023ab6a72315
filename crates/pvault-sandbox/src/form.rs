//! The rendered form: field widgets, touched-state validation, and the
//! submit path that feeds the strategy dispatcher.

use std::collections::BTreeMap;

use pvault_client::VaultApi;
use pvault_error::PvaultError;

use crate::component::Memo;
use crate::logger::Logger;
use crate::options::{Field, FormOptions, Style};
use crate::strategy::{apply_strategy, SubmitRequest, SubmitResult};
use crate::ui::{apply_style, UiNode};
use crate::validations;

/// One input widget derived from a field descriptor.
struct FieldWidget {
    descriptor: Field,
    value: String,
    // whether this field was edited at least once
    touched: bool,
    memo: Memo<UiNode>,
}

impl FieldWidget {
    fn new(descriptor: Field) -> Self {
        let value = descriptor.value.clone().unwrap_or_default();
        FieldWidget {
            descriptor,
            value,
            touched: false,
            memo: Memo::new(),
        }
    }

    fn validation_message(&self) -> Option<String> {
        if self.descriptor.required.unwrap_or(false) && self.value.is_empty() {
            return Some("This field is required".to_owned());
        }
        if self.value.is_empty() {
            return None;
        }
        validations::validate(&self.descriptor.data_type_name, &self.value)
    }

    // Messages stay hidden until the field was edited or a submit was
    // attempted; after that every edit re-validates immediately.
    fn visible_message(&self, form_touched: bool) -> Option<String> {
        if self.touched || form_touched {
            self.validation_message()
        } else {
            None
        }
    }

    fn render(&mut self, form_touched: bool) -> UiNode {
        let message = self.visible_message(form_touched);
        let props = (&self.descriptor, &self.value, &message);
        self.memo
            .render(&props, render_field, |_| {})
            .clone()
    }
}

fn render_field(
    (descriptor, value, message): &(&Field, &String, &Option<String>),
) -> UiNode {
    let mut field = UiNode::new("div").class("field").attr("data-name", &descriptor.name);
    if let Some(label) = &descriptor.label {
        field = field.child(
            UiNode::new("label")
                .attr("for", &descriptor.name)
                .text(label),
        );
    }
    let mut input = UiNode::new("input")
        .attr("name", &descriptor.name)
        .attr("value", value);
    if let Some(placeholder) = &descriptor.placeholder {
        input = input.attr("placeholder", placeholder);
    }
    if descriptor.required.unwrap_or(false) {
        input = input.attr("required", "true");
    }
    field = field.child(input);
    if let Some(message) = message {
        field = field.class("invalid").child(
            UiNode::new("span")
                .class("validation-message")
                .text(message),
        );
    }
    field
}

/// The form model: widgets plus the submission parameters extracted from the
/// current configuration.
pub struct FormModel {
    widgets: Vec<FieldWidget>,
    submit_button: Option<String>,
    style: Option<Style>,
    request: SubmitRequest,
    // a failed submit makes every field reactive
    touched: bool,
    logger: Logger,
}

impl FormModel {
    /// Builds widgets from the configured field descriptors.
    pub fn new(options: &FormOptions, logger: Logger) -> Self {
        FormModel {
            widgets: options.fields.iter().cloned().map(FieldWidget::new).collect(),
            submit_button: options.submit_button.clone(),
            style: options.style.clone(),
            request: SubmitRequest::from_options(options),
            touched: false,
            logger,
        }
    }

    /// Rebuilds the form for a new configuration, carrying over the values
    /// of fields that still exist.
    pub fn update(&mut self, options: &FormOptions) {
        let mut previous: BTreeMap<String, String> = self
            .widgets
            .drain(..)
            .map(|widget| (widget.descriptor.name.clone(), widget.value))
            .collect();
        self.widgets = options
            .fields
            .iter()
            .cloned()
            .map(|descriptor| {
                let mut widget = FieldWidget::new(descriptor);
                if let Some(value) = previous.remove(&widget.descriptor.name) {
                    widget.value = value;
                }
                widget
            })
            .collect();
        self.submit_button = options.submit_button.clone();
        self.style = options.style.clone();
        self.request = SubmitRequest::from_options(options);
        self.touched = false;
    }

    /// Applies a user edit to the named field.
    pub fn set_value(&mut self, name: &str, value: &str) {
        if let Some(widget) = self
            .widgets
            .iter_mut()
            .find(|widget| widget.descriptor.name == name)
        {
            widget.value = value.to_owned();
            widget.touched = true;
        }
    }

    /// The current field values, in field order.
    pub fn values(&self) -> BTreeMap<String, String> {
        self.widgets
            .iter()
            .map(|widget| (widget.descriptor.name.clone(), widget.value.clone()))
            .collect()
    }

    /// Renders the form tree through the per-field memos.
    pub fn render(&mut self) -> UiNode {
        let touched = self.touched;
        let mut form = UiNode::new("form").extend(
            self.widgets
                .iter_mut()
                .map(|widget| widget.render(touched)),
        );
        if let Some(label) = &self.submit_button {
            form = form.child(UiNode::new("button").attr("type", "submit").text(label));
        }
        match &self.style {
            Some(style) => apply_style(form, style),
            None => form,
        }
    }

    /// Runs validation over every field without short-circuiting and returns
    /// the messages of the invalid ones.
    fn validate_all(&self) -> BTreeMap<String, String> {
        self.widgets
            .iter()
            .filter_map(|widget| {
                widget
                    .validation_message()
                    .map(|message| (widget.descriptor.name.clone(), message))
            })
            .collect()
    }

    /// The submit path: marks the form touched, validates every field, and
    /// only on success dispatches to the vault.
    pub async fn submit(&mut self, client: &dyn VaultApi) -> Result<SubmitResult, PvaultError> {
        self.touched = true;

        let failures = self.validate_all();
        if !failures.is_empty() {
            return Err(PvaultError::validation("Form validation failed", failures));
        }

        self.logger.log("Send request to vault");
        let result = apply_strategy(&self.values(), &self.request, client).await?;
        self.logger.log("Received response from vault");
        Ok(result)
    }
}
