//! The sandbox document's retained UI tree.
//!
//! Nodes are plain data: a tag, attributes, optional text and children.
//! Interactive behavior lives in the owning session (it maps field names and
//! display paths to state), so replacing a node is an explicit unmount of
//! that bookkeeping, not a garbage-collection concern.

use std::collections::BTreeMap;

use crate::options::{Size, Style};

/// One node of the sandbox document tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UiNode {
    /// Element tag, e.g. `form`, `div`, `input`, `label`, `span`.
    pub tag: String,
    /// Attributes, including `class` and `data-name`.
    pub attrs: BTreeMap<String, String>,
    /// Text content for leaf nodes.
    pub text: Option<String>,
    /// Child nodes in document order.
    pub children: Vec<UiNode>,
}

impl UiNode {
    /// A node with the given tag.
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_owned(),
            ..Self::default()
        }
    }

    /// Set an attribute.
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_owned(), value.to_owned());
        self
    }

    /// Add a class to the `class` attribute.
    pub fn class(mut self, class: &str) -> Self {
        let classes = self.attrs.entry("class".to_owned()).or_default();
        if !classes.is_empty() {
            classes.push(' ');
        }
        classes.push_str(class);
        self
    }

    /// Set text content.
    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_owned());
        self
    }

    /// Append a child.
    pub fn child(mut self, child: UiNode) -> Self {
        self.children.push(child);
        self
    }

    /// Append children.
    pub fn extend(mut self, children: impl IntoIterator<Item = UiNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Depth-first search for a node matching `predicate`.
    pub fn find(&self, predicate: &impl Fn(&UiNode) -> bool) -> Option<&UiNode> {
        if predicate(self) {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(predicate))
    }

    /// Count nodes matching `predicate` in the whole subtree.
    pub fn count(&self, predicate: &impl Fn(&UiNode) -> bool) -> usize {
        usize::from(predicate(self))
            + self
                .children
                .iter()
                .map(|child| child.count(predicate))
                .sum::<usize>()
    }
}

/// Applies style options to a rendered tree: the theme becomes a class on
/// the root, variables become custom properties in the root's `style`
/// attribute, and custom CSS is prepended as a `style` node. The body is
/// replaced wholesale on every render, so the previous style goes with it.
pub fn apply_style(mut root: UiNode, style: &Style) -> UiNode {
    if let Some(css) = &style.css {
        root.children
            .insert(0, UiNode::new("style").text(css));
    }
    if let Some(theme) = &style.theme {
        root = root.class(theme.as_str());
    }
    if let Some(variables) = &style.variables {
        let declarations = variables
            .iter()
            .map(|(name, value)| format!("--{name}: {value}"))
            .collect::<Vec<_>>()
            .join("; ");
        root = root.attr("style", &declarations);
    }
    root
}

/// The sandbox document: body tree, reported size and clipboard.
#[derive(Debug, Clone, Default)]
pub struct Document {
    /// The rendered body.
    pub body: UiNode,
    /// Body size, driven by `container-size` events from the host.
    pub size: Size,
    /// Clipboard contents written by `copy`. Never crosses the channel.
    pub clipboard: Option<String>,
}

impl Document {
    /// Replace the body with a new tree.
    pub fn replace_body(&mut self, body: UiNode) {
        self.body = body;
    }

    /// Content size of the rendered body, reported to the host as
    /// `content-size`. One row of height per leaf node.
    pub fn measure(&self) -> Size {
        let rows = self
            .body
            .count(&|node| node.children.is_empty() && node.tag != "style")
            .max(1);
        Size {
            width: 320.0,
            height: 28.0 * rows as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_and_find() {
        let tree = UiNode::new("form")
            .child(
                UiNode::new("div")
                    .class("field")
                    .attr("data-name", "ssn")
                    .child(UiNode::new("input").attr("name", "ssn")),
            )
            .child(UiNode::new("button").text("Save"));

        let input = tree
            .find(&|node| node.tag == "input")
            .expect("input present");
        assert_eq!(input.attrs.get("name").map(String::as_str), Some("ssn"));
        assert_eq!(tree.count(&|node| node.tag == "div"), 1);
    }

    #[test]
    fn class_accumulates() {
        let node = UiNode::new("div").class("field").class("invalid");
        assert_eq!(node.attrs.get("class").map(String::as_str), Some("field invalid"));
    }

    #[test]
    fn style_nodes_are_not_content() {
        let mut document = Document::default();
        document.replace_body(apply_style(
            UiNode::new("form").child(UiNode::new("input")),
            &Style {
                css: Some("input { margin: 0 }".into()),
                ..Style::default()
            },
        ));
        assert_eq!(document.measure().height, 28.0);
    }

    #[test]
    fn measure_scales_with_leaves() {
        let mut document = Document::default();
        assert_eq!(document.measure().height, 28.0);

        document.replace_body(
            UiNode::new("form")
                .child(UiNode::new("input"))
                .child(UiNode::new("input")),
        );
        assert_eq!(document.measure().height, 56.0);
        assert_eq!(document.measure().width, 320.0);
    }
}
