mod load;
mod save;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use load::load_document;
pub use save::{DocumentFormat, save_document};

/// A node of a settings document: a name, string attributes and child nodes.
///
/// Components persist themselves as attribute sets. Numeric readers are lenient:
/// a missing or unparsable attribute reads as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn set_attribute(&mut self, key: &str, value: impl ToString) {
        self.attributes.insert(key.to_string(), value.to_string());
    }

    pub fn with_attribute(mut self, key: &str, value: impl ToString) -> Self {
        self.set_attribute(key, value);
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// The attribute as a string, empty if missing.
    pub fn attr_str(&self, key: &str) -> &str {
        self.attribute(key).unwrap_or("")
    }

    pub fn attr_i64(&self, key: &str) -> i64 {
        self.attribute(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    pub fn attr_f32(&self, key: &str) -> f32 {
        self.attribute(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0.0)
    }

    pub fn attr_f64(&self, key: &str) -> f64 {
        self.attribute(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0.0)
    }

    /// Booleans are stored as `0`/`1`; any non-zero integer is true.
    pub fn attr_bool(&self, key: &str) -> bool {
        self.attr_i64(key) != 0
    }

    pub fn append_child(&mut self, child: Element) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] rmp_serde::encode::Error),

    #[error("Deserialization error: {0}")]
    Deserialize(#[from] rmp_serde::decode::Error),

    #[error("Expected a '{expected}' element, found '{found}'")]
    UnexpectedElement { expected: String, found: String },
}
