use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Typed value of a component property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Boolean(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl PropertyValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            PropertyValue::Boolean(value) => Value::Bool(*value),
            PropertyValue::Integer(value) => Value::from(*value),
            PropertyValue::Number(value) => Value::from(*value),
            PropertyValue::Text(value) => Value::String(value.clone()),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Boolean(value) => write!(f, "{value}"),
            PropertyValue::Integer(value) => write!(f, "{value}"),
            PropertyValue::Number(value) => write!(f, "{value}"),
            PropertyValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

/// Server-side state of one widget on a live page.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    id: String,
    tag: String,
    widget_class: String,
    parent: Option<String>,
    children: Vec<String>,
    properties: BTreeMap<String, PropertyValue>,
    events: BTreeMap<String, String>,
    dom_attributes: BTreeMap<String, String>,
    controllers: BTreeMap<String, String>,
    constructor_args: Vec<Value>,
}

impl Component {
    pub fn new(
        id: impl Into<String>,
        tag: impl Into<String>,
        widget_class: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            tag: tag.into(),
            widget_class: widget_class.into(),
            parent: None,
            children: Vec::new(),
            properties: BTreeMap::new(),
            events: BTreeMap::new(),
            dom_attributes: BTreeMap::new(),
            controllers: BTreeMap::new(),
            constructor_args: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn widget_class(&self) -> &str {
        &self.widget_class
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn children(&self) -> &[String] {
        &self.children
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> &BTreeMap<String, PropertyValue> {
        &self.properties
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.properties.insert(name.into(), value);
    }

    /// Handler name bound to an event type.
    pub fn event_handler(&self, event_type: &str) -> Option<&str> {
        self.events.get(event_type).map(String::as_str)
    }

    pub fn bind_event(&mut self, event_type: impl Into<String>, handler: impl Into<String>) {
        self.events.insert(event_type.into(), handler.into());
    }

    pub fn dom_attribute(&self, name: &str) -> Option<&str> {
        self.dom_attributes.get(name).map(String::as_str)
    }

    pub fn set_dom_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.dom_attributes.insert(name.into(), value.into());
    }

    pub fn controller(&self, name: &str) -> Option<&str> {
        self.controllers.get(name).map(String::as_str)
    }

    pub fn set_controller(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.controllers.insert(name.into(), value.into());
    }

    pub fn constructor_args(&self) -> &[Value] {
        &self.constructor_args
    }

    pub fn set_constructor_args(&mut self, args: Vec<Value>) {
        self.constructor_args = args;
    }

    pub(crate) fn set_parent(&mut self, parent: Option<String>) {
        self.parent = parent;
    }

    pub(crate) fn push_child(&mut self, child: String) {
        self.children.push(child);
    }

    pub(crate) fn remove_child(&mut self, child: &str) {
        self.children.retain(|id| id != child);
    }

    /// Payload of the client `create` call: `{id, wclazz, props, events, attrs}`.
    pub fn create_payload(&self) -> Value {
        let props: Map<String, Value> = self
            .properties
            .iter()
            .map(|(name, value)| (name.clone(), value.to_value()))
            .collect();
        let events: Map<String, Value> = self
            .events
            .keys()
            .map(|event| (event.clone(), Value::Bool(true)))
            .collect();
        let mut payload = json!({
            "id": self.id,
            "wclazz": self.widget_class,
            "props": props,
            "events": events,
            "attrs": self.dom_attributes,
        });
        if !self.constructor_args.is_empty() {
            payload["cargs"] = Value::Array(self.constructor_args.clone());
        }
        payload
    }
}
