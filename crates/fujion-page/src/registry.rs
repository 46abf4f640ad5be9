use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};

use crate::{
    definition::{
        AttributeKind, Cardinality, ComponentDefinition, ContentHandling, CONTENT_ATTRIBUTE,
        ROOT_TAG, TEXT_TAG,
    },
    error::RegistryError,
};

pub const PAGE_TAG: &str = "page";
/// Raw HTML passthrough; receives the HTML tag name as a constructor argument.
pub const HTML_TAG: &str = "html";

const FLAVORS: &[&str] = &[
    "default", "primary", "success", "info", "warning", "danger", "link",
];

/// Tag to definition lookup consulted by the parser.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    definitions: DashMap<String, Arc<ComponentDefinition>>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_core_components() -> Self {
        let definitions = core_definitions()
            .into_iter()
            .map(|definition| (definition.tag().to_string(), Arc::new(definition)))
            .collect();
        Self { definitions }
    }

    pub fn register(
        &self,
        definition: ComponentDefinition,
    ) -> Result<Arc<ComponentDefinition>, RegistryError> {
        match self.definitions.entry(definition.tag().to_string()) {
            Entry::Occupied(entry) => Err(RegistryError::DuplicateTag(entry.key().clone())),
            Entry::Vacant(entry) => {
                let definition = Arc::new(definition);
                entry.insert(Arc::clone(&definition));
                Ok(definition)
            }
        }
    }

    pub fn get(&self, tag: &str) -> Option<Arc<ComponentDefinition>> {
        self.definitions
            .get(tag)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.definitions.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .definitions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        tags.sort();
        tags
    }
}

fn core_definitions() -> Vec<ComponentDefinition> {
    vec![
        ComponentDefinition::builder(PAGE_TAG, "Page")
            .content(ContentHandling::Ignore)
            .attribute("title", AttributeKind::Text)
            .any_child(Cardinality::UNBOUNDED)
            .parents([ROOT_TAG])
            .build(),
        ComponentDefinition::builder("div", "Div")
            .content(ContentHandling::AsChild)
            .any_child(Cardinality::UNBOUNDED)
            .build(),
        ComponentDefinition::builder("span", "Span")
            .content(ContentHandling::AsChild)
            .any_child(Cardinality::UNBOUNDED)
            .build(),
        ComponentDefinition::builder("label", "Label")
            .content(ContentHandling::AsAttribute)
            .attribute("label", AttributeKind::Text)
            .attribute("value", AttributeKind::Text)
            .build(),
        ComponentDefinition::builder("button", "Button")
            .content(ContentHandling::AsAttribute)
            .attribute("label", AttributeKind::Text)
            .attribute("disabled", AttributeKind::Boolean)
            .attribute("flavor", AttributeKind::Choice(FLAVORS))
            .build(),
        ComponentDefinition::builder("textbox", "Textbox")
            .attribute("value", AttributeKind::Text)
            .attribute("placeholder", AttributeKind::Text)
            .attribute("maxlength", AttributeKind::Integer)
            .attribute("readonly", AttributeKind::Boolean)
            .attribute("disabled", AttributeKind::Boolean)
            .build(),
        ComponentDefinition::builder("checkbox", "Checkbox")
            .attribute("label", AttributeKind::Text)
            .attribute("checked", AttributeKind::Boolean)
            .attribute("disabled", AttributeKind::Boolean)
            .build(),
        ComponentDefinition::builder(HTML_TAG, "Html")
            .content(ContentHandling::AsChild)
            .open_attributes()
            .any_child(Cardinality::UNBOUNDED)
            .build(),
        ComponentDefinition::builder(TEXT_TAG, "Content")
            .attribute(CONTENT_ATTRIBUTE, AttributeKind::Text)
            .build(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_components_are_registered() {
        let registry = ComponentRegistry::with_core_components();
        assert_eq!(
            registry.tags(),
            ["#text", "button", "checkbox", "div", "html", "label", "page", "span", "textbox"]
        );
        let page = registry.get(PAGE_TAG).expect("page");
        assert!(page.allows_parent(ROOT_TAG));
        assert!(!page.allows_parent("div"));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = ComponentRegistry::with_core_components();
        let err = registry
            .register(ComponentDefinition::builder("label", "OtherLabel").build())
            .expect_err("duplicate");
        assert!(matches!(err, RegistryError::DuplicateTag(tag) if tag == "label"));
        assert_eq!(registry.get("label").expect("label").widget_class(), "Label");
    }
}
