use tracing::debug;

use crate::{
    component::{Component, PropertyValue},
    definition::{AttributeSpec, ComponentDefinition},
    element::{ElementId, PageElement, PageTree},
    error::MaterializeError,
    page::Page,
    page_definition::PageDefinition,
    registry::PAGE_TAG,
};

/// How a namespaced attribute is applied to a component.
enum AttributeTarget<'a> {
    Event(&'a str),
    DomAttribute(&'a str),
    Controller(&'a str),
    Property(&'a str),
}

fn classify(name: &str) -> AttributeTarget<'_> {
    match name.split_once(':') {
        Some(("on", event)) => AttributeTarget::Event(event),
        Some(("attr", attribute)) => AttributeTarget::DomAttribute(attribute),
        Some(("controller", controller)) => AttributeTarget::Controller(controller),
        _ => AttributeTarget::Property(name),
    }
}

impl PageDefinition {
    /// Builds components for every element under `parent` (the page itself
    /// when `None`) and returns the ids of the top-level components created.
    /// On failure every component created by this call is discarded again.
    pub fn materialize(
        &self,
        page: &Page,
        parent: Option<&str>,
    ) -> Result<Vec<String>, MaterializeError> {
        let parent = parent.unwrap_or(page.id()).to_string();
        let existing = page.children(&parent);
        self.materialize_into(page, &parent).map_err(|err| {
            for child in page.children(&parent) {
                if !existing.contains(&child) {
                    page.discard_component(&child);
                }
            }
            err
        })
    }

    fn materialize_into(&self, page: &Page, parent: &str) -> Result<Vec<String>, MaterializeError> {
        let tree = self.tree();
        let mut created = Vec::new();

        for &id in tree.children(PageTree::ROOT) {
            let element = tree.element(id);
            if parent == page.id() && element.tag() == PAGE_TAG {
                apply_to_page(page, element)?;
                for &child in element.children() {
                    created.push(build(tree, child, page, parent)?);
                }
            } else {
                created.push(build(tree, id, page, parent)?);
            }
        }

        debug!(
            page_id = %page.id(),
            components = created.len(),
            "materialized page definition"
        );
        Ok(created)
    }
}

fn build(
    tree: &PageTree,
    id: ElementId,
    page: &Page,
    parent: &str,
) -> Result<String, MaterializeError> {
    let element = tree.element(id);
    let Some(definition) = element.definition() else {
        return Err(MaterializeError::UnknownParent(parent.to_string()));
    };

    let mut component = Component::new(
        page.next_component_id(),
        definition.tag(),
        definition.widget_class(),
    );
    component.set_constructor_args(element.constructor_args().to_vec());
    for (name, value) in element.attributes() {
        apply_attribute(&mut component, definition, name, value)?;
    }

    let component_id = component.id().to_string();
    page.attach(parent, component)?;
    for &child in element.children() {
        build(tree, child, page, &component_id)?;
    }
    Ok(component_id)
}

fn apply_attribute(
    component: &mut Component,
    definition: &ComponentDefinition,
    name: &str,
    value: &str,
) -> Result<(), MaterializeError> {
    match classify(name) {
        AttributeTarget::Event(event) => component.bind_event(event, value),
        AttributeTarget::DomAttribute(attribute) => component.set_dom_attribute(attribute, value),
        AttributeTarget::Controller(controller) => component.set_controller(controller, value),
        AttributeTarget::Property(property) => {
            let typed = coerce(definition, property, value)?;
            component.set_property(property, typed);
        }
    }
    Ok(())
}

fn coerce(
    definition: &ComponentDefinition,
    name: &str,
    value: &str,
) -> Result<PropertyValue, MaterializeError> {
    definition
        .attribute(name)
        .unwrap_or(AttributeSpec::TEXT)
        .coerce(value)
        .map_err(|expected| MaterializeError::InvalidValue {
            tag: definition.tag().to_string(),
            attribute: name.to_string(),
            value: value.to_string(),
            expected,
        })
}

/// A top-level `page` element configures the page component itself.
fn apply_to_page(page: &Page, element: &PageElement) -> Result<(), MaterializeError> {
    let Some(definition) = element.definition() else {
        return Ok(());
    };
    for (name, value) in element.attributes() {
        match classify(name) {
            AttributeTarget::Property(property) => {
                let typed = coerce(definition, property, value)?;
                page.set_property(page.id(), property, typed)
                    .map_err(|_| MaterializeError::PageDestroyed(page.id().to_string()))?;
            }
            _ => page
                .update_component(page.id(), |component| {
                    apply_attribute(component, definition, name, value)
                })
                .ok_or_else(|| MaterializeError::PageDestroyed(page.id().to_string()))??,
        }
    }
    Ok(())
}
