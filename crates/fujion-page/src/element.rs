use std::{collections::BTreeMap, sync::Arc};

use serde_json::Value;

use crate::{
    definition::{ComponentDefinition, ROOT_TAG},
    error::ParserError,
};

/// Index of an element inside its [`PageTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(usize);

impl ElementId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Tag library declared through `<?taglib prefix="..." uri="..."?>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagLibrary {
    prefix: String,
    uri: String,
}

impl TagLibrary {
    pub fn new(prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            uri: uri.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

#[derive(Debug, Clone)]
pub struct PageElement {
    definition: Option<Arc<ComponentDefinition>>,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
    child_counts: BTreeMap<String, usize>,
    attributes: BTreeMap<String, String>,
    constructor_args: Vec<Value>,
    tag_libraries: BTreeMap<String, TagLibrary>,
}

impl PageElement {
    fn new(definition: Option<Arc<ComponentDefinition>>, parent: Option<ElementId>) -> Self {
        Self {
            definition,
            parent,
            children: Vec::new(),
            child_counts: BTreeMap::new(),
            attributes: BTreeMap::new(),
            constructor_args: Vec::new(),
            tag_libraries: BTreeMap::new(),
        }
    }

    /// `None` only for the tree root.
    pub fn definition(&self) -> Option<&Arc<ComponentDefinition>> {
        self.definition.as_ref()
    }

    pub fn tag(&self) -> &str {
        self.definition
            .as_ref()
            .map_or(ROOT_TAG, |definition| definition.tag())
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    pub fn children(&self) -> &[ElementId] {
        &self.children
    }

    pub fn child_count(&self, tag: &str) -> usize {
        self.child_counts.get(tag).copied().unwrap_or(0)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn constructor_args(&self) -> &[Value] {
        &self.constructor_args
    }

    pub fn tag_libraries(&self) -> &BTreeMap<String, TagLibrary> {
        &self.tag_libraries
    }
}

/// Arena holding the elements of one parsed page. Element `0` is the root.
#[derive(Debug, Clone)]
pub struct PageTree {
    elements: Vec<PageElement>,
}

impl Default for PageTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PageTree {
    pub const ROOT: ElementId = ElementId(0);

    pub fn new() -> Self {
        Self {
            elements: vec![PageElement::new(None, None)],
        }
    }

    pub fn root(&self) -> &PageElement {
        self.element(Self::ROOT)
    }

    pub fn element(&self, id: ElementId) -> &PageElement {
        &self.elements[id.0]
    }

    pub fn get(&self, id: ElementId) -> Option<&PageElement> {
        self.elements.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.len() <= 1
    }

    pub fn children(&self, id: ElementId) -> &[ElementId] {
        &self.element(id).children
    }

    /// Appends a child after the parent accepts it at its new running count.
    pub fn add_child(
        &mut self,
        parent: ElementId,
        definition: Arc<ComponentDefinition>,
    ) -> Result<ElementId, ParserError> {
        let parent_element = self.element(parent);
        let running_count = parent_element.child_count(definition.tag()) + 1;
        match parent_element.definition() {
            Some(parent_definition) => parent_definition.validate_child(&definition, running_count)?,
            None if !definition.allows_parent(ROOT_TAG) => {
                return Err(ParserError::InvalidChild {
                    parent: ROOT_TAG.to_string(),
                    child: definition.tag().to_string(),
                })
            }
            None => {}
        }

        let id = ElementId(self.elements.len());
        let tag = definition.tag().to_string();
        self.elements.push(PageElement::new(Some(definition), Some(parent)));
        let parent_element = &mut self.elements[parent.0];
        parent_element.children.push(id);
        parent_element.child_counts.insert(tag, running_count);
        Ok(id)
    }

    pub fn set_attribute(&mut self, id: ElementId, name: impl Into<String>, value: impl Into<String>) {
        self.elements[id.0]
            .attributes
            .insert(name.into(), value.into());
    }

    pub fn append_attribute(&mut self, id: ElementId, name: &str, value: &str) {
        self.elements[id.0]
            .attributes
            .entry(name.to_string())
            .or_default()
            .push_str(value);
    }

    pub fn push_constructor_arg(&mut self, id: ElementId, arg: Value) {
        self.elements[id.0].constructor_args.push(arg);
    }

    pub fn add_tag_library(&mut self, id: ElementId, library: TagLibrary) {
        self.elements[id.0]
            .tag_libraries
            .insert(library.prefix.clone(), library);
    }

    /// Looks up a tag library on the element or its nearest ancestor.
    pub fn tag_library(&self, id: ElementId, prefix: &str) -> Option<&TagLibrary> {
        let mut current = Some(id);
        while let Some(id) = current {
            let element = self.element(id);
            if let Some(library) = element.tag_libraries.get(prefix) {
                return Some(library);
            }
            current = element.parent;
        }
        None
    }

    /// Collects every cardinality violation of the element's children into
    /// one error.
    pub fn validate(&self, id: ElementId) -> Result<(), ParserError> {
        let element = self.element(id);
        let Some(definition) = element.definition() else {
            return Ok(());
        };
        let violations = definition.validate_children(&element.child_counts);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ParserError::Cardinality {
                tag: definition.tag().to_string(),
                violations,
            })
        }
    }

    /// Element ids in document order, starting at `id`.
    pub fn descendants(&self, id: ElementId) -> Vec<ElementId> {
        let mut ordered = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            ordered.push(next);
            stack.extend(self.element(next).children.iter().rev().copied());
        }
        ordered
    }
}
