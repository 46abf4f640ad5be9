mod pi;

use std::{collections::HashMap, sync::Arc};

use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::{
    definition::{ComponentDefinition, ContentHandling, CONTENT_ATTRIBUTE, ROOT_TAG, TEXT_TAG},
    element::{ElementId, PageTree},
    error::{ParserError, RegistryError},
    namespace::{NamespaceRegistry, ResolvedName},
    page_definition::PageDefinition,
    registry::{ComponentRegistry, HTML_TAG},
    source::{PageSource, ResourceLocator},
    xml::{XmlAttribute, XmlDocument, XmlElement, XmlNode},
};

pub use pi::{ImportHandler, ProcessingInstructionHandler, TagLibraryHandler};

/// Maximum nesting of `<?import?>` instructions.
pub const MAX_IMPORT_DEPTH: usize = 16;

/// Position of the parser inside the tree being built.
pub struct ParseCursor<'t> {
    tree: &'t mut PageTree,
    parent: ElementId,
    base_url: Option<Url>,
    depth: usize,
}

impl<'t> ParseCursor<'t> {
    fn new(tree: &'t mut PageTree, base_url: Option<Url>) -> Self {
        Self {
            tree,
            parent: PageTree::ROOT,
            base_url,
            depth: 0,
        }
    }

    pub fn parent(&self) -> ElementId {
        self.parent
    }

    pub fn tree(&self) -> &PageTree {
        self.tree
    }

    pub fn tree_mut(&mut self) -> &mut PageTree {
        self.tree
    }

    /// Location of the document currently being parsed.
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    pub fn import_depth(&self) -> usize {
        self.depth
    }
}

/// Converts FSP markup into validated [`PageDefinition`]s.
pub struct PageParser {
    registry: Arc<ComponentRegistry>,
    locator: Option<ResourceLocator>,
    tag_namespaces: NamespaceRegistry,
    attribute_namespaces: NamespaceRegistry,
    instructions: HashMap<String, Arc<dyn ProcessingInstructionHandler>>,
}

impl PageParser {
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        let mut instructions: HashMap<String, Arc<dyn ProcessingInstructionHandler>> =
            HashMap::new();
        for handler in [
            Arc::new(ImportHandler) as Arc<dyn ProcessingInstructionHandler>,
            Arc::new(TagLibraryHandler),
        ] {
            instructions.insert(handler.target().to_string(), handler);
        }
        Self {
            registry,
            locator: None,
            tag_namespaces: NamespaceRegistry::tags(),
            attribute_namespaces: NamespaceRegistry::attributes(),
            instructions,
        }
    }

    pub fn with_locator(mut self, locator: ResourceLocator) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn registry(&self) -> &Arc<ComponentRegistry> {
        &self.registry
    }

    pub fn locator(&self) -> Option<&ResourceLocator> {
        self.locator.as_ref()
    }

    pub fn register_tag_namespace(&mut self, name: &str) {
        self.tag_namespaces.register(name);
    }

    pub fn register_attribute_namespace(&mut self, name: &str) {
        self.attribute_namespaces.register(name);
    }

    pub fn register_processing_instruction(
        &mut self,
        handler: Arc<dyn ProcessingInstructionHandler>,
    ) -> Result<(), RegistryError> {
        let target = handler.target().to_string();
        if self.instructions.contains_key(&target) {
            return Err(RegistryError::DuplicateProcessingInstruction(target));
        }
        self.instructions.insert(target, handler);
        Ok(())
    }

    pub fn parse(&self, source: &PageSource) -> Result<PageDefinition, ParserError> {
        let document = source.document()?;
        let mut tree = PageTree::new();
        let mut cursor = ParseCursor::new(&mut tree, source.url().cloned());
        self.parse_document(&document, &mut cursor)?;
        debug!(
            url = ?source.url().map(Url::as_str),
            elements = tree.len() - 1,
            "parsed page definition"
        );
        Ok(PageDefinition::new(tree, source))
    }

    pub fn parse_text(&self, text: &str) -> Result<PageDefinition, ParserError> {
        self.parse(&PageSource::from_text(text))
    }

    /// Parses a resource located through the configured [`ResourceLocator`].
    pub fn parse_resource(&self, key: &str) -> Result<PageDefinition, ParserError> {
        let locator = self.locator.as_ref().ok_or_else(|| {
            ParserError::Source(crate::error::PageSourceError::NotFound(key.to_string()))
        })?;
        self.parse(&PageSource::from_resource(locator, key)?)
    }

    /// Grafts the top-level elements of another document under the cursor's
    /// current parent.
    pub fn import(&self, source: &PageSource, cursor: &mut ParseCursor<'_>) -> Result<(), ParserError> {
        if cursor.depth >= MAX_IMPORT_DEPTH {
            return Err(ParserError::ImportDepth(MAX_IMPORT_DEPTH));
        }
        let document = source.document()?;
        let outer_base = std::mem::replace(&mut cursor.base_url, source.url().cloned());
        cursor.depth += 1;
        let result = self.parse_document(&document, cursor);
        cursor.depth -= 1;
        cursor.base_url = outer_base;
        result
    }

    fn parse_document(&self, document: &XmlDocument, cursor: &mut ParseCursor<'_>) -> Result<(), ParserError> {
        for node in document.nodes() {
            match node {
                XmlNode::Element(element) => self.parse_root(element, cursor)?,
                XmlNode::ProcessingInstruction { target, data } => {
                    self.process_instruction(target, data, cursor)?
                }
                XmlNode::Comment(_) | XmlNode::DocType(_) => {}
                XmlNode::Text(text) | XmlNode::CData(text) if text.trim().is_empty() => {}
                other => return Err(ParserError::UnrecognizedNode(other.kind().to_string())),
            }
        }
        Ok(())
    }

    fn parse_root(&self, element: &XmlElement, cursor: &mut ParseCursor<'_>) -> Result<(), ParserError> {
        match self.tag_namespaces.resolve(&element.name) {
            ResolvedName::Plain(tag) if tag == ROOT_TAG => {}
            other => return Err(ParserError::InvalidRoot(other.normalized())),
        }
        if let Some(attribute) = element.attributes.first() {
            return Err(ParserError::UnknownAttribute {
                tag: ROOT_TAG.to_string(),
                attribute: attribute.name.qualified(),
            });
        }
        self.parse_nodes(&element.children, cursor)
    }

    fn parse_nodes(&self, nodes: &[XmlNode], cursor: &mut ParseCursor<'_>) -> Result<(), ParserError> {
        let mut index = 0;
        while index < nodes.len() {
            match &nodes[index] {
                XmlNode::Text(_) | XmlNode::CData(_) => {
                    let mut run = String::new();
                    while let Some(XmlNode::Text(text) | XmlNode::CData(text)) = nodes.get(index) {
                        run.push_str(text);
                        index += 1;
                    }
                    self.process_text(&run, cursor)?;
                    continue;
                }
                XmlNode::Element(element) => self.parse_element(element, cursor)?,
                XmlNode::ProcessingInstruction { target, data } => {
                    self.process_instruction(target, data, cursor)?
                }
                XmlNode::Comment(_) | XmlNode::DocType(_) => {}
            }
            index += 1;
        }
        Ok(())
    }

    fn parse_element(&self, element: &XmlElement, cursor: &mut ParseCursor<'_>) -> Result<(), ParserError> {
        let (definition, args) = match self.tag_namespaces.resolve(&element.name) {
            ResolvedName::Unresolvable => {
                warn!(
                    tag = %element.name.qualified(),
                    "dropping element with an unresolvable namespace"
                );
                return Ok(());
            }
            ResolvedName::Namespaced { namespace, local } if namespace == HTML_TAG => {
                let definition = self
                    .registry
                    .get(HTML_TAG)
                    .ok_or_else(|| ParserError::UnknownTag(format!("{namespace}:{local}")))?;
                (definition, vec![Value::String(local)])
            }
            ResolvedName::Namespaced { namespace, local } => {
                return Err(ParserError::UnknownTag(format!("{namespace}:{local}")))
            }
            ResolvedName::Plain(tag) => self.lookup(&tag)?,
        };

        let id = cursor.tree.add_child(cursor.parent, Arc::clone(&definition))?;
        for arg in args {
            cursor.tree.push_constructor_arg(id, arg);
        }
        for attribute in &element.attributes {
            self.apply_attribute(&definition, id, attribute, cursor.tree)?;
        }

        let outer_parent = std::mem::replace(&mut cursor.parent, id);
        let result = self.parse_nodes(&element.children, cursor);
        cursor.parent = outer_parent;
        result?;

        cursor.tree.validate(id)
    }

    /// Definition for a plain tag, splitting a `tag.qualifier` form when the
    /// full name is not registered.
    fn lookup(&self, tag: &str) -> Result<(Arc<ComponentDefinition>, Vec<Value>), ParserError> {
        if let Some(definition) = self.registry.get(tag) {
            return Ok((definition, Vec::new()));
        }
        tag.split_once('.')
            .and_then(|(base, qualifier)| {
                self.registry
                    .get(base)
                    .map(|definition| (definition, vec![Value::String(qualifier.to_string())]))
            })
            .ok_or_else(|| ParserError::UnknownTag(tag.to_string()))
    }

    fn apply_attribute(
        &self,
        definition: &ComponentDefinition,
        id: ElementId,
        attribute: &XmlAttribute,
        tree: &mut PageTree,
    ) -> Result<(), ParserError> {
        match self.attribute_namespaces.resolve(&attribute.name) {
            ResolvedName::Unresolvable => Err(ParserError::UnresolvableAttribute(
                attribute.name.qualified(),
            )),
            ResolvedName::Plain(name) if definition.recognizes_attribute(&name) => {
                tree.set_attribute(id, name, attribute.value.clone());
                Ok(())
            }
            ResolvedName::Plain(name) => Err(ParserError::UnknownAttribute {
                tag: definition.tag().to_string(),
                attribute: name,
            }),
            namespaced @ ResolvedName::Namespaced { .. } => {
                tree.set_attribute(id, namespaced.normalized(), attribute.value.clone());
                Ok(())
            }
        }
    }

    fn process_text(&self, run: &str, cursor: &mut ParseCursor<'_>) -> Result<(), ParserError> {
        let text = trim_blank_lines(run);
        if text.is_empty() {
            return Ok(());
        }
        let parent = cursor.parent;
        let Some(definition) = cursor.tree.element(parent).definition().cloned() else {
            return Err(ParserError::TextNotAllowed(ROOT_TAG.to_string()));
        };
        match definition.content_handling() {
            ContentHandling::Reject => Err(ParserError::TextNotAllowed(definition.tag().to_string())),
            ContentHandling::Ignore => Ok(()),
            ContentHandling::AsAttribute => {
                cursor.tree.append_attribute(parent, CONTENT_ATTRIBUTE, text);
                Ok(())
            }
            ContentHandling::AsChild => {
                let text_definition = self
                    .registry
                    .get(TEXT_TAG)
                    .ok_or_else(|| ParserError::UnknownTag(TEXT_TAG.to_string()))?;
                let child = cursor.tree.add_child(parent, text_definition)?;
                cursor.tree.set_attribute(child, CONTENT_ATTRIBUTE, text);
                cursor.tree.validate(child)
            }
        }
    }

    fn process_instruction(
        &self,
        target: &str,
        data: &str,
        cursor: &mut ParseCursor<'_>,
    ) -> Result<(), ParserError> {
        let handler = self
            .instructions
            .get(target)
            .cloned()
            .ok_or_else(|| ParserError::UnrecognizedPi(target.to_string()))?;
        handler.process(self, cursor, data)
    }
}

/// Drops whitespace-only lines at both ends of a text run. An all-whitespace
/// run becomes empty.
fn trim_blank_lines(text: &str) -> &str {
    let Some(first) = text.find(|c: char| !c.is_whitespace()) else {
        return "";
    };
    let start = text[..first].rfind('\n').map_or(0, |newline| newline + 1);
    let last = text
        .rfind(|c: char| !c.is_whitespace())
        .unwrap_or(first);
    let end = text[last..]
        .find('\n')
        .map_or(text.len(), |offset| last + offset);
    text[start..end].trim_end_matches('\r')
}
