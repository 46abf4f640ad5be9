//! FSP page pipeline.
//!
//! Markup flows through [`PageSource`] into an [`XmlDocument`], is parsed by
//! [`PageParser`] against the [`ComponentRegistry`] into an immutable
//! [`PageDefinition`], cached by [`PageDefinitionCache`], and finally
//! materialized into the component tree of a live [`Page`].

mod cache;
mod component;
mod definition;
mod element;
mod error;
mod materialize;
mod namespace;
mod page;
mod page_definition;
mod parser;
mod registry;
mod source;
mod xml;

pub use cache::{PageDefinitionCache, PrecompileReport};
pub use component::{Component, PropertyValue};
pub use definition::{
    AttributeKind, AttributeSpec, Cardinality, CardinalityViolation, ComponentDefinition,
    ComponentDefinitionBuilder, ContentHandling, BASE_ATTRIBUTES, CONTENT_ATTRIBUTE, ROOT_TAG,
    TEXT_TAG,
};
pub use element::{ElementId, PageElement, PageTree, TagLibrary};
pub use error::{
    CacheError, EventError, MaterializeError, PageSourceError, ParserError, RegistryError,
};
pub use namespace::{NamespaceRegistry, ResolvedName, FSP_NAMESPACE, UNRESOLVABLE};
pub use page::{Event, EventHandler, InvocationSink, Page, PageRegistry};
pub use page_definition::{PageDefinition, PageSourceInfo};
pub use parser::{
    ImportHandler, PageParser, ParseCursor, ProcessingInstructionHandler, TagLibraryHandler,
    MAX_IMPORT_DEPTH,
};
pub use registry::{ComponentRegistry, HTML_TAG, PAGE_TAG};
pub use source::{PageSource, ResourceLocator, PAGE_EXTENSION};
pub use xml::{NamespaceBinding, XmlAttribute, XmlDocument, XmlElement, XmlName, XmlNode};
