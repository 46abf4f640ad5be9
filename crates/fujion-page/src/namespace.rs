use std::collections::{BTreeSet, HashMap};

use crate::xml::{NamespaceBinding, XmlName};

/// Default FSP namespace. Names in it resolve to plain names.
pub const FSP_NAMESPACE: &str = "http://www.fujion.org/schema/fsp";
/// Normalized name reported for anything that cannot be resolved.
pub const UNRESOLVABLE: &str = "unresolvable";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedName {
    Plain(String),
    Namespaced { namespace: String, local: String },
    Unresolvable,
}

impl ResolvedName {
    pub fn normalized(&self) -> String {
        match self {
            ResolvedName::Plain(local) => local.clone(),
            ResolvedName::Namespaced { namespace, local } => format!("{namespace}:{local}"),
            ResolvedName::Unresolvable => UNRESOLVABLE.to_string(),
        }
    }
}

/// Known namespaces keyed by URI and by short name.
#[derive(Debug, Clone, Default)]
pub struct NamespaceRegistry {
    by_uri: HashMap<String, String>,
    names: BTreeSet<String>,
}

impl NamespaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag namespaces: `html`.
    pub fn tags() -> Self {
        let mut registry = Self::new();
        registry.register("html");
        registry
    }

    /// Attribute namespaces: `on`, `attr`, `controller`.
    pub fn attributes() -> Self {
        let mut registry = Self::new();
        registry
            .register("on")
            .register("attr")
            .register("controller");
        registry
    }

    pub fn uri_for(name: &str) -> String {
        format!("{FSP_NAMESPACE}/{name}")
    }

    /// Registers `name` under the URI `http://www.fujion.org/schema/fsp/<name>`.
    pub fn register(&mut self, name: &str) -> &mut Self {
        self.register_uri(name, &Self::uri_for(name))
    }

    pub fn register_uri(&mut self, name: &str, uri: &str) -> &mut Self {
        self.by_uri.insert(uri.to_string(), name.to_string());
        self.names.insert(name.to_string());
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn name_for_uri(&self, uri: &str) -> Option<&str> {
        self.by_uri.get(uri).map(String::as_str)
    }

    pub fn resolve(&self, name: &XmlName) -> ResolvedName {
        let namespaced = |namespace: &str| ResolvedName::Namespaced {
            namespace: namespace.to_string(),
            local: name.local.clone(),
        };
        match &name.binding {
            NamespaceBinding::None => ResolvedName::Plain(name.local.clone()),
            NamespaceBinding::Uri(uri) if uri == FSP_NAMESPACE => {
                ResolvedName::Plain(name.local.clone())
            }
            NamespaceBinding::Uri(uri) => self
                .name_for_uri(uri)
                .map(namespaced)
                .unwrap_or(ResolvedName::Unresolvable),
            NamespaceBinding::Undeclared => match name.prefix.as_deref() {
                Some(prefix) if self.contains(prefix) => namespaced(prefix),
                _ => ResolvedName::Unresolvable,
            },
        }
    }
}
