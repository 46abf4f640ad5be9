use url::Url;

use crate::{
    element::{PageElement, PageTree},
    source::PageSource,
};

/// Markup and origin a definition was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSourceInfo {
    text: String,
    url: Option<Url>,
}

impl PageSourceInfo {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }
}

/// Immutable, validated result of parsing one page. Shared between
/// sessions and materialized any number of times.
#[derive(Debug, Clone)]
pub struct PageDefinition {
    tree: PageTree,
    source: PageSourceInfo,
}

impl PageDefinition {
    pub(crate) fn new(tree: PageTree, source: &PageSource) -> Self {
        Self {
            tree,
            source: PageSourceInfo {
                text: source.text().to_string(),
                url: source.url().cloned(),
            },
        }
    }

    pub fn tree(&self) -> &PageTree {
        &self.tree
    }

    pub fn root(&self) -> &PageElement {
        self.tree.root()
    }

    pub fn source(&self) -> &PageSourceInfo {
        &self.source
    }
}
