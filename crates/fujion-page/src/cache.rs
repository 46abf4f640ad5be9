use std::{path::Path, sync::Arc};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{
    error::{CacheError, PageSourceError, ParserError},
    page_definition::PageDefinition,
    parser::PageParser,
    source::{PageSource, ResourceLocator, PAGE_EXTENSION},
};

/// Outcome of the one-time precompilation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrecompileReport {
    pub compiled: usize,
    pub failed: usize,
}

/// Parsed page definitions keyed by normalized resource URL.
pub struct PageDefinitionCache {
    parser: Arc<PageParser>,
    locator: ResourceLocator,
    entries: DashMap<String, Arc<PageDefinition>>,
    precompile: Mutex<Option<Vec<String>>>,
}

impl PageDefinitionCache {
    pub fn new(parser: Arc<PageParser>, locator: ResourceLocator) -> Self {
        Self {
            parser,
            locator,
            entries: DashMap::new(),
            precompile: Mutex::new(Some(Vec::new())),
        }
    }

    pub fn locator(&self) -> &ResourceLocator {
        &self.locator
    }

    /// Returns the cached definition for `key`, parsing it on first use.
    /// Inline markup that names no resource is parsed directly and never
    /// cached. Keys outside the web root are refused.
    pub fn get(&self, key: &str) -> Result<Arc<PageDefinition>, CacheError> {
        let url = match self.locator.normalize(key) {
            Ok(url) => url,
            Err(PageSourceError::NotFound(_) | PageSourceError::InvalidLocation { .. })
                if is_inline_markup(key) =>
            {
                debug!("page key is inline markup; parsing uncached");
                return self.parse_inline(key).map(Arc::new);
            }
            Err(err) => {
                return Err(CacheError::Load {
                    key: key.to_string(),
                    source: err.into(),
                })
            }
        };

        if let Some(hit) = self.entries.get(url.as_str()) {
            return Ok(Arc::clone(hit.value()));
        }

        let definition = PageSource::from_url(&url)
            .map_err(ParserError::from)
            .and_then(|source| self.parser.parse(&source))
            .map_err(|source| CacheError::Load {
                key: key.to_string(),
                source,
            })?;
        let entry = self
            .entries
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(definition));
        debug!(url = %url, "cached page definition");
        Ok(Arc::clone(entry.value()))
    }

    pub fn is_cached(&self, key: &str) -> bool {
        self.locator
            .normalize(key)
            .map(|url| self.entries.contains_key(url.as_str()))
            .unwrap_or(false)
    }

    pub fn remove(&self, key: &str) -> Option<Arc<PageDefinition>> {
        let url = self.locator.normalize(key).ok()?;
        self.entries.remove(url.as_str()).map(|(_, definition)| definition)
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queues a page for compilation at application start. Returns `false`
    /// once the queue has already been consumed.
    pub fn add_precompile(&self, key: impl Into<String>) -> bool {
        match self.precompile.lock().as_mut() {
            Some(pending) => {
                pending.push(key.into());
                true
            }
            None => false,
        }
    }

    /// Compiles every queued page once. Later calls do nothing.
    pub fn on_application_ready(&self) -> PrecompileReport {
        let Some(pending) = self.precompile.lock().take() else {
            return PrecompileReport::default();
        };

        let mut report = PrecompileReport::default();
        for entry in pending {
            let key = with_default_extension(&entry);
            match self.get(&key) {
                Ok(_) => report.compiled += 1,
                Err(err) => {
                    warn!(page = %key, error = %err, "failed to precompile page");
                    report.failed += 1;
                }
            }
        }
        info!(
            compiled = report.compiled,
            failed = report.failed,
            "page precompilation finished"
        );
        report
    }

    fn parse_inline(&self, markup: &str) -> Result<PageDefinition, CacheError> {
        self.parser
            .parse(&PageSource::from_text(markup))
            .map_err(|source| CacheError::Load {
                key: markup.to_string(),
                source,
            })
    }
}

fn is_inline_markup(key: &str) -> bool {
    key.trim_start().starts_with('<')
}

fn with_default_extension(key: &str) -> String {
    if Path::new(key).extension().is_some() {
        key.to_string()
    } else {
        format!("{key}.{PAGE_EXTENSION}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_extension_is_added_only_when_missing() {
        assert_eq!(with_default_extension("pages/home"), "pages/home.fsp");
        assert_eq!(with_default_extension("pages/home.fsp"), "pages/home.fsp");
        assert_eq!(with_default_extension("v1.2/home"), "v1.2/home.fsp");
    }
}
