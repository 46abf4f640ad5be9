use std::{
    fs,
    io::Read,
    path::{Component, Path, PathBuf},
};

use url::Url;

use crate::{error::PageSourceError, xml::XmlDocument};

/// Default extension of page resources.
pub const PAGE_EXTENSION: &str = "fsp";

/// Maps resource keys onto `file:` URLs beneath a web root directory.
#[derive(Debug, Clone)]
pub struct ResourceLocator {
    web_root: PathBuf,
}

impl ResourceLocator {
    pub fn new(web_root: impl AsRef<Path>) -> Result<Self, PageSourceError> {
        let web_root = fs::canonicalize(web_root.as_ref()).map_err(|err| {
            PageSourceError::InvalidLocation {
                key: web_root.as_ref().display().to_string(),
                reason: err.to_string(),
            }
        })?;
        Ok(Self { web_root })
    }

    pub fn web_root(&self) -> &Path {
        &self.web_root
    }

    /// Normalizes a key to the absolute URL of an existing resource. Keys are
    /// either `file:` URLs or paths relative to the web root.
    pub fn normalize(&self, key: &str) -> Result<Url, PageSourceError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(PageSourceError::InvalidLocation {
                key: key.to_string(),
                reason: "empty resource key".to_string(),
            });
        }
        match Url::parse(key) {
            Ok(url) => self.contain(key, self.file_path(&url)?),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let relative = Path::new(key.trim_start_matches('/'));
                if relative
                    .components()
                    .any(|component| matches!(component, Component::Prefix(_)))
                {
                    return Err(PageSourceError::OutsideRoot(key.to_string()));
                }
                self.contain(key, self.web_root.join(relative))
            }
            Err(err) => Err(PageSourceError::InvalidLocation {
                key: key.to_string(),
                reason: err.to_string(),
            }),
        }
    }

    /// Resolves `reference` against `base`, or against the web root without one.
    pub fn resolve(&self, base: Option<&Url>, reference: &str) -> Result<Url, PageSourceError> {
        match base {
            Some(base) if !reference.starts_with('/') => {
                let joined = base
                    .join(reference)
                    .map_err(|err| PageSourceError::InvalidLocation {
                        key: reference.to_string(),
                        reason: err.to_string(),
                    })?;
                self.normalize(joined.as_str())
            }
            _ => self.normalize(reference),
        }
    }

    /// Relative key of a normalized URL, as served beneath the web root.
    pub fn relative_key(&self, url: &Url) -> Option<String> {
        let path = url.to_file_path().ok()?;
        let relative = path.strip_prefix(&self.web_root).ok()?;
        Some(relative.to_string_lossy().replace('\\', "/"))
    }

    fn file_path(&self, url: &Url) -> Result<PathBuf, PageSourceError> {
        if url.scheme() != "file" {
            return Err(PageSourceError::UnsupportedScheme(url.scheme().to_string()));
        }
        url.to_file_path()
            .map_err(|()| PageSourceError::InvalidLocation {
                key: url.to_string(),
                reason: "not a local file path".to_string(),
            })
    }

    fn contain(&self, key: &str, path: PathBuf) -> Result<Url, PageSourceError> {
        let path = fs::canonicalize(&path).map_err(|_| PageSourceError::NotFound(key.to_string()))?;
        if !path.starts_with(&self.web_root) {
            return Err(PageSourceError::OutsideRoot(key.to_string()));
        }
        if !path.is_file() {
            return Err(PageSourceError::NotFound(key.to_string()));
        }
        Url::from_file_path(&path).map_err(|()| PageSourceError::InvalidLocation {
            key: key.to_string(),
            reason: "path cannot be expressed as a URL".to_string(),
        })
    }
}

/// Page markup plus the location it was loaded from, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSource {
    text: String,
    url: Option<Url>,
}

impl PageSource {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: None,
        }
    }

    pub fn from_reader(mut reader: impl Read) -> Result<Self, PageSourceError> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Ok(Self::from_text(text))
    }

    pub fn from_url(url: &Url) -> Result<Self, PageSourceError> {
        if url.scheme() != "file" {
            return Err(PageSourceError::UnsupportedScheme(url.scheme().to_string()));
        }
        let path = url
            .to_file_path()
            .map_err(|()| PageSourceError::NotFound(url.to_string()))?;
        let text = fs::read_to_string(&path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => PageSourceError::NotFound(url.to_string()),
            _ => PageSourceError::Io(err),
        })?;
        Ok(Self {
            text,
            url: Some(url.clone()),
        })
    }

    pub fn from_resource(locator: &ResourceLocator, key: &str) -> Result<Self, PageSourceError> {
        let url = locator.normalize(key)?;
        Self::from_url(&url)
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn document(&self) -> Result<XmlDocument, PageSourceError> {
        XmlDocument::parse(&self.text)
    }
}
