use std::{collections::HashMap, sync::Arc};

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{
    session::Session,
    sessions::{LifecycleError, SessionLifecycle},
};

/// Path prefix of resources scoped to a page: `_fujion_<page id>/<name>`.
pub const RESOURCE_PREFIX: &str = "_fujion_";

const GLOBAL_NAMESPACE: &str = "";

/// Generated content served under `/dynamic/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicResource {
    content_type: String,
    body: Bytes,
    etag: String,
}

impl DynamicResource {
    pub fn new(content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        let etag = format!("\"{}\"", hex::encode(Sha256::digest(&body)));
        Self {
            content_type: content_type.into(),
            body,
            etag,
        }
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn etag(&self) -> &str {
        &self.etag
    }
}

type Namespace = Arc<DashMap<String, DynamicResource>>;

/// Dynamic resources grouped by owning page. Page namespaces are dropped
/// when their session is destroyed.
#[derive(Debug, Default)]
pub struct DynamicResourceRegistry {
    namespaces: Mutex<HashMap<String, Namespace>>,
}

impl DynamicResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a resource and returns the path it is served under.
    pub fn register(
        &self,
        page_id: Option<&str>,
        name: &str,
        resource: DynamicResource,
    ) -> String {
        let namespace = page_id.unwrap_or(GLOBAL_NAMESPACE);
        self.namespace(namespace).insert(name.to_string(), resource);
        let path = match page_id {
            Some(page_id) => format!("{RESOURCE_PREFIX}{page_id}/{name}"),
            None => name.to_string(),
        };
        debug!(path = %path, "registered dynamic resource");
        path
    }

    pub fn get(&self, path: &str) -> Option<DynamicResource> {
        let (namespace, name) = split_resource_path(path).unwrap_or((GLOBAL_NAMESPACE, path));
        self.existing_namespace(namespace)?
            .get(name)
            .map(|entry| entry.value().clone())
    }

    pub fn unregister(&self, path: &str) -> Option<DynamicResource> {
        let (namespace, name) = split_resource_path(path).unwrap_or((GLOBAL_NAMESPACE, path));
        self.existing_namespace(namespace)?
            .remove(name)
            .map(|(_, resource)| resource)
    }

    /// Drops every resource registered for `page_id`. Returns how many there were.
    pub fn destroy_namespace(&self, page_id: &str) -> usize {
        let removed = self.namespaces.lock().remove(page_id);
        let count = removed.map(|namespace| namespace.len()).unwrap_or(0);
        if count > 0 {
            debug!(page_id, resources = count, "dropped dynamic resources");
        }
        count
    }

    pub fn namespace_count(&self) -> usize {
        self.namespaces.lock().len()
    }

    fn namespace(&self, key: &str) -> Namespace {
        let mut namespaces = self.namespaces.lock();
        Arc::clone(namespaces.entry(key.to_string()).or_default())
    }

    fn existing_namespace(&self, key: &str) -> Option<Namespace> {
        self.namespaces.lock().get(key).cloned()
    }
}

impl SessionLifecycle for DynamicResourceRegistry {
    fn on_session_destroy(&self, session: &Arc<Session>) -> Result<(), LifecycleError> {
        if let Some(page) = session.page() {
            self.destroy_namespace(page.id());
        }
        Ok(())
    }
}

/// Splits `_fujion_<page>/<name>` into its page id and resource name.
pub fn split_resource_path(path: &str) -> Option<(&str, &str)> {
    let rest = path.strip_prefix(RESOURCE_PREFIX)?;
    let (page_id, name) = rest.split_once('/')?;
    if page_id.is_empty() || name.contains('\n') {
        return None;
    }
    Some((page_id, name))
}
