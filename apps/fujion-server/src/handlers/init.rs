use std::sync::Arc;

use anyhow::Context;
use fujion_page::PageDefinitionCache;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::RequestHandler;
use crate::{
    request::ClientRequest,
    sessions::{LifecycleEvent, Sessions},
};

/// Materializes the page definition behind a freshly bound page.
pub struct InitRequestHandler {
    cache: Arc<PageDefinitionCache>,
    sessions: Arc<Sessions>,
}

impl InitRequestHandler {
    pub const REQUEST_TYPE: &'static str = "init";

    pub fn new(cache: Arc<PageDefinitionCache>, sessions: Arc<Sessions>) -> Self {
        Self { cache, sessions }
    }

    fn initialize(&self, request: &ClientRequest) -> anyhow::Result<()> {
        let page = request.require_page()?;
        if page.is_initialized() {
            debug!(page_id = %page.id(), "page already initialized");
            return Ok(());
        }

        let browser: Option<Map<String, Value>> = request.param("browser")?;
        if let Some(browser) = browser {
            page.set_browser_info(browser);
        }

        let definition = self
            .cache
            .get(page.src())
            .with_context(|| format!("unable to load page for {}", page.id()))?;
        let created = definition.materialize(&page, None)?;
        if let Err(err) = self
            .sessions
            .notify_lifecycle(request.session(), LifecycleEvent::Created)
        {
            for id in &created {
                page.discard_component(id);
            }
            return Err(err.into());
        }
        page.mark_initialized();

        info!(
            session_id = %request.session().id(),
            page_id = %page.id(),
            src = %page.src(),
            components = created.len(),
            "page initialized"
        );
        Ok(())
    }
}

impl RequestHandler for InitRequestHandler {
    fn request_type(&self) -> &str {
        Self::REQUEST_TYPE
    }

    fn handle(&self, request: &ClientRequest) -> anyhow::Result<()> {
        let synchronizer = request.session().synchronizer();
        synchronizer.start_queueing();
        let result = self.initialize(request);
        if result.is_err() {
            synchronizer.clear();
        }
        synchronizer.stop_queueing();
        result
    }
}
