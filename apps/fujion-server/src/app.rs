use std::sync::Arc;

use anyhow::{Context, Result};
use fujion_page::{
    ComponentRegistry, PageDefinitionCache, PageParser, PageRegistry, PrecompileReport,
    ResourceLocator,
};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{
    config::ServerConfig,
    handlers::{EventRequestHandler, InitRequestHandler, LogRequestHandler},
    resources::DynamicResourceRegistry,
    sessions::{LifecycleEvent, Sessions},
    telemetry::METRIC_PAGES_REAPED_TOTAL,
    websocket::WebSocketHandler,
};

/// Everything one server instance shares across connections.
pub struct Application {
    config: ServerConfig,
    components: Arc<ComponentRegistry>,
    cache: Arc<PageDefinitionCache>,
    pages: Arc<PageRegistry>,
    sessions: Arc<Sessions>,
    resources: Arc<DynamicResourceRegistry>,
    websocket: Arc<WebSocketHandler>,
    metrics: Option<PrometheusHandle>,
}

impl Application {
    pub fn new(config: ServerConfig) -> Result<Self> {
        let components = Arc::new(ComponentRegistry::with_core_components());
        let locator = ResourceLocator::new(&config.web_root).with_context(|| {
            format!("web root {} is not usable", config.web_root.display())
        })?;
        let parser = Arc::new(
            PageParser::new(Arc::clone(&components)).with_locator(locator.clone()),
        );
        let cache = Arc::new(PageDefinitionCache::new(parser, locator));
        for page in &config.precompile {
            cache.add_precompile(page.clone());
        }

        let pages = Arc::new(PageRegistry::new());
        let sessions = Arc::new(Sessions::new());
        let resources = Arc::new(DynamicResourceRegistry::new());
        sessions.add_lifecycle_listener(resources.clone());

        let websocket = Arc::new(WebSocketHandler::new(
            Arc::clone(&sessions),
            Arc::clone(&pages),
            config.limits,
        ));
        websocket.register_handler(Arc::new(InitRequestHandler::new(
            Arc::clone(&cache),
            Arc::clone(&sessions),
        )))?;
        websocket.register_handler(Arc::new(EventRequestHandler))?;
        websocket.register_handler(Arc::new(LogRequestHandler))?;

        Ok(Self {
            config,
            components,
            cache,
            pages,
            sessions,
            resources,
            websocket,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Runs the one-time page precompilation.
    pub fn ready(&self) -> PrecompileReport {
        self.cache.on_application_ready()
    }

    /// Discards pages whose websocket never connected within the page TTL.
    pub fn reap_unclaimed_pages(&self) -> usize {
        let reaped = self.pages.reap_unclaimed(self.config.page_ttl);
        if reaped > 0 {
            counter!(METRIC_PAGES_REAPED_TOTAL, reaped as u64);
            debug!(reaped, remaining = self.pages.len(), "reaped unclaimed pages");
        }
        reaped
    }

    /// Sweeps for unclaimed pages every `reap_interval`.
    pub fn spawn_page_reaper(self: &Arc<Self>) -> JoinHandle<()> {
        let app = Arc::clone(self);
        let mut interval = tokio::time::interval(self.config.reap_interval);
        tokio::spawn(async move {
            loop {
                interval.tick().await;
                app.reap_unclaimed_pages();
            }
        })
    }

    /// Destroys every live session.
    pub fn shutdown(&self) {
        let sessions = self.sessions.all();
        for session in &sessions {
            if let Err(err) = self
                .sessions
                .notify_lifecycle(session, LifecycleEvent::Destroyed)
            {
                warn!(
                    session_id = %session.id(),
                    error = %err,
                    "lifecycle listener failed on shutdown"
                );
            }
            session.socket().close();
            session.destroy();
            self.sessions.unregister(session.id());
        }
        info!(sessions = sessions.len(), "application shut down");
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn components(&self) -> &Arc<ComponentRegistry> {
        &self.components
    }

    pub fn cache(&self) -> &Arc<PageDefinitionCache> {
        &self.cache
    }

    pub fn pages(&self) -> &Arc<PageRegistry> {
        &self.pages
    }

    pub fn sessions(&self) -> &Arc<Sessions> {
        &self.sessions
    }

    pub fn resources(&self) -> &Arc<DynamicResourceRegistry> {
        &self.resources
    }

    pub fn websocket(&self) -> &Arc<WebSocketHandler> {
        &self.websocket
    }

    pub fn render_metrics(&self) -> Option<String> {
        self.metrics.as_ref().map(PrometheusHandle::render)
    }
}
