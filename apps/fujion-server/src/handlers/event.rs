use fujion_page::Event;
use serde_json::Value;
use tracing::trace;

use super::RequestHandler;
use crate::request::ClientRequest;

/// Queues a client event on the page; the engine drains the queue once the
/// handler returns.
#[derive(Debug, Default)]
pub struct EventRequestHandler;

impl EventRequestHandler {
    pub const REQUEST_TYPE: &'static str = "event";
}

impl RequestHandler for EventRequestHandler {
    fn request_type(&self) -> &str {
        Self::REQUEST_TYPE
    }

    fn handle(&self, request: &ClientRequest) -> anyhow::Result<()> {
        let page = request.require_page()?;
        let event_type: String = request.required("type")?;
        let target: String = request.required("target")?;
        let data = request.get("data").cloned().unwrap_or(Value::Null);

        let mut event = Event::new(event_type, target).with_data(data);
        if let Some(blob) = request.blob() {
            event = event.with_blob(blob.clone());
        }
        trace!(
            page_id = %page.id(),
            event_type = event.event_type(),
            target = event.target(),
            "queueing client event"
        );
        page.queue_event(event);
        Ok(())
    }
}
