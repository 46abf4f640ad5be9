use tracing::{debug, error, info, trace, warn};

use super::RequestHandler;
use crate::request::ClientRequest;

/// Writes client-side log entries to the server log.
#[derive(Debug, Default)]
pub struct LogRequestHandler;

impl LogRequestHandler {
    pub const REQUEST_TYPE: &'static str = "log";
}

impl RequestHandler for LogRequestHandler {
    fn request_type(&self) -> &str {
        Self::REQUEST_TYPE
    }

    fn handle(&self, request: &ClientRequest) -> anyhow::Result<()> {
        let level = request.get_str("level").unwrap_or("info");
        let message = match request.get("message") {
            Some(value) => value
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string()),
            None => String::new(),
        };
        let session_id = request.session().id();
        let page_id = request.pid();

        match level.to_ascii_lowercase().as_str() {
            "error" | "fatal" => error!(session_id, page_id, client = true, "{message}"),
            "warn" | "warning" => warn!(session_id, page_id, client = true, "{message}"),
            "debug" => debug!(session_id, page_id, client = true, "{message}"),
            "trace" => trace!(session_id, page_id, client = true, "{message}"),
            _ => info!(session_id, page_id, client = true, "{message}"),
        }
        Ok(())
    }
}
