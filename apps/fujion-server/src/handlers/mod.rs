//! Request handlers keyed by the request `type` they serve.

mod event;
mod init;
mod log;

pub use event::EventRequestHandler;
pub use init::InitRequestHandler;
pub use log::LogRequestHandler;

use crate::request::ClientRequest;

pub trait RequestHandler: Send + Sync {
    fn request_type(&self) -> &str;

    fn handle(&self, request: &ClientRequest) -> anyhow::Result<()>;
}
