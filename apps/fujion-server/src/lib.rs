//! Fujion page server: binds browser pages to server-side sessions over a
//! websocket and drives them through FSP page definitions.

pub mod app;
pub mod config;
pub mod context;
pub mod executor;
pub mod handlers;
pub mod request;
pub mod resources;
pub mod routes;
pub mod session;
pub mod sessions;
pub mod socket;
pub mod synchronizer;
pub mod telemetry;
pub mod websocket;

pub use app::Application;
pub use config::{Cli, MessageLimits, ServerConfig};
pub use request::{ClientRequest, RequestError};
pub use resources::{DynamicResource, DynamicResourceRegistry};
pub use routes::build_router;
pub use session::{Session, SessionError, SessionListener, SessionState};
pub use sessions::{LifecycleError, LifecycleEvent, SessionInitError, SessionLifecycle, Sessions};
pub use socket::{ChannelSocket, Socket, SocketAttributes, SocketError};
pub use synchronizer::Synchronizer;
pub use websocket::{ProtocolError, WebSocketHandler};
