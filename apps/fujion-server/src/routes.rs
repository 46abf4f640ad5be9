use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    app::Application,
    socket::{ChannelSocket, Socket},
};

pub const WS_PATH: &str = "/ws";

pub fn build_router(app: Arc<Application>) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/page", get(page_handler))
        .route("/dynamic/*path", get(dynamic_handler))
        .route(WS_PATH, get(ws_handler))
        .with_state(app)
}

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
}

#[derive(Debug, Serialize)]
struct ApiErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "bad_request", message),
        };
        (status, Json(ApiErrorBody { error, message })).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    src: Option<String>,
}

/// Bootstrap document a browser needs to open its websocket.
#[derive(Debug, Serialize, Deserialize)]
pub struct PageBootstrap {
    pub pid: String,
    pub src: String,
    pub ws: String,
}

async fn health_handler(State(app): State<Arc<Application>>) -> impl IntoResponse {
    Json(json!({ "status": "ok", "sessions": app.sessions().len() }))
}

async fn metrics_handler(State(app): State<Arc<Application>>) -> Response {
    match app.render_metrics() {
        Some(body) => ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn page_handler(
    State(app): State<Arc<Application>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PageBootstrap>, ApiError> {
    let src = query
        .src
        .map(|src| src.trim().to_string())
        .filter(|src| !src.is_empty())
        .ok_or_else(|| ApiError::BadRequest("query parameter `src` is required".into()))?;
    app.cache()
        .get(&src)
        .map_err(|err| ApiError::NotFound(err.to_string()))?;

    let page = app.pages().create_page(src.clone());
    debug!(page_id = %page.id(), src = %src, "created page");
    Ok(Json(PageBootstrap {
        pid: page.id().to_string(),
        src,
        ws: WS_PATH.to_string(),
    }))
}

async fn dynamic_handler(
    State(app): State<Arc<Application>>,
    Path(path): Path<String>,
    headers: HeaderMap,
) -> Response {
    let Some(resource) = app.resources().get(&path) else {
        return ApiError::NotFound(format!("no dynamic resource at {path}")).into_response();
    };
    let not_modified = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.split(',').any(|tag| tag.trim() == resource.etag()))
        .unwrap_or(false);
    if not_modified {
        return (StatusCode::NOT_MODIFIED, [(header::ETAG, resource.etag().to_string())])
            .into_response();
    }
    (
        [
            (header::CONTENT_TYPE, resource.content_type().to_string()),
            (header::ETAG, resource.etag().to_string()),
        ],
        resource.body().clone(),
    )
        .into_response()
}

async fn ws_handler(State(app): State<Arc<Application>>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, app))
}

async fn handle_connection(socket: WebSocket, app: Arc<Application>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (channel, mut outbound) = ChannelSocket::new(Uuid::new_v4().to_string());
    let channel: Arc<dyn Socket> = Arc::new(channel);
    let handler = Arc::clone(app.websocket());
    let session = handler.after_connection_established(Arc::clone(&channel));
    let session_id = session.id().to_string();
    drop(session);

    let writer_session = session_id.clone();
    let writer = tokio::spawn(async move {
        while let Some(text) = outbound.recv().await {
            if ws_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        debug!(session_id = %writer_session, "writer task finished");
    });

    while let Some(message) = ws_rx.next().await {
        match message {
            Ok(Message::Text(text)) => handler.handle_text_message(channel.as_ref(), &text, true),
            Ok(Message::Binary(bytes)) => {
                handler.handle_binary_message(channel.as_ref(), &bytes, true)
            }
            Ok(Message::Close(frame)) => {
                info!(
                    session_id = %session_id,
                    reason = ?frame.map(|f| f.reason.to_string()),
                    "client closed websocket"
                );
                break;
            }
            Ok(_) => continue,
            Err(err) => {
                warn!(session_id = %session_id, error = %err, "error receiving message");
                break;
            }
        }
    }

    channel.close();
    handler.after_connection_closed(channel.as_ref());
    writer.abort();
}
