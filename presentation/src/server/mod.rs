//! HTTP surface
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/api/chat` | NDJSON stream of [`ChatEvent`](suna_application::ChatEvent)s |
//! | `GET` | `/api/threads/{id}/messages` | live messages, `?limit=N` |
//! | `GET` | `/api/threads/{id}/stats` | per-role counts |
//! | `DELETE` | `/api/threads/{id}` | thread and its messages |
//! | `GET` | `/api/tools` | registry stats and declarations |
//! | `GET` | `/health` | liveness |
//!
//! Chat responses carry `X-Thread-ID` and `X-Request-ID`; error bodies are
//! `{error, requestId}`.

mod error;
mod handlers;

pub use error::ApiError;
pub use handlers::ChatBody;

use axum::http::{HeaderValue, header};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use suna_application::ChatUseCase;
use suna_infrastructure::AppContext;
use tokio_util::sync::CancellationToken;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub const THREAD_ID_HEADER: &str = "x-thread-id";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub chat: ChatUseCase,
}

impl AppState {
    pub fn new(chat: ChatUseCase) -> Self {
        Self { chat }
    }
}

impl From<&AppContext> for AppState {
    fn from(ctx: &AppContext) -> Self {
        Self::new(ctx.chat.clone())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(handlers::chat))
        .route("/api/threads/{id}/messages", get(handlers::thread_messages))
        .route("/api/threads/{id}/stats", get(handlers::thread_stats))
        .route("/api/threads/{id}", axum::routing::delete(handlers::delete_thread))
        .route("/api/tools", get(handlers::tools))
        .route("/health", get(handlers::health))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` is cancelled; in-flight requests finish first.
pub async fn serve(
    state: AppState,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "HTTP server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
}
