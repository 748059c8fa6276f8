//! Route handlers

use super::error::ApiError;
use super::{AppState, REQUEST_ID_HEADER, THREAD_ID_HEADER};
use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use std::convert::Infallible;
use suna_application::{ChatError, ChatEvent, ChatRequest, ChatStream, IncomingMessage};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Wire shape of `POST /api/chat`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    pub messages: Vec<IncomingMessage>,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl From<ChatBody> for ChatRequest {
    fn from(body: ChatBody) -> Self {
        ChatRequest {
            messages: body.messages,
            thread_id: body.thread_id,
            user_id: body.user_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<usize>,
}

/// Returned for any body that does not decode as [`ChatBody`].
pub const INVALID_BODY_MESSAGE: &str =
    "Invalid request body: expected a JSON object with a messages array";

fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// `POST /api/chat`: validate, then stream the turn as NDJSON.
pub async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request_id = new_request_id();

    let body: ChatBody = serde_json::from_slice(&body).map_err(|e| {
        warn!(request_id = %request_id, error = %e, "Malformed chat request");
        ApiError::bad_request(INVALID_BODY_MESSAGE, &request_id)
    })?;

    match state.chat.start(body.into(), request_id.clone()).await {
        Ok(stream) => Ok(stream_response(stream)),
        Err(ChatError::InvalidRequest(message)) => {
            warn!(request_id = %request_id, reason = %message, "Rejected chat request");
            Err(ApiError::bad_request(message, &request_id))
        }
        Err(ChatError::ThreadNotFound(thread_id)) => {
            warn!(request_id = %request_id, thread_id = %thread_id, "Chat on unknown thread");
            Err(ApiError::not_found("Thread not found", &request_id))
        }
        Err(e) => {
            error!(request_id = %request_id, error = %e, "Chat request failed");
            Err(ApiError::internal(&request_id))
        }
    }
}

fn event_line(event: &ChatEvent) -> Bytes {
    let mut line = serde_json::to_vec(event).unwrap_or_else(|_| {
        br#"{"type":"error","message":"event could not be encoded"}"#.to_vec()
    });
    line.push(b'\n');
    Bytes::from(line)
}

fn stream_response(stream: ChatStream) -> Response {
    let ChatStream {
        thread_id,
        request_id,
        events,
    } = stream;

    let body = futures::stream::unfold(events, |mut events| async move {
        events
            .recv()
            .await
            .map(|event| (Ok::<_, Infallible>(event_line(&event)), events))
    });

    (
        StatusCode::OK,
        [
            ("content-type", "application/x-ndjson".to_string()),
            (THREAD_ID_HEADER, thread_id),
            (REQUEST_ID_HEADER, request_id),
        ],
        Body::from_stream(body),
    )
        .into_response()
}

/// `GET /api/threads/{id}/messages?limit=N`
pub async fn thread_messages(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<Value>, ApiError> {
    let request_id = new_request_id();
    let threads = state.chat.threads();

    let found = threads.get_thread(&thread_id).await.map_err(|e| {
        error!(request_id = %request_id, thread_id = %thread_id, error = %e, "Thread lookup failed");
        ApiError::internal(&request_id)
    })?;
    if found.is_none() {
        return Err(ApiError::not_found("Thread not found", &request_id));
    }

    let messages = threads
        .get_messages(&thread_id, query.limit)
        .await
        .map_err(|e| {
            error!(request_id = %request_id, thread_id = %thread_id, error = %e, "Message listing failed");
            ApiError::internal(&request_id)
        })?;

    Ok(Json(json!({
        "threadId": thread_id,
        "messages": messages,
    })))
}

/// `GET /api/threads/{id}/stats`
pub async fn thread_stats(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let request_id = new_request_id();
    match state.chat.threads().get_thread_stats(&thread_id).await {
        Ok(Some(stats)) => Ok(Json(json!(stats))),
        Ok(None) => Err(ApiError::not_found("Thread not found", &request_id)),
        Err(e) => {
            error!(request_id = %request_id, thread_id = %thread_id, error = %e, "Thread stats failed");
            Err(ApiError::internal(&request_id))
        }
    }
}

/// `DELETE /api/threads/{id}`
pub async fn delete_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let request_id = new_request_id();
    match state.chat.threads().delete_thread(&thread_id).await {
        Ok(true) => {
            info!(request_id = %request_id, thread_id = %thread_id, "Thread deleted via API");
            Ok(Json(json!({ "deleted": true, "threadId": thread_id })))
        }
        Ok(false) => Err(ApiError::not_found("Thread not found", &request_id)),
        Err(e) => {
            error!(request_id = %request_id, thread_id = %thread_id, error = %e, "Thread deletion failed");
            Err(ApiError::internal(&request_id))
        }
    }
}

/// `GET /api/tools`: registry stats plus both declaration views.
pub async fn tools(State(state): State<AppState>) -> Json<Value> {
    let tools = state.chat.tools();
    Json(json!({
        "stats": tools.stats(),
        "functions": tools.function_schemas(),
        "tags": tools.tag_schemas(),
    }))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "functions": state.chat.tools().function_schemas().len(),
    }))
}
