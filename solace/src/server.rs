//! HTTP boundary: `POST /chat` as server-sent events and `GET /health`.
//!
//! Every successful turn is framed as `data: {"content": ...}` events
//! followed by `data: [DONE]`. A failure after streaming began is sent as a
//! final `data: {"error": ..., "details": ...}` event with no terminator.

use std::convert::Infallible;
use std::pin::Pin;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{Stream, StreamExt};
use schat::{
    ChatError, ChatErrorKind, ChatEvent, ChatOrchestrator, ChatTurnRequest, ChatTurnStream,
};
use scommon::{TraceId, UserId};
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

pub const DONE_SENTINEL: &str = "[DONE]";

type SseStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: ChatOrchestrator,
}

pub fn router(orchestrator: ChatOrchestrator) -> Router {
    Router::new()
        .route("/chat", post(chat))
        .route("/health", get(health))
        .with_state(AppState { orchestrator })
}

#[derive(Debug, Deserialize)]
struct ChatBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    service: Option<String>,
}

#[derive(Debug, Serialize)]
struct ContentFrame<'a> {
    content: &'a str,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }
}

impl From<&ChatError> for ErrorBody {
    fn from(error: &ChatError) -> Self {
        Self {
            error: scrub_credentials(&error.message),
            details: error.details.as_deref().map(scrub_credentials),
        }
    }
}

async fn chat(State(state): State<AppState>, body: Bytes) -> Response {
    let Ok(body) = serde_json::from_slice::<ChatBody>(&body) else {
        return error_response(StatusCode::BAD_REQUEST, ErrorBody::new("Invalid JSON"));
    };

    let user_id = UserId::from_optional(body.user_id.as_deref());
    let trace_id = TraceId::new(Uuid::new_v4().to_string());
    let span = tracing::info_span!("chat", trace_id = %trace_id, user_id = %user_id);

    let mut request = ChatTurnRequest::new(user_id, body.message.unwrap_or_default());
    if let Some(service) = body.service {
        request = request.with_provider(service);
    }

    let started = state.orchestrator.stream_turn(request).instrument(span).await;
    match started {
        Ok(turn) => {
            let stream: SseStream = Box::pin(sse_frames(turn, trace_id));
            Sse::new(stream).into_response()
        }
        Err(error) => {
            let status = status_for(&error);
            error_response(status, ErrorBody::from(&error))
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    providers: Vec<&'static str>,
}

async fn health(State(state): State<AppState>) -> Json<HealthBody> {
    let providers = state
        .orchestrator
        .registry()
        .ids()
        .into_iter()
        .map(|provider| provider.as_str())
        .collect();

    Json(HealthBody {
        status: "ok",
        providers,
    })
}

fn sse_frames(
    mut turn: ChatTurnStream,
    trace_id: TraceId,
) -> impl Stream<Item = Result<Event, Infallible>> + Send {
    async_stream::stream! {
        while let Some(item) = turn.next().await {
            match item {
                Ok(ChatEvent::Fragment(text)) => {
                    yield Ok(json_event(&ContentFrame { content: &text }));
                }
                Ok(ChatEvent::TurnComplete(_)) => {
                    yield Ok(Event::default().data(DONE_SENTINEL));
                    break;
                }
                Err(error) => {
                    tracing::warn!(
                        trace_id = %trace_id,
                        error_kind = ?error.kind,
                        "turn failed mid-stream"
                    );
                    yield Ok(json_event(&ErrorBody::from(&error)));
                    break;
                }
            }
        }
    }
}

fn json_event<T: Serialize>(value: &T) -> Event {
    match serde_json::to_string(value) {
        Ok(data) => Event::default().data(data),
        Err(_) => Event::default().data(r#"{"error":"serialization failed"}"#),
    }
}

pub fn status_for(error: &ChatError) -> StatusCode {
    match error.kind {
        ChatErrorKind::Validation | ChatErrorKind::UnknownProvider => StatusCode::BAD_REQUEST,
        ChatErrorKind::Exhausted
        | ChatErrorKind::Provider
        | ChatErrorKind::Timeout
        | ChatErrorKind::Cancelled
        | ChatErrorKind::Store => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(status: StatusCode, body: ErrorBody) -> Response {
    (status, Json(body)).into_response()
}

/// Masks anything shaped like an API key. Provider error bodies sometimes
/// quote part of the rejected key back.
pub fn scrub_credentials(text: &str) -> String {
    let mut scrubbed = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("sk-") {
        let boundary = rest[..start]
            .chars()
            .next_back()
            .is_none_or(|ch| !ch.is_ascii_alphanumeric());
        scrubbed.push_str(&rest[..start]);
        let tail = &rest[start..];
        let end = tail
            .find(|ch: char| !(ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '*' | '.')))
            .unwrap_or(tail.len());

        if boundary {
            scrubbed.push_str("[redacted]");
        } else {
            scrubbed.push_str(&tail[..end]);
        }
        rest = &tail[end..];
    }

    scrubbed.push_str(rest);
    scrubbed
}
