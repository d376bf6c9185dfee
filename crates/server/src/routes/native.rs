//! Engine routes: /generate, /count_tokens

use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Json, Router,
    extract::State,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::post,
};
use gemma_core::{FinishReason, GemmaContext, GemmaError, GenerateEvent, GenerateRequest};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tracing::error;

use super::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate", post(generate))
        .route("/count_tokens", post(count_tokens))
}

//  /generate

#[derive(Deserialize)]
struct GenerateBody {
    prompt: String,
    #[serde(default)]
    max_length: Option<usize>,
    #[serde(default)]
    stream: bool,
    /// Wall-clock budget in milliseconds.
    #[serde(default)]
    timeout_ms: Option<u64>,
}

#[derive(Serialize)]
struct GenerateResponse {
    content: String,
    finish_reason: String,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamChunk {
    Token { content: String },
    Done { finish_reason: String, text_bytes: usize },
    Error { message: String },
}

async fn generate(State(state): State<AppState>, Json(body): Json<GenerateBody>) -> Response {
    let cap = state.config().max_request_length;
    let max_length = body.max_length.unwrap_or(state.config().default_max_length);
    if max_length > cap {
        return ApiError::from(GemmaError::InvalidArgument(format!(
            "max_length {max_length} exceeds the server limit of {cap}"
        )))
        .into_response();
    }
    let mut request = GenerateRequest::new(body.prompt).with_max_length(max_length);
    if let Some(ms) = body.timeout_ms {
        request = request.with_timeout(Duration::from_millis(ms));
    }

    if body.stream {
        generate_stream(state.context(), request).into_response()
    } else {
        generate_once(state.context(), request).await.into_response()
    }
}

fn generate_stream(
    ctx: Arc<GemmaContext>,
    request: GenerateRequest,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel(64);

    tokio::task::spawn_blocking(move || {
        gemma_core::generate_blocking(&ctx, &request, tx);
    });

    let stream = ReceiverStream::new(rx).map(|event| {
        let chunk = match event {
            GenerateEvent::Token(content) => StreamChunk::Token { content },
            GenerateEvent::Done {
                finish_reason,
                text_bytes,
            } => StreamChunk::Done {
                finish_reason: finish_reason.to_string(),
                text_bytes,
            },
            GenerateEvent::Error(message) => {
                error!("Generation error: {message}");
                StreamChunk::Error { message }
            }
        };
        Ok(Event::default().data(serde_json::to_string(&chunk).unwrap_or_default()))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn generate_once(
    ctx: Arc<GemmaContext>,
    request: GenerateRequest,
) -> Result<Json<GenerateResponse>, ApiError> {
    let (content, finish_reason) = tokio::task::spawn_blocking(move || {
        let started = Instant::now();
        let mut finish_reason = FinishReason::Stop;
        let content = match request.timeout {
            Some(limit) => ctx.generate_with(&request, |_| {
                if started.elapsed() >= limit {
                    finish_reason = FinishReason::Timeout;
                    return false;
                }
                true
            })?,
            None => ctx.generate(&request)?,
        };
        Ok::<_, GemmaError>((content, finish_reason))
    })
    .await??;

    Ok(Json(GenerateResponse {
        content,
        finish_reason: finish_reason.to_string(),
    }))
}

//  /count_tokens

#[derive(Deserialize)]
struct CountTokensBody {
    content: String,
}

#[derive(Serialize)]
struct CountTokensResponse {
    count: usize,
}

async fn count_tokens(
    State(state): State<AppState>,
    Json(body): Json<CountTokensBody>,
) -> Result<Json<CountTokensResponse>, ApiError> {
    let ctx = state.context();
    let count = tokio::task::spawn_blocking(move || ctx.count_tokens(&body.content)).await??;
    Ok(Json(CountTokensResponse { count }))
}
