use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};

use crate::auth::require_token;
use crate::error::BridgeError;
use crate::observability::log_exchange_complete;
use crate::protocol::anthropic::encoder::encode_anthropic_request;
use crate::protocol::anthropic::response_decoder::decode_anthropic_response;
use crate::protocol::anthropic::AnthropicResponse;
use crate::protocol::error_shapes::anthropic_error_message;
use crate::protocol::openai_chat::OpenAiChatRequest;
use crate::state::AppState;
use crate::stream::{translated_sse_stream, ExchangeMetrics, StreamTranslator};
use crate::util::unix_now_secs;

/// `POST /v1/chat/completions`.
pub async fn handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: bytes::Bytes,
) -> Response {
    match handler_inner(state, headers, body).await {
        Ok(response) => response,
        Err(err) => {
            tracing::debug!(error = %err, "chat completion failed");
            err.into_response()
        }
    }
}

async fn handler_inner(
    state: Arc<AppState>,
    headers: HeaderMap,
    body: bytes::Bytes,
) -> Result<Response, BridgeError> {
    let started = Instant::now();
    let request_seq = state.next_request_seq();
    state.authenticate(&headers)?;

    let request: OpenAiChatRequest = serde_json::from_slice(&body)
        .map_err(|err| BridgeError::InvalidRequest(format!("Invalid JSON body: {err}")))?;
    let stream = request.is_stream();
    let upstream_request = encode_anthropic_request(&request, &state.config.upstream)?;
    let upstream_body = serde_json::to_vec(&upstream_request)
        .map_err(|err| BridgeError::Internal(format!("Failed to encode request: {err}")))?;

    let token = require_token(state.token_provider.as_ref()).await?;
    let upstream_headers = state.upstream.request_headers(&token, stream)?;

    tracing::debug!(
        request_seq,
        client_model = %request.model,
        upstream_model = %upstream_request.model,
        stream,
        "forwarding chat completion"
    );

    let response = state
        .transport
        .post(
            state.upstream.messages_url(),
            upstream_headers,
            bytes::Bytes::from(upstream_body),
        )
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body_bytes = response
            .bytes()
            .await
            .map_err(|e| BridgeError::Transport(format!("Failed to read error body: {e}")))?;
        return Err(BridgeError::Upstream {
            status: status.as_u16(),
            message: anthropic_error_message(&body_bytes),
        });
    }

    if stream {
        let translator = StreamTranslator::new(upstream_request.model)
            .with_usage(state.config.features.stream_usage);
        let body_stream = translated_sse_stream(
            response.bytes_stream(),
            translator,
            move |metrics, completed| {
                log_exchange_complete(metrics, started.elapsed(), completed);
            },
        );
        return Ok(sse_ok_response(Body::from_stream(body_stream)));
    }

    let body_bytes = response
        .bytes()
        .await
        .map_err(|e| BridgeError::Transport(format!("Failed to read upstream body: {e}")))?;
    let upstream_response: AnthropicResponse = serde_json::from_slice(&body_bytes)
        .map_err(|e| BridgeError::Translation(format!("Malformed upstream response: {e}")))?;
    let created = unix_now_secs();
    let completion = decode_anthropic_response(&upstream_response, created);
    log_exchange_complete(
        &ExchangeMetrics::from_response(&upstream_response, created),
        started.elapsed(),
        true,
    );
    Ok(Json(completion).into_response())
}

fn sse_ok_response(body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = http::StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        http::header::CACHE_CONTROL,
        http::HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        http::header::CONNECTION,
        http::HeaderValue::from_static("keep-alive"),
    );
    response
}
