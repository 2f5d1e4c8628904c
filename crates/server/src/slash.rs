use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::to_bytes,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use slashgate_core::errors::{ApplicationError, InterfaceError};
use slashgate_slack::event::{SIGNATURE_HEADER, TIMESTAMP_HEADER};
use slashgate_slack::{
    CommandDispatcher, EventContext, InboundEvent, RequestAuthenticator, ResponseEncoder,
};
use tracing::{info, warn};

const MAX_BODY_BYTES: usize = 64 * 1024;
const REQUEST_ID_HEADER: &str = "x-request-id";
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

#[derive(Clone)]
pub struct GatewayState {
    pub authenticator: Arc<RequestAuthenticator>,
    pub dispatcher: Arc<CommandDispatcher>,
    pub encoder: Arc<ResponseEncoder>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub fn router(state: GatewayState) -> Router {
    Router::new().route("/slash-command", post(slash_command)).with_state(state)
}

pub async fn slash_command(State(state): State<GatewayState>, request: Request) -> Response {
    let event = match inbound_event(request).await {
        Ok(event) => event,
        Err(error) => return error_response(error),
    };
    let correlation_id = event.correlation_id.clone();

    match handle(&state, &event).await {
        Ok(body) => {
            (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], body).into_response()
        }
        Err(error) => error_response(error.into_interface(correlation_id)),
    }
}

async fn handle(state: &GatewayState, event: &InboundEvent) -> Result<Vec<u8>, ApplicationError> {
    if !state.authenticator.applies(event) {
        warn!(
            event_name = "slash.request.stale",
            correlation_id = %event.correlation_id,
            "request timestamp missing or outside the replay window"
        );
        return Err(ApplicationError::Unauthorized);
    }

    let principal = state.authenticator.authenticate(event).await?;

    let context = EventContext::new(event.correlation_id.clone());
    let result = state.dispatcher.dispatch(&event.command, &event.text, &context).await?;
    let body = state.encoder.encode(&result)?;

    info!(
        event_name = "slash.request.completed",
        correlation_id = %event.correlation_id,
        principal = ?principal,
        fragments = result.len(),
        "slash command answered"
    );
    Ok(body)
}

fn error_response(error: InterfaceError) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        warn!(
            event_name = "slash.request.failed",
            correlation_id = %error.correlation_id(),
            error = %error,
            "slash command could not be answered"
        );
    }
    (status, Json(ErrorBody { error: error.user_message() })).into_response()
}

/// Builds the event from the request. An oversized or unreadable body is
/// rejected here, before any signature work is charged to the client.
async fn inbound_event(request: Request) -> Result<InboundEvent, InterfaceError> {
    let (parts, body) = request.into_parts();
    let headers = &parts.headers;

    let peer = parts.extensions.get::<ConnectInfo<SocketAddr>>().map(|info| info.0.ip().to_string());
    let client_ip = forwarded_for(headers).or(peer);
    let correlation_id = header_value(headers, REQUEST_ID_HEADER)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let content_type = header_value(headers, header::CONTENT_TYPE.as_str());

    let raw_body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes.to_vec(),
        Err(error) => {
            warn!(
                event_name = "slash.request.body_unreadable",
                correlation_id = %correlation_id,
                error = %error,
                "request body could not be read"
            );
            return Err(ApplicationError::Validation(format!(
                "request body could not be read (limit {MAX_BODY_BYTES} bytes)"
            ))
            .into_interface(correlation_id));
        }
    };

    Ok(InboundEvent::new(raw_body, content_type.as_deref())
        .with_signature_headers(
            header_value(headers, TIMESTAMP_HEADER),
            header_value(headers, SIGNATURE_HEADER),
        )
        .with_client_ip(client_ip)
        .with_correlation_id(correlation_id))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|value| value.to_str().ok()).map(str::to_owned)
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    header_value(headers, FORWARDED_FOR_HEADER)?
        .split(',')
        .next()
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .map(str::to_owned)
}
