//! Axum HTTP handlers for the web server.
//!
//! Each call to the MCP endpoint is one buffered exchange: the request is
//! wrapped in an [`HttpTransport`], the shared server runs a single
//! receive/dispatch/send cycle on it, and the recorded reply is returned.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::http::AppState;
use crate::mcp::server::ServerState;
use crate::mcp::transport::{HttpRequest, HttpResponse, HttpTransport};

/// Body of the `/health` response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the process serves requests.
    pub status: &'static str,
}

/// Liveness probe.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Runs one JSON-RPC exchange against the shared server session.
pub async fn mcp_endpoint(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = HttpRequest {
        method: method.as_str().to_string(),
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
        body: body.to_vec(),
    };
    let transport = HttpTransport::new(request).with_max_message_size(state.max_message_size);
    let exchange = transport.exchange();

    let server_state = {
        let mut server = state.server.lock().await;
        server.connect(Box::new(transport));
        server.step().await;
        server.disconnect();
        server.state()
    };

    if server_state == ServerState::ShuttingDown {
        tracing::info!("shutdown requested over HTTP");
        state.shutdown.notify_one();
    }

    exchange.response().into_response()
}

impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;
        if let Some(content_type) = self.content_type {
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        response
    }
}
