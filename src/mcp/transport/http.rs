//! HTTP request/response transport.
//!
//! One [`HttpTransport`] wraps one fully-buffered HTTP exchange: the first
//! `receive` yields the request body's messages, the next reports the
//! channel closed. Whatever the server sends is recorded on the shared
//! [`Exchange`], which the hosting web framework turns into the reply.
//!
//! JSON-RPC errors travel in the body with HTTP 200. Exchange rejections
//! use HTTP status codes (405, 415, 413), still carry a JSON-RPC error body,
//! and are reported to the server as [`Inbound::Idle`] because they concern
//! this exchange only. Server-initiated notifications have no place in a plain exchange
//! and are dropped; streaming responses (SSE) are not supported.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::mcp::protocol::{JsonRpcMessage, Payload};
use crate::mcp::transport::{
    decode_payload, encode_payload, Inbound, Transport, TransportError, DEFAULT_MAX_MESSAGE_SIZE,
};

/// Content type of every JSON body this transport produces.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Request content types accepted as carrying JSON-RPC.
const ACCEPTED_CONTENT_TYPES: [&str; 2] = ["application/json", "application/json-rpc"];

/// Body used when a response cannot be serialised.
const INTERNAL_ERROR_BODY: &str =
    r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error"}}"#;

/// The parts of an inbound HTTP request the transport needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method, e.g. `POST`.
    pub method: String,
    /// Value of the `Content-Type` header, if present.
    pub content_type: Option<String>,
    /// The fully-buffered body.
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Creates a `POST` request with an `application/json` body.
    #[must_use]
    pub fn post_json(body: impl Into<Vec<u8>>) -> Self {
        Self {
            method: "POST".to_string(),
            content_type: Some(JSON_CONTENT_TYPE.to_string()),
            body: body.into(),
        }
    }
}

/// The reply produced for one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` of the body, `None` for an empty body.
    pub content_type: Option<&'static str>,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    fn json(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: Some(JSON_CONTENT_TYPE),
            body: body.into(),
        }
    }

    /// An empty 202 reply, used when nothing needed answering.
    #[must_use]
    pub const fn accepted() -> Self {
        Self {
            status: 202,
            content_type: None,
            body: Vec::new(),
        }
    }

    fn for_error(status: u16, err: &TransportError) -> Self {
        let message = err
            .reply()
            .unwrap_or_else(|| JsonRpcMessage::error(None, err.code(), err.to_string()));
        match message.to_json() {
            Ok(body) => Self::json(status, body),
            Err(_) => Self::json(500, INTERNAL_ERROR_BODY),
        }
    }
}

#[derive(Debug, Default)]
struct ExchangeState {
    /// Set by `send`; always wins.
    response: Option<HttpResponse>,
    /// Set when the request was rejected or could not be decoded.
    fallback: Option<HttpResponse>,
}

/// Handle on the outcome of one HTTP exchange.
///
/// Clones share state, so the handle can be kept while the transport itself
/// is owned by the server.
#[derive(Debug, Clone, Default)]
pub struct Exchange(Arc<Mutex<ExchangeState>>);

impl Exchange {
    fn with_state<T>(&self, f: impl FnOnce(&mut ExchangeState) -> T) -> T {
        let mut state = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Returns the reply for the exchange.
    ///
    /// Precedence: a sent response, then a rejection, then `202 Accepted`.
    #[must_use]
    pub fn response(&self) -> HttpResponse {
        self.with_state(|state| {
            state
                .response
                .clone()
                .or_else(|| state.fallback.clone())
                .unwrap_or_else(HttpResponse::accepted)
        })
    }
}

/// A transport bound to a single buffered HTTP exchange.
#[derive(Debug)]
pub struct HttpTransport {
    request: Option<HttpRequest>,
    max_message_size: usize,
    exchange: Exchange,
    closed: bool,
}

impl HttpTransport {
    /// Creates a transport for one request.
    #[must_use]
    pub fn new(request: HttpRequest) -> Self {
        Self {
            request: Some(request),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            exchange: Exchange::default(),
            closed: false,
        }
    }

    /// Sets the largest accepted body in bytes.
    #[must_use]
    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Returns a handle on this exchange's outcome.
    #[must_use]
    pub fn exchange(&self) -> Exchange {
        self.exchange.clone()
    }

    /// Records the fallback reply for a failed exchange.
    fn reject(&self, status: u16, err: &TransportError) {
        tracing::debug!(status, error = %err, "rejecting HTTP exchange");
        let response = HttpResponse::for_error(status, err);
        self.exchange
            .with_state(|state| state.fallback = Some(response));
    }
}

/// Returns `true` if the header value names a JSON-RPC carrying media type.
fn is_json_content_type(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|value| value.split(';').next())
        .map(str::trim)
        .is_some_and(|mime| {
            ACCEPTED_CONTENT_TYPES
                .iter()
                .any(|accepted| mime.eq_ignore_ascii_case(accepted))
        })
}

#[async_trait]
impl Transport for HttpTransport {
    async fn receive(&mut self) -> Result<Inbound, TransportError> {
        let Some(request) = self.request.take() else {
            self.closed = true;
            return Ok(Inbound::Closed);
        };

        // Exchange-level rejections end this exchange only, never the session.
        if !request.method.eq_ignore_ascii_case("POST") {
            let err = TransportError::MethodNotAllowed {
                method: request.method,
            };
            self.reject(405, &err);
            return Ok(Inbound::Idle);
        }

        if !is_json_content_type(request.content_type.as_deref()) {
            let err = TransportError::UnsupportedMediaType {
                content_type: request.content_type.unwrap_or_default(),
            };
            self.reject(415, &err);
            return Ok(Inbound::Idle);
        }

        match decode_payload(&request.body, self.max_message_size) {
            Ok(Some(unit)) => Ok(Inbound::Messages(unit)),
            Ok(None) => Ok(Inbound::Idle),
            Err(err @ TransportError::MessageTooLarge { .. }) => {
                self.reject(413, &err);
                Ok(Inbound::Idle)
            }
            Err(err) => {
                self.reject(200, &err);
                Err(err)
            }
        }
    }

    async fn send(&mut self, payload: Payload) -> Result<(), TransportError> {
        if payload.is_notifications_only() {
            tracing::debug!("dropping server notification: no stream on plain HTTP exchange");
            return Ok(());
        }

        let response = match encode_payload(&payload) {
            Ok(body) => HttpResponse::json(200, body),
            Err(err) => {
                tracing::error!(error = %err, "failed to serialise HTTP response");
                HttpResponse::json(500, INTERNAL_ERROR_BODY)
            }
        };

        self.exchange
            .with_state(|state| state.response = Some(response));
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::mcp::protocol::RequestId;
    use crate::mcp::transport::Incoming;

    fn body_json(response: &HttpResponse) -> Value {
        serde_json::from_slice(&response.body).unwrap()
    }

    #[test]
    fn content_type_matching() {
        assert!(is_json_content_type(Some("application/json")));
        assert!(is_json_content_type(Some("Application/JSON; charset=utf-8")));
        assert!(is_json_content_type(Some("application/json-rpc")));
        assert!(!is_json_content_type(Some("text/plain")));
        assert!(!is_json_content_type(None));
    }

    #[tokio::test]
    async fn post_json_yields_messages_then_closed() {
        let mut transport =
            HttpTransport::new(HttpRequest::post_json(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#));

        assert!(matches!(
            transport.receive().await.unwrap(),
            Inbound::Messages(Incoming::Single(_))
        ));
        assert!(!transport.is_closed());
        assert_eq!(transport.receive().await.unwrap(), Inbound::Closed);
        assert!(transport.is_closed());
    }

    #[tokio::test]
    async fn empty_body_is_idle() {
        let mut transport = HttpTransport::new(HttpRequest::post_json(""));
        assert_eq!(transport.receive().await.unwrap(), Inbound::Idle);
        assert_eq!(transport.exchange().response(), HttpResponse::accepted());
    }

    #[tokio::test]
    async fn non_post_is_rejected_with_405() {
        let mut transport = HttpTransport::new(HttpRequest {
            method: "GET".to_string(),
            content_type: None,
            body: Vec::new(),
        });
        let exchange = transport.exchange();

        assert_eq!(transport.receive().await.unwrap(), Inbound::Idle);

        let response = exchange.response();
        assert_eq!(response.status, 405);
        assert_eq!(body_json(&response)["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn wrong_content_type_is_rejected_with_415() {
        let mut transport = HttpTransport::new(HttpRequest {
            method: "POST".to_string(),
            content_type: Some("text/plain".to_string()),
            body: b"{}".to_vec(),
        });
        let exchange = transport.exchange();

        assert_eq!(transport.receive().await.unwrap(), Inbound::Idle);
        assert_eq!(exchange.response().status, 415);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected_with_413() {
        let mut transport =
            HttpTransport::new(HttpRequest::post_json(vec![b' '; 64])).with_max_message_size(16);
        let exchange = transport.exchange();

        assert_eq!(transport.receive().await.unwrap(), Inbound::Idle);
        let response = exchange.response();
        assert_eq!(response.status, 413);
        assert_eq!(body_json(&response)["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn parse_error_is_answered_in_body() {
        let mut transport = HttpTransport::new(HttpRequest::post_json("{not json"));
        let exchange = transport.exchange();

        assert!(transport.receive().await.is_err());
        let response = exchange.response();
        assert_eq!(response.status, 200);
        let body = body_json(&response);
        assert_eq!(body["error"]["code"], -32700);
        assert_eq!(body["id"], Value::Null);
    }

    #[tokio::test]
    async fn send_records_json_response() {
        let mut transport = HttpTransport::new(HttpRequest::post_json("{}"));
        let exchange = transport.exchange();

        transport
            .send(Payload::Single(JsonRpcMessage::result(
                RequestId::Number(1),
                json!({"ok": true}),
            )))
            .await
            .unwrap();

        let response = exchange.response();
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, Some(JSON_CONTENT_TYPE));
        assert_eq!(body_json(&response)["result"]["ok"], true);
    }

    #[tokio::test]
    async fn sent_response_supersedes_rejection() {
        let mut transport =
            HttpTransport::new(HttpRequest::post_json(r#"{"jsonrpc":"1.0","id":3,"method":"x"}"#));
        let exchange = transport.exchange();

        let err = transport.receive().await.unwrap_err();
        transport
            .send(Payload::Single(err.reply().unwrap()))
            .await
            .unwrap();

        let body = body_json(&exchange.response());
        assert_eq!(body["id"], 3);
        assert_eq!(body["error"]["code"], -32600);
    }

    #[tokio::test]
    async fn notifications_are_dropped() {
        let mut transport = HttpTransport::new(HttpRequest::post_json("{}"));
        let exchange = transport.exchange();

        transport
            .send(Payload::Single(JsonRpcMessage::notification(
                "notifications/message",
                None,
            )))
            .await
            .unwrap();

        assert_eq!(exchange.response(), HttpResponse::accepted());
    }
}
