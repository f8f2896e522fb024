//! Integration tests for MCP protocol handling.
//!
//! These tests drive complete stdio sessions through the public API,
//! verifying the lifecycle, batch handling, error responses and log
//! forwarding as a client observes them on the wire.

use std::io::Cursor;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use serde_json::{json, Value};
use serial_test::serial;
use tokio::io::AsyncWrite;

use mcp_core_server::capabilities::{CalculatorTool, PingCapability, ToolsCapability};
use mcp_core_server::mcp::auth::AUTHORIZATION_TOKEN_ENV;
use mcp_core_server::mcp::logging::LogLevel;
use mcp_core_server::mcp::protocol::{JsonRpcMessage, RequestId};
use mcp_core_server::mcp::server::{McpServer, ServerState};
use mcp_core_server::mcp::transport::StdioTransport;

/// Writer whose bytes stay readable after the transport is boxed away.
#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl SharedSink {
    fn lines(&self) -> Vec<Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).expect("each output line is JSON"))
            .collect()
    }
}

impl AsyncWrite for SharedSink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn server() -> McpServer {
    let mut server = McpServer::new("integration", "1.2.3");
    server.add_capability(PingCapability);
    server.add_capability(ToolsCapability::new().with_tool(CalculatorTool::new()));
    server
}

fn connect(server: &mut McpServer, lines: &[&str]) -> SharedSink {
    let input: String = lines.iter().map(|line| format!("{line}\n")).collect();
    let sink = SharedSink::default();
    server.connect(Box::new(StdioTransport::from_parts(
        Cursor::new(input.into_bytes()),
        sink.clone(),
    )));
    sink
}

async fn run_session(server: &mut McpServer, lines: &[&str]) -> Vec<Value> {
    let sink = connect(server, lines);
    server.run().await.expect("server run");
    sink.lines()
}

const INITIALIZE: &str =
    r#"{"jsonrpc":"2.0","method":"initialize","params":{"protocolVersion":"2025-03-26"},"id":"1"}"#;

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[tokio::test]
async fn test_initialize_then_shutdown_over_stdio() {
    let mut server = server();
    let output = run_session(
        &mut server,
        &[INITIALIZE, r#"{"jsonrpc":"2.0","method":"shutdown","id":"2"}"#],
    )
    .await;

    assert_eq!(output.len(), 2);
    assert_eq!(output[0]["id"], "1");
    assert_eq!(output[0]["result"]["capabilities"]["logging"], json!({}));
    assert_eq!(output[0]["result"]["capabilities"]["completions"], json!({}));
    assert_eq!(output[0]["result"]["capabilities"]["tools"]["listChanged"], false);
    assert_eq!(output[0]["result"]["serverInfo"]["name"], "integration");
    assert_eq!(output[0]["result"]["serverInfo"]["version"], "1.2.3");
    assert_eq!(output[1], json!({"jsonrpc": "2.0", "id": "2", "result": {}}));
    assert_eq!(server.state(), ServerState::Shutdown);
}

#[tokio::test]
async fn test_messages_after_shutdown_are_not_read() {
    let mut server = server();
    let output = run_session(
        &mut server,
        &[
            INITIALIZE,
            r#"{"jsonrpc":"2.0","method":"shutdown","id":"2"}"#,
            r#"{"jsonrpc":"2.0","method":"ping","id":"3"}"#,
        ],
    )
    .await;

    assert_eq!(output.len(), 2);
}

#[tokio::test]
async fn test_eof_ends_session() {
    let mut server = server();
    let output = run_session(&mut server, &[INITIALIZE]).await;

    assert_eq!(output.len(), 1);
    assert_eq!(server.state(), ServerState::Shutdown);
}

#[tokio::test]
async fn test_request_before_initialize_is_rejected() {
    let mut server = server();
    let output = run_session(
        &mut server,
        &[r#"{"jsonrpc":"2.0","method":"tools/list","id":7}"#],
    )
    .await;

    assert_eq!(output.len(), 1);
    assert_eq!(output[0]["id"], 7);
    assert_eq!(output[0]["error"]["code"], -32600);
    assert_eq!(output[0]["error"]["message"], "Server not initialized");
    assert!(output[0].get("result").is_none());
}

// =============================================================================
// Dispatch Tests
// =============================================================================

#[tokio::test]
async fn test_tools_round_trip() {
    let mut server = server();
    let output = run_session(
        &mut server,
        &[
            INITIALIZE,
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            r#"{"jsonrpc":"2.0","method":"tools/list","id":2}"#,
            r#"{"jsonrpc":"2.0","method":"tools/call","id":3,"params":{"name":"calculator","arguments":{"operation":"multiply","a":6,"b":7}}}"#,
            r#"{"jsonrpc":"2.0","method":"tools/call","id":4,"params":{"name":"calculator","arguments":{"operation":"divide","a":1,"b":0}}}"#,
            r#"{"jsonrpc":"2.0","method":"tools/call","id":5,"params":{"name":"nope","arguments":{}}}"#,
        ],
    )
    .await;

    assert_eq!(output.len(), 5);
    assert_eq!(output[1]["result"]["tools"][0]["name"], "calculator");
    assert_eq!(
        output[1]["result"]["tools"][0]["inputSchema"]["required"],
        json!(["operation", "a", "b"])
    );
    assert_eq!(output[2]["result"]["content"][0]["text"], "42");
    assert_eq!(output[3]["result"]["isError"], true);
    assert_eq!(output[4]["error"]["code"], -32602);
}

#[tokio::test]
async fn test_batch_after_initialize() {
    let mut server = server();
    let output = run_session(
        &mut server,
        &[
            INITIALIZE,
            r#"[{"jsonrpc":"2.0","id":1,"method":"ping"},{"jsonrpc":"2.0","method":"ping"},{"jsonrpc":"2.0","id":2,"method":"does/not/exist"}]"#,
        ],
    )
    .await;

    assert_eq!(output.len(), 2);
    let batch = output[1].as_array().expect("batch response");
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0], json!({"jsonrpc": "2.0", "id": 1, "result": {}}));
    assert_eq!(batch[1]["id"], 2);
    assert_eq!(batch[1]["error"]["code"], -32601);
}

#[tokio::test]
async fn test_batch_with_malformed_member_answers_every_request() {
    let mut server = server();
    let output = run_session(
        &mut server,
        &[
            INITIALIZE,
            r#"[{"jsonrpc":"2.0","id":10,"method":"ping"},{"jsonrpc":"2.0","id":11},{"jsonrpc":"2.0","id":12,"method":"ping"}]"#,
        ],
    )
    .await;

    assert_eq!(output.len(), 2);
    let batch = output[1].as_array().expect("batch response");
    assert_eq!(batch.len(), 3);
    assert_eq!(batch[0], json!({"jsonrpc": "2.0", "id": 10, "result": {}}));
    assert_eq!(batch[1]["id"], 11);
    assert_eq!(batch[1]["error"]["code"], -32600);
    assert_eq!(batch[2], json!({"jsonrpc": "2.0", "id": 12, "result": {}}));
}

#[tokio::test]
async fn test_batch_with_non_object_member_is_rejected_whole() {
    let mut server = server();
    let output = run_session(
        &mut server,
        &[INITIALIZE, r#"[{"jsonrpc":"2.0","id":10,"method":"ping"},7]"#],
    )
    .await;

    // No id can be recovered from the unit, so nothing is sent for it.
    assert_eq!(output.len(), 1);
    assert_eq!(server.state(), ServerState::Shutdown);
}

#[tokio::test]
async fn test_notification_only_batch_produces_no_output() {
    let mut server = server();
    let output = run_session(
        &mut server,
        &[
            INITIALIZE,
            r#"[{"jsonrpc":"2.0","method":"ping"},{"jsonrpc":"2.0","method":"notifications/initialized"}]"#,
        ],
    )
    .await;

    assert_eq!(output.len(), 1);
}

#[tokio::test]
async fn test_empty_batch_ends_session() {
    let mut server = server();
    let output = run_session(
        &mut server,
        &[INITIALIZE, "[]", r#"{"jsonrpc":"2.0","method":"ping","id":9}"#],
    )
    .await;

    assert_eq!(output.len(), 1);
    assert_eq!(server.state(), ServerState::Shutdown);
}

// =============================================================================
// Malformed Input Tests
// =============================================================================

#[tokio::test]
async fn test_malformed_lines_do_not_end_session() {
    let mut server = server();
    let output = run_session(
        &mut server,
        &[
            "not valid json",
            r#"{"jsonrpc":"1.0","method":"ping","id":"old"}"#,
            "",
            INITIALIZE,
        ],
    )
    .await;

    // The parse error has no id and is only logged.
    assert_eq!(output.len(), 2);
    assert_eq!(output[0]["id"], "old");
    assert_eq!(output[0]["error"]["code"], -32600);
    assert_eq!(output[1]["id"], "1");
    assert!(output[1].get("result").is_some());
}

#[tokio::test]
async fn test_oversized_line_ends_session() {
    let mut server = server();
    let long_line = format!(
        r#"{{"jsonrpc":"2.0","method":"ping","id":1,"params":{{"pad":"{}"}}}}"#,
        "x".repeat(256)
    );
    let input = format!("{long_line}\n{INITIALIZE}\n");
    let sink = SharedSink::default();
    server.connect(Box::new(
        StdioTransport::from_parts(Cursor::new(input.into_bytes()), sink.clone())
            .with_max_message_size(128),
    ));

    server.run().await.expect("server run");

    assert!(sink.lines().is_empty());
    assert_eq!(server.state(), ServerState::Shutdown);
}

// =============================================================================
// Logging Tests
// =============================================================================

#[tokio::test]
async fn test_set_level_gates_forwarded_logs() {
    let mut server = server();
    let sink = connect(&mut server, &[]);

    server
        .log_message(LogLevel::Emergency, "before setLevel", None, None)
        .await;
    assert!(sink.lines().is_empty());

    let response = server.handle_message(&JsonRpcMessage::request(
        1,
        "logging/setLevel",
        Some(json!({"level": "debug"})),
    ));
    assert_eq!(
        response,
        Some(JsonRpcMessage::result(RequestId::Number(1), json!({})))
    );

    for level in LogLevel::ALL {
        server.log_message(level, "forwarded", Some("test"), None).await;
    }

    let lines = sink.lines();
    assert_eq!(lines.len(), LogLevel::ALL.len());
    for (line, level) in lines.iter().zip(LogLevel::ALL) {
        assert_eq!(line["method"], "notifications/message");
        assert_eq!(line["params"]["level"], level.as_str());
        assert!(line.get("id").is_none());
    }
}

// =============================================================================
// Authorization Tests
// =============================================================================

async fn initialize_with_token(env_token: Option<&str>) -> (McpServer, Value) {
    match env_token {
        Some(token) => std::env::set_var(AUTHORIZATION_TOKEN_ENV, token),
        None => std::env::remove_var(AUTHORIZATION_TOKEN_ENV),
    }

    let mut server = server();
    server.require_authorization("secret");
    let output = run_session(&mut server, &[INITIALIZE]).await;
    std::env::remove_var(AUTHORIZATION_TOKEN_ENV);

    assert_eq!(output.len(), 1);
    (server, output[0].clone())
}

#[tokio::test]
#[serial]
async fn test_authorization_missing_token() {
    let (_, response) = initialize_with_token(None).await;
    assert_eq!(response["error"]["code"], -32000);
}

#[tokio::test]
#[serial]
async fn test_authorization_wrong_token() {
    let (_, response) = initialize_with_token(Some("wrong")).await;
    assert_eq!(response["error"]["code"], -32001);
    assert_eq!(response["error"]["message"], "Authorization failed: Invalid token.");
}

#[tokio::test]
#[serial]
async fn test_authorization_matching_token() {
    let (server, response) = initialize_with_token(Some("secret")).await;
    assert!(response.get("result").is_some());
    // EOF after the handshake runs the final shutdown.
    assert_eq!(server.state(), ServerState::Shutdown);
}
