//! MCP server core: lifecycle state machine and message dispatch.
//!
//! This module implements the MCP server lifecycle:
//!
//! 1. **Initialisation**: optional authorization, capability aggregation and
//!    capability start-up
//! 2. **Operation**: routing requests to the first capability that claims them
//! 3. **Shutdown**: capability tear-down and loop exit
//!
//! Built-in methods are `initialize`, `shutdown` and `logging/setLevel`.
//! Before `initialize` succeeds every other method is answered with
//! `INVALID_REQUEST` ("Server not initialized").
//!
//! # Loop
//!
//! Each [`McpServer::step`] performs one `receive → dispatch all → send`
//! cycle. Messages in a batch are handled strictly in order, and the
//! responses (notifications contribute none) are sent back as one unit.
//! A malformed batch element is answered in its position when its ID is
//! known.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, warn};

use crate::error::McpError;
use crate::mcp::auth;
use crate::mcp::capability::Capability;
use crate::mcp::logging::{log_notification, LogLevel};
use crate::mcp::protocol::{JsonRpcMessage, Payload, MCP_PROTOCOL_VERSION, SERVER_NAME};
use crate::mcp::transport::{BatchEntry, Inbound, Transport, TransportError};

/// Default `instructions` string returned from `initialize`.
pub const DEFAULT_INSTRUCTIONS: &str =
    "Inspect the advertised capabilities to discover what this server offers.";

/// Server state in the MCP lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for a successful `initialize`.
    Uninitialized,
    /// Ready for normal operation.
    Initialized,
    /// `shutdown` received or the transport failed; the loop is ending.
    ShuttingDown,
    /// Terminal.
    Shutdown,
}

/// Whether the main loop should keep polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Poll the transport again.
    Continue,
    /// Leave the loop.
    Stop,
}

/// Server information for the initialisation response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// The MCP server.
pub struct McpServer {
    /// Reported in `serverInfo`.
    info: ServerInfo,
    /// Reported in the `initialize` result.
    instructions: String,
    /// Current lifecycle state.
    state: ServerState,
    /// Registered capabilities, in registration order.
    capabilities: Vec<Box<dyn Capability>>,
    /// First registration index for each capability name.
    capability_index: HashMap<String, usize>,
    /// The bound transport.
    transport: Option<Box<dyn Transport>>,
    /// Threshold set by `logging/setLevel`; `None` disables forwarding.
    client_log_level: Option<LogLevel>,
    /// Expected shared secret, when authorization is required.
    authorization: Option<String>,
    /// Set once `initialize` has succeeded.
    handshake_completed: bool,
    /// Set once capability `shutdown` hooks have been run.
    capabilities_released: bool,
}

impl Default for McpServer {
    fn default() -> Self {
        let info = ServerInfo::default();
        Self::new(info.name, info.version)
    }
}

impl McpServer {
    /// Creates a server reporting the given name and version.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: ServerInfo {
                name: name.into(),
                version: version.into(),
            },
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            state: ServerState::Uninitialized,
            capabilities: Vec::new(),
            capability_index: HashMap::new(),
            transport: None,
            client_log_level: None,
            authorization: None,
            handshake_completed: false,
            capabilities_released: false,
        }
    }

    /// Sets the `instructions` string returned from `initialize`.
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    /// Returns the current server state.
    #[must_use]
    pub const fn state(&self) -> ServerState {
        self.state
    }

    /// Returns the `instructions` string returned from `initialize`.
    #[must_use]
    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Returns the reported server information.
    #[must_use]
    pub const fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Returns the log level requested by the client, if any.
    #[must_use]
    pub const fn client_log_level(&self) -> Option<LogLevel> {
        self.client_log_level
    }

    /// Appends a capability.
    ///
    /// Registration order is initialisation order, shutdown order and
    /// dispatch priority. Duplicate names are allowed; name lookup returns
    /// the first.
    pub fn add_capability(&mut self, capability: impl Capability + 'static) {
        let index = self.capabilities.len();
        self.capability_index
            .entry(capability.name().to_string())
            .or_insert(index);
        debug!(capability = capability.name(), index, "capability registered");
        self.capabilities.push(Box::new(capability));
    }

    /// Returns the first capability registered under `name`.
    #[must_use]
    pub fn capability(&self, name: &str) -> Option<&dyn Capability> {
        self.capability_index
            .get(name)
            .map(|&index| self.capabilities[index].as_ref())
    }

    /// Returns capability names in registration order.
    #[must_use]
    pub fn capability_names(&self) -> Vec<&str> {
        self.capabilities.iter().map(|c| c.name()).collect()
    }

    /// Requires clients to present `token` through `MCP_AUTHORIZATION_TOKEN`
    /// during `initialize`.
    pub fn require_authorization(&mut self, token: impl Into<String>) {
        self.authorization = Some(token.into());
    }

    /// Binds the transport used by [`Self::run`] and for log forwarding.
    pub fn connect(&mut self, transport: Box<dyn Transport>) {
        if self.transport.is_some() {
            debug!("replacing connected transport");
        }
        self.transport = Some(transport);
    }

    /// Unbinds and returns the current transport.
    pub fn disconnect(&mut self) -> Option<Box<dyn Transport>> {
        self.transport.take()
    }

    /// Runs the main loop until shutdown or until the transport closes, then
    /// performs the final shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotConnected`] if no transport is bound.
    /// Transport failures during the loop are logged, not returned.
    pub async fn run(&mut self) -> Result<(), TransportError> {
        if self.transport.is_none() {
            return Err(TransportError::NotConnected);
        }

        info!(server = %self.info.name, "MCP server loop started");
        while self.step().await == Flow::Continue {}
        self.finish();
        info!(server = %self.info.name, "MCP server loop finished");
        Ok(())
    }

    /// Performs one receive/dispatch/send cycle.
    pub async fn step(&mut self) -> Flow {
        let Some(transport) = self.transport.as_mut() else {
            error!("step called without a connected transport");
            return Flow::Stop;
        };

        let unit = match transport.receive().await {
            Ok(Inbound::Messages(unit)) => unit,
            Ok(Inbound::Idle) => return Flow::Continue,
            Ok(Inbound::Closed) => {
                info!("transport closed");
                return Flow::Stop;
            }
            Err(err) => return self.handle_transport_error(err).await,
        };

        // An empty batch on an open transport ends the session.
        if unit.is_batch() && unit.is_empty() {
            warn!("received an empty batch; ending session");
            return Flow::Stop;
        }

        let is_batch = unit.is_batch();
        let mut responses = Vec::new();
        for entry in unit.into_entries() {
            if let Some(response) = self.handle_entry(entry) {
                responses.push(response);
            }
        }

        let outbound = if is_batch {
            (!responses.is_empty()).then_some(Payload::Batch(responses))
        } else {
            responses.pop().map(Payload::Single)
        };

        if let Some(outbound) = outbound {
            if let Err(err) = self.send(outbound).await {
                if self.handle_transport_error(err).await == Flow::Stop {
                    return Flow::Stop;
                }
            }
        }

        if self.state == ServerState::Initialized || self.state == ServerState::Uninitialized {
            Flow::Continue
        } else {
            Flow::Stop
        }
    }

    /// Final, idempotent shutdown.
    ///
    /// Runs capability `shutdown` hooks if the session was initialised and
    /// they have not run yet, then enters the terminal state.
    pub fn finish(&mut self) {
        if self.state == ServerState::Shutdown {
            return;
        }
        if self.handshake_completed {
            if let Err(err) = self.release_capabilities() {
                error!(error = %err, "capability shutdown failed");
            }
        }
        self.state = ServerState::Shutdown;
        info!("server shut down");
    }

    /// Handles one decoded batch element.
    fn handle_entry(&mut self, entry: BatchEntry) -> Option<JsonRpcMessage> {
        match entry {
            Ok(message) => self.handle_message(&message),
            Err(err) => {
                warn!(error = %err, "discarding malformed batch element");
                err.id().is_some().then(|| err.to_response())
            }
        }
    }

    /// Handles one message and returns its response, if any.
    ///
    /// Failures become error responses for requests, and every request gets
    /// exactly one response. For notifications failures are logged and
    /// dropped, and a notification never gets a response.
    pub fn handle_message(&mut self, message: &JsonRpcMessage) -> Option<JsonRpcMessage> {
        let method = message.method().unwrap_or_default();
        debug!(method, id = ?message.id(), "handling message");

        match self.dispatch(message) {
            Ok(response) => match message {
                JsonRpcMessage::Request { id, .. } => response.or_else(|| {
                    error!(method, "capability produced no response for request");
                    Some(
                        McpError::internal("capability produced no response for request")
                            .into_response(id.clone()),
                    )
                }),
                _ => {
                    if response.is_some() {
                        warn!(method, "discarding response produced for a notification");
                    }
                    None
                }
            },
            Err(err) => match message {
                JsonRpcMessage::Request { id, .. } => {
                    debug!(method, code = err.code().code(), error = %err, "request failed");
                    Some(err.into_response(id.clone()))
                }
                _ => {
                    warn!(method, error = %err, "notification failed");
                    None
                }
            },
        }
    }

    /// Logs locally and, when the client asked for it, forwards the message
    /// as a `notifications/message` notification.
    ///
    /// Forwarding requires a connected transport, a client-set level and a
    /// `level` at or above that threshold. Forwarding failures are only
    /// logged locally.
    pub async fn log_message(
        &mut self,
        level: LogLevel,
        message: &str,
        logger: Option<&str>,
        data: Option<Value>,
    ) {
        emit_local(level, message, logger);

        let Some(threshold) = self.client_log_level else {
            return;
        };
        if !level.passes(threshold) {
            return;
        }
        let Some(transport) = self.transport.as_mut() else {
            return;
        };

        let notification = log_notification(level, message, logger, data);
        if let Err(err) = transport.send(Payload::Single(notification)).await {
            warn!(error = %err, "failed to forward log notification");
        }
    }

    async fn send(&mut self, payload: Payload) -> Result<(), TransportError> {
        self.transport
            .as_mut()
            .ok_or(TransportError::NotConnected)?
            .send(payload)
            .await
    }

    /// Decides how the loop continues after a transport failure.
    async fn handle_transport_error(&mut self, err: TransportError) -> Flow {
        if let TransportError::Message(ref message_error) = err {
            warn!(error = %message_error, "discarding malformed input");
            if let Some(reply) = err.reply() {
                if let Err(send_err) = self.send(Payload::Single(reply)).await {
                    return self.channel_failure(send_err).await;
                }
            }
            return Flow::Continue;
        }

        self.channel_failure(err).await
    }

    /// Handles a failure of the channel itself rather than of its content.
    async fn channel_failure(&mut self, err: TransportError) -> Flow {
        self.log_message(
            LogLevel::Critical,
            &format!("Transport error: {err}"),
            Some("transport"),
            None,
        )
        .await;

        if err.is_fatal() {
            if self.state != ServerState::Shutdown {
                self.state = ServerState::ShuttingDown;
            }
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    fn dispatch(&mut self, message: &JsonRpcMessage) -> Result<Option<JsonRpcMessage>, McpError> {
        let Some(method) = message.method() else {
            return Err(McpError::invalid_request("missing method"));
        };

        if method == "shutdown" {
            return self.handle_shutdown(message);
        }

        match self.state {
            ServerState::Initialized => match method {
                "initialize" => Err(McpError::invalid_request("Server already initialized")),
                "logging/setLevel" => self.handle_set_level(message),
                _ => self.route(message),
            },
            ServerState::Uninitialized => match method {
                "initialize" => self.handle_initialize(message),
                "logging/setLevel" => self.handle_set_level(message),
                _ => Err(McpError::invalid_request("Server not initialized")),
            },
            ServerState::ShuttingDown | ServerState::Shutdown => match method {
                "logging/setLevel" => self.handle_set_level(message),
                _ => Err(McpError::invalid_request("Server not initialized")),
            },
        }
    }

    /// Handles `shutdown`, allowed in every state.
    fn handle_shutdown(
        &mut self,
        message: &JsonRpcMessage,
    ) -> Result<Option<JsonRpcMessage>, McpError> {
        info!("shutdown requested");
        if self.state != ServerState::Shutdown {
            self.state = ServerState::ShuttingDown;
        }
        self.release_capabilities()?;
        Ok(message
            .id()
            .map(|id| JsonRpcMessage::result(id.clone(), json!({}))))
    }

    /// Runs every capability's `shutdown` hook once, stopping at the first
    /// failure.
    fn release_capabilities(&mut self) -> Result<(), McpError> {
        if self.capabilities_released {
            return Ok(());
        }
        self.capabilities_released = true;

        for capability in &mut self.capabilities {
            capability.shutdown().map_err(|err| {
                error!(capability = capability.name(), error = %err, "capability shutdown failed");
                McpError::internal(err.to_string())
            })?;
        }
        Ok(())
    }

    /// Handles the `initialize` handshake.
    fn handle_initialize(
        &mut self,
        message: &JsonRpcMessage,
    ) -> Result<Option<JsonRpcMessage>, McpError> {
        if let Some(expected) = self.authorization.as_deref() {
            auth::check_token(Some(expected), auth::token_from_env().as_deref()).map_err(|err| {
                warn!(error = %err, "initialize rejected");
                err
            })?;
        }

        let client_version = message
            .param("protocolVersion")
            .and_then(Value::as_str)
            .filter(|version| !version.trim().is_empty())
            .ok_or_else(|| McpError::invalid_params("Missing required parameter: protocolVersion"))?;

        let client_name = message
            .param("clientInfo")
            .and_then(|info| info.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!(client = client_name, client_version, "initialize requested");

        let mut capabilities = Map::new();
        for capability in &self.capabilities {
            capabilities.extend(capability.capabilities());
        }
        capabilities.insert("logging".to_string(), json!({}));
        capabilities.insert("completions".to_string(), json!({}));

        for capability in &mut self.capabilities {
            capability.initialize().map_err(|err| {
                error!(capability = capability.name(), error = %err, "capability initialisation failed");
                McpError::internal(err.to_string())
            })?;
        }

        self.state = ServerState::Initialized;
        self.handshake_completed = true;
        info!(capabilities = self.capabilities.len(), "server initialised");

        let result = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": capabilities,
            "serverInfo": self.info,
            "instructions": self.instructions,
        });
        Ok(message.id().map(|id| JsonRpcMessage::result(id.clone(), result)))
    }

    /// Handles `logging/setLevel`.
    fn handle_set_level(
        &mut self,
        message: &JsonRpcMessage,
    ) -> Result<Option<JsonRpcMessage>, McpError> {
        let level = message
            .param("level")
            .and_then(Value::as_str)
            .and_then(|name| name.parse::<LogLevel>().ok())
            .ok_or_else(|| {
                McpError::invalid_params(format!(
                    "Invalid log level. Valid values: {}",
                    LogLevel::valid_names()
                ))
            })?;

        self.client_log_level = Some(level);
        info!(%level, "client log level set");
        Ok(message
            .id()
            .map(|id| JsonRpcMessage::result(id.clone(), json!({}))))
    }

    /// Routes a method to the first capability that claims it.
    fn route(&mut self, message: &JsonRpcMessage) -> Result<Option<JsonRpcMessage>, McpError> {
        let method = message.method().unwrap_or_default();

        let Some(capability) = self
            .capabilities
            .iter_mut()
            .find(|capability| capability.can_handle_message(message))
        else {
            if message.is_request() {
                return Err(McpError::method_not_found(method));
            }
            debug!(method, "no capability for notification; dropping");
            return Ok(None);
        };

        debug!(method, capability = capability.name(), "dispatching");
        capability.handle_message(message)
    }
}

/// Writes a client-level log message to the local log.
fn emit_local(level: LogLevel, message: &str, logger: Option<&str>) {
    let logger = logger.unwrap_or("server");
    match level {
        LogLevel::Emergency | LogLevel::Alert | LogLevel::Critical | LogLevel::Error => {
            error!(severity = %level, logger, "{message}");
        }
        LogLevel::Warning => warn!(logger, "{message}"),
        LogLevel::Notice | LogLevel::Info => info!(severity = %level, logger, "{message}"),
        LogLevel::Debug => debug!(logger, "{message}"),
    }
}
