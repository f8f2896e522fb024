//! mcp-core-server: Model Context Protocol server over stdio or HTTP.
//!
//! Loads configuration, registers the bundled capabilities and runs one
//! server session until the client shuts it down, the input closes, or the
//! process receives a termination signal.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use mcp_core_server::capabilities::{CalculatorTool, PingCapability, ToolsCapability};
use mcp_core_server::config::{self, Config, TransportKind};
use mcp_core_server::http::{self, AppState};
use mcp_core_server::mcp::server::McpServer;
use mcp_core_server::mcp::transport::StdioTransport;

/// Model Context Protocol server.
///
/// Speaks JSON-RPC 2.0 over newline-delimited stdio (default) or HTTP.
#[derive(Parser, Debug)]
#[command(name = "mcp-core-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Transport to serve (overrides the configuration file)
    #[arg(long, value_enum)]
    transport: Option<TransportArg>,

    /// Listen address for the HTTP transport (overrides the configuration file)
    #[arg(long, value_name = "ADDR")]
    bind: Option<SocketAddr>,

    /// Increase logging verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease logging verbosity (only show errors)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TransportArg {
    Stdio,
    Http,
}

impl From<TransportArg> for TransportKind {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Stdio => Self::Stdio,
            TransportArg::Http => Self::Http,
        }
    }
}

/// Determines the log level from CLI arguments.
#[allow(clippy::match_same_arms)] // Explicit "warn" arm for clarity
fn get_log_level(verbose: u8, quiet: bool, config_level: &str) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => match config_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::WARN, // Default to warn for unknown levels
        },
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Initialises the tracing subscriber for logging.
///
/// Logs go to stderr; stdout carries the stdio transport.
fn init_tracing(level: Level) {
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Instructions advertised when the configuration supplies none.
const TOOL_INSTRUCTIONS: &str =
    "Call tools/list to discover the available tools, then tools/call to run them.";

/// Builds the server with the bundled capabilities.
fn build_server(cfg: &Config) -> McpServer {
    let instructions = cfg
        .server
        .instructions
        .clone()
        .unwrap_or_else(|| TOOL_INSTRUCTIONS.to_string());
    let mut server = McpServer::new(cfg.server.name.clone(), cfg.server.version.clone())
        .with_instructions(instructions);

    server.add_capability(PingCapability);
    server.add_capability(ToolsCapability::new().with_tool(CalculatorTool::new()));

    if let Some(token) = &cfg.authorization.token {
        info!("client authorization required");
        server.require_authorization(token.clone());
    }

    server
}

/// Waits for SIGINT or SIGTERM.
#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = sigint.recv() => info!("Received SIGINT, initiating graceful shutdown"),
        _ = sigterm.recv() => info!("Received SIGTERM, initiating graceful shutdown"),
    }
    Ok(())
}

/// Waits for Ctrl+C.
#[cfg(windows)]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, initiating graceful shutdown");
    Ok(())
}

/// Resolves on a termination signal; never resolves if handlers cannot be
/// installed.
async fn termination() {
    if let Err(e) = shutdown_signal().await {
        error!(error = %e, "Failed to install signal handlers");
        std::future::pending::<()>().await;
    }
}

async fn serve_stdio(mut server: McpServer, max_message_size: usize) -> std::io::Result<()> {
    server.connect(Box::new(
        StdioTransport::new().with_max_message_size(max_message_size),
    ));

    info!("MCP server ready on stdio, waiting for client messages...");

    tokio::select! {
        result = server.run() => result.map_err(std::io::Error::other)?,
        () = termination() => {}
    }

    server.finish();
    Ok(())
}

async fn serve_http(server: McpServer, cfg: &Config) -> std::io::Result<()> {
    let addr = cfg
        .transport
        .bind_addr()
        .map_err(std::io::Error::other)?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let state = AppState::new(server, cfg.transport.max_message_size);
    http::serve(state, listener, termination()).await
}

/// Entry point for the mcp-core-server binary.
fn main() -> ExitCode {
    let args = Args::parse();

    // Load configuration
    let config_path = args.config.as_deref();
    let mut cfg = match config::load_config(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };

    // CLI overrides
    if let Some(transport) = args.transport {
        cfg.transport.kind = transport.into();
    }
    if let Some(bind) = args.bind {
        cfg.transport.bind = bind.to_string();
    }

    // Initialise logging
    let log_level = get_log_level(args.verbose, args.quiet, &cfg.logging.level);
    init_tracing(log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        transport = ?cfg.transport.kind,
        "Starting mcp-core-server"
    );

    let server = build_server(&cfg);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to create Tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async {
        match cfg.transport.kind {
            TransportKind::Stdio => serve_stdio(server, cfg.transport.max_message_size).await,
            TransportKind::Http => serve_http(server, &cfg).await,
        }
    });

    // A pending stdin read must not keep the process alive.
    runtime.shutdown_background();

    match result {
        Ok(()) => {
            info!("Server shut down gracefully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Server error");
            ExitCode::FAILURE
        }
    }
}
