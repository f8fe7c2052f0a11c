mod tools;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use rust_mcp_sdk::schema::{
    Implementation, InitializeResult, ProtocolVersion, ServerCapabilities, ServerCapabilitiesTools,
};
use rust_mcp_sdk::{
    mcp_server::{server_runtime, McpServerOptions},
    McpServer, StdioTransport, ToMcpServerHandler, TransportOptions,
};
use tracing_subscriber::EnvFilter;

use taskbridge_core::bridge::Bridge;
use taskbridge_core::config::load_config;

use crate::tools::{McpContext, TaskbridgeServerHandler};

#[derive(Parser)]
#[command(name = "taskbridge-mcp", version = taskbridge_core::version())]
struct Args {
    /// Config file; defaults to $TASKBRIDGE_HOME/config.toml.
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Stdout carries the protocol, so logs always go to stderr.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("TASKBRIDGE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(args.config.as_deref()).context("failed to load config")?;
    let bridge = Bridge::from_config(&config).context("invalid config")?;
    tracing::info!(
        application = %bridge.settings().application,
        "starting taskbridge MCP server"
    );

    let server_details = InitializeResult {
        server_info: Implementation {
            name: "taskbridge".into(),
            version: taskbridge_core::version().into(),
            title: Some("Taskbridge MCP Server".into()),
            description: Some("MCP server for OmniFocus task automation".into()),
            icons: vec![],
            website_url: None,
        },
        capabilities: ServerCapabilities {
            tools: Some(ServerCapabilitiesTools { list_changed: None }),
            ..Default::default()
        },
        meta: None,
        instructions: Some(
            "Every tool returns a JSON envelope {success, data, error}. Batch tools report \
             per-task failures inside data."
                .into(),
        ),
        protocol_version: ProtocolVersion::V2025_11_25.into(),
    };

    let transport = StdioTransport::new(TransportOptions::default())
        .map_err(|err| anyhow::anyhow!("failed to open stdio transport: {err}"))?;
    let handler = TaskbridgeServerHandler {
        context: McpContext { bridge },
    };

    let server = server_runtime::create_server(McpServerOptions {
        server_details,
        transport,
        handler: handler.to_mcp_server_handler(),
        task_store: None,
        client_task_store: None,
    });

    server
        .start()
        .await
        .map_err(|err| anyhow::anyhow!("server stopped: {err}"))
}
