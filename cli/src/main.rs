//! shellport: PowerShell tools for MCP clients.
//!
//! Three subcommands:
//! - `shellport stdio`: serve over stdin/stdout (Claude Desktop and other STDIO clients)
//! - `shellport serve`: Streamable HTTP MCP server
//! - `shellport check`: verify the interpreter can be launched and report its version

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use clap::{Parser, Subcommand};
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
};
use shellport::{
    ProcessRunner, RunOptions, ShellportConfig, ShellportMcpServer, TokioSpawner, build_registry,
    resolve_env_vars, run_session,
};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt as TowerServiceExt;
use tracing_subscriber::EnvFilter;

const HEALTH_CHECK_COMMAND: &str = "Write-Output \"PowerShell Health Check OK\"";
const VERSION_QUERY: &str = "$PSVersionTable.PSVersion.ToString()";

#[derive(Parser)]
#[command(
    name = "shellport",
    version,
    about = "MCP server exposing PowerShell execution and host introspection tools"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve tools over STDIO (for Claude Desktop, etc.)
    Stdio {
        /// Path to shellport.toml [default: ./shellport.toml or ~/.config/shellport/shellport.toml]
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Start a Streamable HTTP MCP server
    Serve {
        /// Path to shellport.toml [default: ./shellport.toml or ~/.config/shellport/shellport.toml]
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// HTTP port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
    /// Run a health check command and print the interpreter version
    Check {
        /// Path to shellport.toml [default: ./shellport.toml or ~/.config/shellport/shellport.toml]
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries protocol frames in stdio mode, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cancel = CancellationToken::new();

    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutting down shellport...");
        cancel_for_signal.cancel();
    });

    match cli.command {
        Commands::Stdio { config } => {
            let config = load_config(resolve_config(config)).await?;
            run_stdio(config, cancel).await?;
        }
        Commands::Serve { config, port, host } => {
            let config = load_config(resolve_config(config)).await?;
            run_serve(config, host, port, cancel).await?;
        }
        Commands::Check { config } => {
            let config = load_config(resolve_config(config)).await?;
            run_check(config).await?;
        }
    }

    Ok(())
}

fn build_runner(config: &ShellportConfig) -> Arc<ProcessRunner<TokioSpawner>> {
    let interpreter = &config.interpreter;
    let spawner = TokioSpawner::new(resolve_env_vars(&interpreter.env));
    Arc::new(ProcessRunner::new(
        spawner,
        interpreter.executable.clone(),
        interpreter.timeout(),
    ))
}

fn build_server(config: &ShellportConfig) -> Result<ShellportMcpServer> {
    let registry = build_registry(build_runner(config), &config.tools.disabled)
        .map_err(|e| anyhow::anyhow!("Failed to build tool registry: {}", e))?;
    Ok(ShellportMcpServer::new(registry))
}

/// Serve one MCP session over stdin/stdout until the client disconnects or Ctrl-C.
async fn run_stdio(config: ShellportConfig, cancel: CancellationToken) -> Result<()> {
    let server = build_server(&config)?;

    let reason = run_session(server, tokio::io::stdin(), tokio::io::stdout(), cancel)
        .await
        .map_err(|e| anyhow::anyhow!("shellport stdio transport error: {}", e))?;

    tracing::info!(?reason, "shellport stdio transport completed");
    Ok(())
}

/// Start a Streamable HTTP MCP server. Every HTTP session gets its own
/// session tracker over the shared registry.
async fn run_serve(
    config: ShellportConfig,
    host: String,
    port: u16,
    cancel: CancellationToken,
) -> Result<()> {
    let server = build_server(&config)?;

    let session_manager = Arc::new(LocalSessionManager::default());
    let http_config = StreamableHttpServerConfig {
        cancellation_token: cancel.clone(),
        ..Default::default()
    };
    let mcp_service = StreamableHttpService::new(
        move || Ok(server.for_new_session()),
        session_manager,
        http_config,
    );

    let app = Router::new().fallback(move |req: Request<axum::body::Body>| {
        let svc = mcp_service.clone();
        async move {
            match svc.oneshot(req).await {
                Ok(response) => response.into_response(),
                Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
            }
        }
    });

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;

    tracing::info!(host = %host, port = %port, "shellport HTTP server listening");
    tracing::info!("Connect your MCP client to http://{}:{}/mcp", host, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| anyhow::anyhow!("shellport HTTP server error: {}", e))?;

    tracing::info!("shellport HTTP server stopped");
    Ok(())
}

/// Launch the interpreter twice: a health check command, then a version query.
async fn run_check(config: ShellportConfig) -> Result<()> {
    let runner = build_runner(&config);
    let options = RunOptions::default();

    let health = runner.run(HEALTH_CHECK_COMMAND, &options).await;
    if !health.success {
        return Err(anyhow::anyhow!(
            "Interpreter '{}' failed the health check: {}",
            runner.executable(),
            health.error_message.unwrap_or_default()
        ));
    }
    eprintln!("{} ({} ms)", health.output, health.duration.as_millis());

    let version = runner.run(VERSION_QUERY, &options).await;
    if !version.success {
        return Err(anyhow::anyhow!(
            "Failed to query interpreter version: {}",
            version.error_message.unwrap_or_default()
        ));
    }
    eprintln!("PowerShell version: {}", version.output);
    eprintln!("Executable: {}", runner.executable());
    Ok(())
}

/// Resolve config file path: explicit flag → ./shellport.toml →
/// ~/.config/shellport/shellport.toml. `None` means built-in defaults.
fn resolve_config(explicit: Option<PathBuf>) -> Option<PathBuf> {
    if explicit.is_some() {
        return explicit;
    }

    let local = Path::new("shellport.toml");
    if local.exists() {
        return Some(local.to_path_buf());
    }

    dirs::config_dir()
        .map(|dir| dir.join("shellport").join("shellport.toml"))
        .filter(|path| path.exists())
}

async fn load_config(path: Option<PathBuf>) -> Result<ShellportConfig> {
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading config");
            ShellportConfig::load(&path)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to load config file {:?}: {}", path, e))
        }
        None => {
            tracing::debug!("no config file found, using defaults");
            Ok(ShellportConfig::default())
        }
    }
}
