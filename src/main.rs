//! PostgreSQL MCP Server - Main entry point.

use clap::Parser;
use pg_mcp_server::config::{Config, TransportMode};
use pg_mcp_server::db::ConnectionPool;
use pg_mcp_server::gateway::OperationGateway;
use pg_mcp_server::mcp::PgService;
use pg_mcp_server::transport::{HttpTransport, StdioTransport, Transport};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber. Logs go to stderr; stdout belongs to
/// the stdio transport.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    init_tracing(&config);

    let pool_config = match config.pool_config() {
        Ok(pool_config) => pool_config,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!();
            eprintln!("Examples:");
            eprintln!("  pg-mcp-server --host localhost --database app --user admin");
            eprintln!("  pg-mcp-server --url postgres://admin:secret@db:5432/app?sslmode=require");
            eprintln!("  POSTGRES_URL=postgres://admin@localhost/app pg-mcp-server --transport http");
            std::process::exit(1);
        }
    };

    info!(
        transport = %config.transport,
        host = %pool_config.host,
        port = pool_config.port,
        database = %pool_config.database,
        read_only = pool_config.read_only,
        "Starting PostgreSQL MCP Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let pool = Arc::new(ConnectionPool::new(pool_config)?);

    // A database that is not up yet is picked up by the first acquire.
    if let Err(e) = pool.initialize().await {
        warn!(error = %e, "Initial connection failed; will retry on first use");
    }

    let gateway = OperationGateway::new(pool, config.tool_paths());
    let service = PgService::new(gateway);

    let result = match config.transport {
        TransportMode::Stdio => {
            info!("Using stdio transport");
            StdioTransport::new(service).run().await
        }
        TransportMode::Http => {
            info!(
                host = %config.http_host,
                port = config.http_port,
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            HttpTransport::new(
                service,
                &config.http_host,
                config.http_port,
                &config.mcp_endpoint,
            )
            .run()
            .await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}
