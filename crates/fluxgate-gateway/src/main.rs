use anyhow::{Context, Result};
use clap::Parser;
use fluxgate_gateway::{create_app, Gateway, GatewayConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fluxgate-gateway")]
#[command(about = "Online inference gateway, configured through FLUXGATE_* variables")]
struct Args {
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "FLUXGATE_PORT", default_value = "3000")]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log format (json, pretty, compact)
    #[arg(long, default_value = "json")]
    log_format: String,
}

fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        "pretty" => builder.pretty().init(),
        "compact" => builder.compact().init(),
        _ => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level, &args.log_format);

    let config = GatewayConfig::from_env().context("Invalid gateway configuration")?;
    tracing::info!(
        mode = %config.mode,
        endpoint = %config.endpoint.invocation_url(),
        arity = config.arity,
        cors = config.cors,
        "Gateway configured"
    );
    let gateway = Arc::new(Gateway::from_config(config).context("Failed to build HTTP clients")?);

    let addr = format!("{}:{}", args.host, args.port);
    tracing::info!(addr = %addr, "Starting gateway");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, create_app(gateway))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down gateway");
        })
        .await?;

    Ok(())
}
