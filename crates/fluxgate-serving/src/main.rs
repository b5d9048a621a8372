use anyhow::Result;
use clap::Parser;
use fluxgate_serving::{create_app, ServingConfig, ServingRuntime};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fluxgate-serve")]
#[command(about = "Model serving container for fluxgate")]
struct Args {
    /// Directory holding model_info.json and model.safetensors
    #[arg(long, env = "FLUXGATE_MODEL_DIR", default_value = "/opt/ml/model")]
    model_dir: PathBuf,

    /// Name this endpoint answers to on /endpoints/{name}/invocations
    #[arg(long, env = "FLUXGATE_ENDPOINT_NAME", default_value = "fluxgate-endpoint")]
    endpoint_name: String,

    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    #[arg(long, default_value = "8080")]
    port: u16,

    /// Use CUDA when available
    #[arg(long)]
    gpu: bool,

    /// Load the model before accepting traffic instead of on first request
    #[arg(long)]
    eager_load: bool,

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

    let config = ServingConfig::new()
        .with_model_dir(args.model_dir)
        .with_endpoint_name(args.endpoint_name)
        .with_bind(args.host, args.port)
        .with_gpu(args.gpu);
    let addr = config.bind_addr();
    let runtime = Arc::new(ServingRuntime::new(config));

    if args.eager_load {
        runtime.load().await?;
    }

    tracing::info!(addr = %addr, "Starting model server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, create_app(runtime))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down model server");
        })
        .await?;

    Ok(())
}
