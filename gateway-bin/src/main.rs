use std::path::PathBuf;

use clap::Parser;

/// Runs the LLM reverse-proxy gateway.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the gateway's TOML configuration file.
    #[arg(long, env = "GATEWAY_CONFIG", default_value = "gateway.toml")]
    config: PathBuf,

    /// `EnvFilter` syntax, e.g. `"info"` or `"llm=debug,store=info"`.
    #[arg(long, env = "LOG_FILTER", default_value = "info")]
    log_filter: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    telemetry::init(&args.log_filter);

    let config = config::Config::load(&args.config)
        .map_err(|err| anyhow::anyhow!("failed to load configuration from {}: {err}", args.config.display()))?;

    let router = llm::router(&config).await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("llm-gateway listening on {addr}");

    axum::serve(listener, router).await?;

    Ok(())
}
