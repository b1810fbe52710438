use anyhow::Result;
use axum::Router;
use clap::Parser;
use docsim_core::IndexConfig;
use docsim_server::{build_app, ServerConfig};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};
use tokio::net::TcpListener;

#[derive(Parser)]
struct Args {
    /// Document source (.json array or .jsonl)
    #[arg(long, default_value = "./documents.json")]
    documents: String,
    /// Vector cache directory; reused when it matches the documents, rewritten otherwise
    #[arg(long)]
    cache: Option<String>,
    /// TOML file with vectorizer settings
    #[arg(long)]
    config: Option<String>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let index_config = match &args.config {
        Some(path) => IndexConfig::from_toml_file(path)?,
        None => IndexConfig::default(),
    };
    let config = ServerConfig {
        documents: PathBuf::from(&args.documents),
        index_config,
        cache_dir: args.cache.as_ref().map(PathBuf::from),
        admin_token: std::env::var("ADMIN_TOKEN").ok(),
    };
    let app: Router = build_app(config)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
