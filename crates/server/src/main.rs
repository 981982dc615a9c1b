use std::net::SocketAddr;
use std::path::PathBuf;

use menucheck_server::{serve, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let addr: SocketAddr = std::env::var("MENUCHECK_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8001".to_string())
        .parse()?;
    let root_dir = std::env::var("MENUCHECK_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."));

    serve(ServerConfig { root_dir, addr }).await
}
