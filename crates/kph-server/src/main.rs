//! Binary entry point: bind, serve, log.

use std::net::SocketAddr;

use clap::Parser;
use kph_server::{AppState, build_router};
use tracing::info;

#[derive(Parser)]
struct Args {
    /// Listen address. 19455 is the port KeePassHttp clients expect.
    #[arg(long, default_value = "127.0.0.1:19455", env = "KPH_LISTEN_ADDR")]
    addr: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    info!(addr = %args.addr, "starting kph-server");

    let app = build_router(AppState::new());
    let listener = tokio::net::TcpListener::bind(args.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
