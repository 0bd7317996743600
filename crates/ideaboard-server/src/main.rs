//! Ideaboard relay server binary.

use clap::Parser;
use ideaboard_server::{AppState, router};
use std::{net::SocketAddr, sync::Arc};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ideaboard-server", about = "WebSocket relay for Ideaboard rooms")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "IDEABOARD_ADDR", default_value = "0.0.0.0:3030")]
    addr: SocketAddr,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ideaboard_server=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();
    let app = router(Arc::new(AppState::new()));

    let listener = tokio::net::TcpListener::bind(args.addr).await?;
    info!("Ideaboard relay server listening on {}", args.addr);
    info!("WebSocket endpoint: ws://{}/ws", listener.local_addr()?);

    axum::serve(listener, app).await
}
