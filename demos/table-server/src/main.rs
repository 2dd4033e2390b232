//! Runs the relay on a fixed port.
//!
//! Point any WebSocket client at `ws://localhost:3000` and speak the
//! JSON protocol, e.g.:
//!
//! ```text
//! {"type":"requestSeat","seat":1,"playerName":"Alice"}
//! {"type":"startGame","fullState":{"deck":[]}}
//! ```
//!
//! Log verbosity is controlled with `RUST_LOG`, e.g.
//! `RUST_LOG=cardrelay=debug`.

use cardrelay::{RelayError, RelayServer};

#[tokio::main]
async fn main() -> Result<(), RelayError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let server = RelayServer::builder().bind("0.0.0.0:3000").build().await?;
    if let Ok(addr) = server.local_addr() {
        tracing::info!(%addr, "table server listening");
    }
    server.run().await
}
