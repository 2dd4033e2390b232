//! The relay server: accept loop plus per-connection handler spawning.

use std::net::SocketAddr;

use tokio::sync::mpsc;

use cardrelay_protocol::{JsonCodec, RoomId};
use cardrelay_room::RoomRegistry;
use cardrelay_transport::{Transport, WebSocketTransport};

use crate::dispatch::{spawn_dispatcher, RelayEvent};
use crate::handler::handle_connection;
use crate::RelayError;

/// Room every connection is routed into by default.
pub const DEFAULT_ROOM: &str = "game-room";

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_EVENT_QUEUE: usize = 64;

/// Builder for [`RelayServer`].
///
/// ```no_run
/// # use cardrelay::RelayServer;
/// # async fn run() -> Result<(), cardrelay::RelayError> {
/// let server = RelayServer::builder()
///     .bind("0.0.0.0:3000")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RelayServerBuilder {
    bind_addr: String,
    default_room: RoomId,
    event_queue: usize,
}

impl RelayServerBuilder {
    /// Creates a builder with the default bind address and room.
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            default_room: RoomId::new(DEFAULT_ROOM),
            event_queue: DEFAULT_EVENT_QUEUE,
        }
    }

    /// Sets the address to listen on. Use port 0 for an ephemeral port.
    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    /// Sets the room new connections are routed into.
    pub fn default_room(mut self, room: impl Into<String>) -> Self {
        self.default_room = RoomId::new(room);
        self
    }

    /// Sets the dispatcher event queue depth.
    pub fn event_queue(mut self, depth: usize) -> Self {
        self.event_queue = depth;
        self
    }

    /// Binds the listener and spawns the dispatcher.
    pub async fn build(self) -> Result<RelayServer, RelayError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let events = spawn_dispatcher(
            RoomRegistry::new(),
            self.default_room,
            self.event_queue,
        );
        Ok(RelayServer { transport, events, codec: JsonCodec })
    }
}

impl Default for RelayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running relay: a bound WebSocket listener in front of the
/// dispatcher actor.
pub struct RelayServer {
    transport: WebSocketTransport,
    events: mpsc::Sender<RelayEvent>,
    codec: JsonCodec,
}

impl RelayServer {
    /// Starts building a server.
    pub fn builder() -> RelayServerBuilder {
        RelayServerBuilder::new()
    }

    /// The address the listener is actually bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Accepts connections forever, spawning a handler task for each.
    ///
    /// A failed accept (for example a bad WebSocket handshake) is logged
    /// and the loop keeps serving.
    pub async fn run(mut self) -> Result<(), RelayError> {
        tracing::info!("relay server running");
        loop {
            let connection = match self.transport.accept().await {
                Ok(connection) => connection,
                Err(error) => {
                    tracing::warn!(%error, "failed to accept connection");
                    continue;
                }
            };

            let events = self.events.clone();
            let codec = self.codec;
            tokio::spawn(async move {
                if let Err(error) =
                    handle_connection(connection, events, codec).await
                {
                    tracing::warn!(%error, "connection handler failed");
                }
            });
        }
    }
}
