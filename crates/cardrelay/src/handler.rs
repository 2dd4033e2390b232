//! Per-connection lifecycle: one reader loop and one writer task per
//! accepted connection, bridged to the dispatcher through channels.

use std::sync::Arc;

use tokio::sync::mpsc;

use cardrelay_protocol::{ClientMessage, Codec, ServerMessage};
use cardrelay_transport::{ConnId, Connection};

use crate::dispatch::RelayEvent;
use crate::RelayError;

/// Sends a `Disconnect` for the connection when dropped, so room cleanup
/// runs on every exit path of the handler, panics included.
struct DisconnectGuard {
    conn: ConnId,
    events: mpsc::Sender<RelayEvent>,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let events = self.events.clone();
        let conn = self.conn;
        tokio::spawn(async move {
            let _ = events.send(RelayEvent::Disconnect { conn }).await;
        });
    }
}

/// Drives one connection until it closes.
///
/// Registers the connection with the dispatcher, spawns the writer task
/// that drains the outbound queue into the socket, then loops on `recv`
/// decoding frames into [`RelayEvent::Message`]s. Undecodable frames are
/// logged and dropped; the connection stays up.
pub(crate) async fn handle_connection<T, C>(
    connection: T,
    events: mpsc::Sender<RelayEvent>,
    codec: C,
) -> Result<(), RelayError>
where
    T: Connection,
    C: Codec + Clone,
{
    let connection = Arc::new(connection);
    let conn = connection.id();
    tracing::debug!(%conn, "connection handler started");

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerMessage>();
    events
        .send(RelayEvent::Connect { conn, sender: out_tx })
        .await
        .map_err(|_| RelayError::DispatcherGone)?;
    let _guard = DisconnectGuard { conn, events: events.clone() };

    let writer = {
        let connection = Arc::clone(&connection);
        let codec = codec.clone();
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let bytes = match codec.encode(&msg) {
                    Ok(bytes) => bytes,
                    Err(error) => {
                        tracing::error!(%conn, %error, "failed to encode outbound message");
                        continue;
                    }
                };
                if connection.send(&bytes).await.is_err() {
                    break;
                }
            }
        })
    };

    loop {
        match connection.recv().await {
            Ok(Some(frame)) => match codec.decode::<ClientMessage>(&frame) {
                Ok(msg) => {
                    if events.send(RelayEvent::Message { conn, msg }).await.is_err() {
                        break;
                    }
                }
                Err(error) => {
                    tracing::debug!(%conn, %error, "dropping undecodable frame");
                }
            },
            Ok(None) => {
                tracing::debug!(%conn, "connection closed by peer");
                break;
            }
            Err(error) => {
                tracing::debug!(%conn, %error, "connection receive failed");
                break;
            }
        }
    }

    writer.abort();
    Ok(())
}
