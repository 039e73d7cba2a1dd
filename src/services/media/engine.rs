use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::{WebSocketStream, accept_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::covers::CoverStore;
use super::error::MediaError;
use super::registry::PlayerRegistry;
use super::types::PlayerCommand;
use super::wire::{self, InboundMessage};

/// Outbound half of the single live adapter connection.
///
/// Commands go through the channel to the connection task, which owns the
/// socket; no lock is ever held across socket I/O. The generation tag lets a
/// finished receive loop tell whether it is still the live connection before
/// clearing the slot.
struct ConnectionHandle {
    tx: mpsc::UnboundedSender<Message>,
    generation: u64,
}

/// Owns the adapter transport: accepts connections, decodes inbound frames
/// into registry mutations, and writes outbound command lines.
///
/// At most one connection is live; accepting a new one silently terminates
/// the previous one. Malformed frames are dropped with a diagnostic and the
/// connection survives; a read failure or clean close ends the receive loop,
/// clears the live slot and empties the registry.
pub(crate) struct ProtocolEngine {
    registry: PlayerRegistry,
    covers: CoverStore,
    connection: Arc<RwLock<Option<ConnectionHandle>>>,
}

impl ProtocolEngine {
    /// Bind the protocol server and start its accept loop.
    pub(crate) async fn start(
        port: u16,
        registry: PlayerRegistry,
        covers: CoverStore,
    ) -> Result<(Arc<Self>, SocketAddr, JoinHandle<()>), MediaError> {
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| MediaError::InitializationFailed(format!("bind failed on port {port}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| MediaError::InitializationFailed(format!("no local address: {e}")))?;

        let engine = Arc::new(Self {
            registry,
            covers,
            connection: Arc::new(RwLock::new(None)),
        });

        info!(%local_addr, "adapter protocol server listening");
        let accept_task = tokio::spawn(Arc::clone(&engine).accept_loop(listener));
        Ok((engine, local_addr, accept_task))
    }

    /// Send a fire-and-forget command to a player.
    ///
    /// Never blocks waiting for the adapter's `EventResult`; the
    /// acknowledgement is observed by the receive loop when it arrives.
    pub(crate) async fn send_command(
        &self,
        player_id: u32,
        command: PlayerCommand,
    ) -> Result<(), MediaError> {
        let tx = {
            let connection = self.connection.read().await;
            match connection.as_ref() {
                Some(handle) => handle.tx.clone(),
                None => return Err(MediaError::NotConnected),
            }
        };

        let event_id = wire::next_event_id();
        let line = wire::encode_command(player_id, &event_id, command);
        debug!(%line, "sending adapter command");
        tx.send(Message::Text(line))
            .map_err(|_| MediaError::NotConnected)
    }

    /// Drop the live connection, if any.
    pub(crate) async fn disconnect(&self) {
        let mut connection = self.connection.write().await;
        *connection = None;
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        let mut generation: u64 = 0;
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "adapter accept failed");
                    continue;
                }
            };
            let websocket = match accept_async(stream).await {
                Ok(websocket) => websocket,
                Err(e) => {
                    warn!(%peer, error = %e, "websocket handshake failed");
                    continue;
                }
            };

            generation += 1;
            info!(%peer, generation, "adapter connected");

            let (tx, rx) = mpsc::unbounded_channel();
            // Queued before the handle is installed so the version
            // announcement is the first thing on the wire.
            let _ = tx.send(Message::Text(wire::HANDSHAKE.to_string()));
            {
                // Replacing the handle drops the previous sender, which ends
                // the previous connection task at its next poll.
                let mut connection = self.connection.write().await;
                *connection = Some(ConnectionHandle { tx, generation });
            }

            tokio::spawn(Arc::clone(&self).run_connection(websocket, rx, generation));
        }
    }

    async fn run_connection(
        self: Arc<Self>,
        websocket: WebSocketStream<TcpStream>,
        mut outgoing: mpsc::UnboundedReceiver<Message>,
        generation: u64,
    ) {
        let (mut sink, mut stream) = websocket.split();

        loop {
            tokio::select! {
                message = outgoing.recv() => match message {
                    Some(message) => {
                        if let Err(e) = sink.send(message).await {
                            warn!(error = %e, "websocket send failed");
                            break;
                        }
                    }
                    None => {
                        debug!(generation, "connection replaced, closing previous transport");
                        break;
                    }
                },
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.handle_text_frame(&text).await,
                    Some(Ok(Message::Binary(data))) => self.handle_binary_frame(&data).await,
                    Some(Ok(Message::Close(_))) | None => {
                        info!(generation, "adapter disconnected");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "websocket read failed");
                        break;
                    }
                },
            }
        }

        let _ = sink.close().await;

        // Only the still-live connection clears the slot and the registry; a
        // replaced one must not tear down its successor's state.
        let was_live = {
            let mut connection = self.connection.write().await;
            if connection
                .as_ref()
                .is_some_and(|handle| handle.generation == generation)
            {
                *connection = None;
                true
            } else {
                false
            }
        };
        if was_live {
            self.registry.clear().await;
        }
    }

    async fn handle_text_frame(&self, text: &str) {
        match wire::decode_text_frame(text) {
            Ok(InboundMessage::PlayerAdded { player_id, patch })
            | Ok(InboundMessage::PlayerUpdated { player_id, patch }) => {
                self.registry.upsert(player_id, &patch).await;
            }
            Ok(InboundMessage::PlayerRemoved { player_id }) => {
                info!(player_id, "player removed");
                self.registry.remove(player_id).await;
            }
            Ok(InboundMessage::EventResult { event_id, status }) => {
                debug!(%event_id, ?status, "command acknowledged");
            }
            Err(e) => {
                debug!(error = %e, "dropping malformed frame");
            }
        }
    }

    async fn handle_binary_frame(&self, data: &[u8]) {
        let (player_id, blob) = match wire::decode_cover_frame(data) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!(error = %e, "dropping malformed cover frame");
                return;
            }
        };

        // Synchronous write on the receive path: a slow blob stalls the next
        // frame, which is the accepted tradeoff for ordered cover updates.
        let path = match self.covers.write(player_id, blob) {
            Ok(path) => path,
            Err(e) => {
                warn!(error = %e, "cover write failed");
                return;
            }
        };

        if self.registry.attach_cover(player_id, &path).await {
            debug!(player_id, bytes = blob.len(), "cover updated");
        } else {
            debug!(player_id, "cover for unknown player dropped");
        }
    }
}
