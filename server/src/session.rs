//! One WebSocket connection from handshake to teardown.
//!
//! A session reads text frames, decodes them and dispatches by tag. Pings are
//! answered right away; commands are only ever queued for the tick loop. All
//! writes go through a bounded channel to a dedicated writer task, which owns
//! the sink and closes it exactly once.

use crate::client_manager::OUTBOUND_CAPACITY;
use crate::error::ServerError;
use crate::network::ServerContext;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::protocol::{self, Init, Join, Message, Ping, Pong};
use shared::{Command, CommandFrame, Player, PlayerId, Priority, QueuedCommand};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message as WsMessage};

/// What the read loop should do after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionFlow {
    Continue,
    Close,
}

pub struct Session {
    ctx: Arc<ServerContext>,
    addr: SocketAddr,
    outbound: mpsc::Sender<String>,
    player_id: Option<PlayerId>,
    closed: bool,
}

impl Session {
    pub fn new(ctx: Arc<ServerContext>, addr: SocketAddr, outbound: mpsc::Sender<String>) -> Self {
        Self {
            ctx,
            addr,
            outbound,
            player_id: None,
            closed: false,
        }
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        self.player_id
    }

    /// Decodes and dispatches one text frame. Malformed frames are logged and
    /// skipped.
    pub async fn handle_text(&mut self, raw: &str) -> SessionFlow {
        match protocol::decode(raw) {
            Ok(message) => self.handle_message(message).await,
            Err(e) => {
                warn!("Dropping malformed frame from {}: {}", self.addr, e);
                SessionFlow::Continue
            }
        }
    }

    pub async fn handle_message(&mut self, message: Message) -> SessionFlow {
        match message {
            Message::Ping(ping) => {
                self.handle_ping(ping);
                SessionFlow::Continue
            }
            Message::Join(join) => self.handle_join(join).await,
            Message::Command(frame) => {
                self.handle_command(frame);
                SessionFlow::Continue
            }
            Message::Unknown(tag) => {
                debug!("Ignoring unknown message type {:?} from {}", tag, self.addr);
                SessionFlow::Continue
            }
            other => {
                warn!("Unexpected {} message from {}", other.tag(), self.addr);
                SessionFlow::Continue
            }
        }
    }

    fn handle_ping(&self, ping: Ping) {
        let pong = Message::Pong(Pong {
            server_time: self.ctx.clock.now_ms(),
            client_time: ping.client_time,
        });
        self.send(&pong);
    }

    async fn handle_join(&mut self, join: Join) -> SessionFlow {
        if let Some(id) = self.player_id {
            warn!("Player {} sent a second join, ignoring", id);
            return SessionFlow::Continue;
        }

        // Held until init is queued so no snapshot overtakes it.
        let mut clients = self.ctx.clients.write().await;
        let id = self.ctx.ids.next_player();
        if let Err(e) = clients.add_client(id, self.addr, self.outbound.clone()) {
            warn!("Refusing join from {}: {}", self.addr, e);
            return SessionFlow::Close;
        }

        if !self.ctx.registry.add(Player::new(id, join.name, join.color)) {
            warn!("Player id {} already registered, closing {}", id, self.addr);
            clients.remove_client(&id);
            return SessionFlow::Close;
        }
        self.player_id = Some(id);

        let init = Message::Init(Init {
            my_id: id,
            server_time: self.ctx.clock.now_ms(),
            players: self.ctx.registry.snapshot(),
        });
        self.send(&init);
        SessionFlow::Continue
    }

    fn handle_command(&self, frame: CommandFrame) {
        let Some(id) = self.player_id else {
            warn!(
                "Dropping {} from {}: not joined",
                frame.command.tag(),
                self.addr
            );
            return;
        };

        // Positional corrections are a client-side concern.
        if matches!(frame.command, Command::Sync { .. }) {
            debug!("Dropping client sync from player {}", id);
            return;
        }

        self.ctx
            .pipeline
            .enqueue(QueuedCommand::from_player(id, frame), Priority::Low);
    }

    fn send(&self, message: &Message) {
        match protocol::encode(message) {
            Ok(frame) => {
                if self.outbound.try_send(frame).is_err() {
                    debug!("Outbound queue unavailable for {}, dropping {}", self.addr, message.tag());
                }
            }
            Err(e) => warn!("Failed to encode {}: {}", message.tag(), e),
        }
    }

    /// Unbinds the player. Safe to call more than once.
    pub async fn teardown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(id) = self.player_id.take() {
            self.ctx.registry.remove(id);
            self.ctx.clients.write().await.remove_client(&id);
        }
        info!("Connection {} closed", self.addr);
    }
}

/// Runs one connection to completion.
///
/// Transport errors end only this connection. Binary frames are ignored.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    ctx: Arc<ServerContext>,
) -> Result<(), ServerError> {
    let ws_stream = accept_async(stream).await?;
    info!("Connection {} opened", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);

    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = ws_sender.send(WsMessage::Text(frame.into())).await {
                debug!("Write to {} failed: {}", addr, e);
                break;
            }
        }
        let _ = ws_sender.close().await;
    });

    let mut session = Session::new(ctx, addr, tx);
    while let Some(message) = ws_receiver.next().await {
        match message {
            Ok(WsMessage::Text(text)) => {
                if session.handle_text(text.as_str()).await == SessionFlow::Close {
                    break;
                }
            }
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("Connection {} failed: {}", addr, e);
                break;
            }
        }
    }

    session.teardown().await;
    drop(session);
    let _ = writer.await;
    Ok(())
}
