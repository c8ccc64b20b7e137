//! Client network layer: WebSocket connection, ping timer, outbox and reconnect

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use shared::protocol::{self, CodecError, Join, Message, Ping};
use shared::{Clock, Init, Snapshot, SystemClock, PING_PERIOD_MS};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep};
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("Protocol error: {0}")]
    Codec(#[from] CodecError),
    #[error("Network task is gone")]
    ChannelClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Disconnected,
}

/// Inbound traffic, routed to its consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    State(ConnectionState),
    Init(Init),
    Snapshot(Snapshot),
    Pong { round_trip_ms: i64, server_time: i64 },
}

#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub url: String,
    /// Re-sent after every (re)connect
    pub join: Join,
    /// Artificial latency; half is added on send and half on receive
    pub fake_ping_ms: u64,
    pub ping_period: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl NetworkConfig {
    pub fn new(url: impl Into<String>, join: Join) -> Self {
        Self {
            url: url.into(),
            join,
            fake_ping_ms: 0,
            ping_period: Duration::from_millis(PING_PERIOD_MS),
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// Messages waiting for a connection. Nothing queued here is lost across a
/// reconnect, but order relative to messages sent after the gap is not kept.
#[derive(Debug, Default)]
pub struct Outbox {
    queue: VecDeque<Message>,
}

impl Outbox {
    pub fn push(&mut self, message: Message) {
        self.queue.push_back(message);
    }

    pub fn push_front(&mut self, message: Message) {
        self.queue.push_front(message);
    }

    pub fn pop(&mut self) -> Option<Message> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Cheap handle used by the game loop to send messages.
#[derive(Debug, Clone)]
pub struct NetworkHandle {
    tx: mpsc::UnboundedSender<Message>,
}

impl NetworkHandle {
    pub fn send(&self, message: Message) -> Result<(), NetworkError> {
        self.tx.send(message).map_err(|_| NetworkError::ChannelClosed)
    }
}

enum SessionEnd {
    /// The connection dropped; reconnect.
    Lost,
    /// Every handle is gone; stop for good.
    Shutdown,
}

pub struct NetworkClient {
    config: NetworkConfig,
    outbox: Outbox,
    outgoing: mpsc::UnboundedReceiver<Message>,
    events: mpsc::UnboundedSender<NetworkEvent>,
    clock: Arc<dyn Clock>,
}

impl NetworkClient {
    /// Starts the connection task. It runs until every [`NetworkHandle`] is
    /// dropped.
    pub fn spawn(
        config: NetworkConfig,
    ) -> (
        NetworkHandle,
        mpsc::UnboundedReceiver<NetworkEvent>,
        JoinHandle<()>,
    ) {
        let (tx, outgoing) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();
        let client = NetworkClient {
            config,
            outbox: Outbox::default(),
            outgoing,
            events,
            clock: Arc::new(SystemClock),
        };
        let task = tokio::spawn(client.run());
        (NetworkHandle { tx }, events_rx, task)
    }

    async fn run(mut self) {
        let mut backoff = self.config.initial_backoff;

        loop {
            self.emit(NetworkEvent::State(ConnectionState::Connecting));
            info!("Connecting to {}", self.config.url);

            match connect_async(self.config.url.as_str()).await {
                Ok((ws_stream, _)) => {
                    backoff = self.config.initial_backoff;
                    self.emit(NetworkEvent::State(ConnectionState::Connected));
                    info!("Connected to {}", self.config.url);

                    let end = self.session(ws_stream).await;
                    self.emit(NetworkEvent::State(ConnectionState::Disconnected));
                    match end {
                        Ok(SessionEnd::Shutdown) => return,
                        Ok(SessionEnd::Lost) => info!("Connection closed by server"),
                        Err(e) => warn!("Connection lost: {}", e),
                    }
                }
                Err(e) => warn!("Failed to connect to {}: {}", self.config.url, e),
            }

            if !self.wait_for_retry(backoff).await {
                return;
            }
            backoff = (backoff * 2).min(self.config.max_backoff);
        }
    }

    /// Sleeps for `backoff` while collecting outgoing messages into the outbox.
    /// Returns false if every handle was dropped meanwhile.
    async fn wait_for_retry(&mut self, backoff: Duration) -> bool {
        debug!("Reconnecting in {:?}", backoff);
        let retry = sleep(backoff);
        tokio::pin!(retry);

        loop {
            tokio::select! {
                _ = &mut retry => return true,
                message = self.outgoing.recv() => match message {
                    Some(message) => self.outbox.push(message),
                    None => return false,
                },
            }
        }
    }

    async fn session(
        &mut self,
        ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    ) -> Result<SessionEnd, NetworkError> {
        let (mut sink, mut stream) = ws_stream.split();

        let join = Message::Join(self.config.join.clone());
        self.send_frame(&mut sink, &join).await?;

        if !self.outbox.is_empty() {
            debug!("Flushing {} queued messages", self.outbox.len());
        }
        while let Some(message) = self.outbox.pop() {
            if let Err(e) = self.send_frame(&mut sink, &message).await {
                self.outbox.push_front(message);
                return Err(e);
            }
        }

        // First ping goes out right away, then every period.
        let mut ping_timer = interval(self.config.ping_period);

        loop {
            tokio::select! {
                inbound = stream.next() => match inbound {
                    Some(Ok(WsMessage::Text(text))) => {
                        self.simulate_latency().await;
                        if let Some(event) = route(text.as_str(), self.clock.now_ms()) {
                            self.emit(event);
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => return Ok(SessionEnd::Lost),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                },

                outgoing = self.outgoing.recv() => match outgoing {
                    Some(message) => {
                        if let Err(e) = self.send_frame(&mut sink, &message).await {
                            self.outbox.push(message);
                            return Err(e);
                        }
                    }
                    None => {
                        let _ = sink.close().await;
                        return Ok(SessionEnd::Shutdown);
                    }
                },

                _ = ping_timer.tick() => {
                    let ping = Message::Ping(Ping {
                        client_time: self.clock.now_ms(),
                    });
                    self.send_frame(&mut sink, &ping).await?;
                },
            }
        }
    }

    async fn send_frame(&self, sink: &mut WsSink, message: &Message) -> Result<(), NetworkError> {
        let frame = protocol::encode(message)?;
        self.simulate_latency().await;
        sink.send(WsMessage::Text(frame.into())).await?;
        Ok(())
    }

    async fn simulate_latency(&self) {
        if self.config.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.config.fake_ping_ms / 2)).await;
        }
    }

    fn emit(&self, event: NetworkEvent) {
        if self.events.send(event).is_err() {
            debug!("Network event dropped: no consumer");
        }
    }
}

/// Decodes one inbound frame into the event its consumer expects.
pub fn route(raw: &str, now_ms: i64) -> Option<NetworkEvent> {
    match protocol::decode(raw) {
        Ok(Message::Init(init)) => Some(NetworkEvent::Init(init)),
        Ok(Message::Snapshot(snapshot)) => Some(NetworkEvent::Snapshot(snapshot)),
        Ok(Message::Pong(pong)) => Some(NetworkEvent::Pong {
            round_trip_ms: now_ms - pong.client_time,
            server_time: pong.server_time,
        }),
        Ok(Message::Unknown(tag)) => {
            debug!("Ignoring unknown message type {:?}", tag);
            None
        }
        Ok(other) => {
            warn!("Unexpected {} message from server", other.tag());
            None
        }
        Err(e) => {
            warn!("Dropping malformed frame: {}", e);
            None
        }
    }
}
