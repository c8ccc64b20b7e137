//! Client run loop: ties the network task, the prediction model and the
//! renderer together.

use crate::input::InputScript;
use crate::network::{ConnectionState, NetworkClient, NetworkConfig, NetworkError, NetworkEvent, NetworkHandle};
use crate::render::{interpolation_alpha, FrameSink, FrameView};
use crate::sync::{Reconciliation, Synchronizer};
use log::{debug, info};
use shared::protocol::{Join, Message};
use shared::{tick_period, Command, DEFAULT_TICK_RATE, WS_PATH};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: String,
    pub name: String,
    pub color: String,
    /// Sender tag carried by every command
    pub client_id: String,
    pub tick_rate: u32,
    pub fake_ping_ms: u64,
    /// Issue scripted commands instead of waiting for a player
    pub demo: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: format!("ws://127.0.0.1:8080{}", WS_PATH),
            name: "Player".to_string(),
            color: "#3070ff".to_string(),
            client_id: "client".to_string(),
            tick_rate: DEFAULT_TICK_RATE,
            fake_ping_ms: 0,
            demo: false,
        }
    }
}

pub struct Client {
    sync: Synchronizer,
    network: NetworkHandle,
    events: mpsc::UnboundedReceiver<NetworkEvent>,
    sink: Box<dyn FrameSink + Send>,
    script: Option<InputScript>,
    state: ConnectionState,
    ping_ms: Option<i64>,
    tick_period: Duration,
    last_tick_at: Instant,
}

impl Client {
    /// Starts the network task and returns a client ready to [`Client::run`].
    pub fn new(config: ClientConfig, sink: Box<dyn FrameSink + Send>) -> Self {
        let mut network_config = NetworkConfig::new(
            config.server_url.clone(),
            Join {
                name: config.name.clone(),
                color: config.color.clone(),
            },
        );
        network_config.fake_ping_ms = config.fake_ping_ms;
        let (network, events, _task) = NetworkClient::spawn(network_config);

        let script = config.demo.then(|| InputScript::new(3, config.color.clone()));

        Self {
            sync: Synchronizer::new(config.tick_rate, config.client_id),
            network,
            events,
            sink,
            script,
            state: ConnectionState::Connecting,
            ping_ms: None,
            tick_period: tick_period(config.tick_rate),
            last_tick_at: Instant::now(),
        }
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.sync
    }

    /// Predicts `command` locally and sends it to the server.
    pub fn issue(&mut self, command: Command) -> Result<(), NetworkError> {
        let frame = self.sync.issue(command);
        self.network.send(Message::Command(frame))
    }

    fn handle_event(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::State(state) => {
                info!("Connection state: {:?}", state);
                self.state = state;
            }
            NetworkEvent::Init(init) => {
                info!("Joined as player {} ({} players online)", init.my_id, init.players.len());
                self.sync.on_init(&init);
            }
            NetworkEvent::Snapshot(snapshot) => match self.sync.on_snapshot(&snapshot) {
                Reconciliation::Resimulated { replayed } => {
                    debug!("Resimulated after snapshot, replayed {}", replayed)
                }
                Reconciliation::Blended { spawned, resynced } if spawned + resynced > 0 => {
                    debug!("Snapshot blended: {} spawned, {} resynced", spawned, resynced)
                }
                Reconciliation::Blended { .. } => {}
            },
            NetworkEvent::Pong {
                round_trip_ms,
                server_time,
            } => {
                debug!("Ping {}ms (server time {})", round_trip_ms, server_time);
                self.ping_ms = Some(round_trip_ms);
            }
        }
    }

    fn render_frame(&mut self) {
        let alpha = interpolation_alpha(self.last_tick_at.elapsed(), self.tick_period);
        let world = self.sync.world();
        let frame = FrameView {
            my_id: world.my_id,
            players: &world.players,
            entities: &world.entities,
            alpha,
            ping_ms: self.ping_ms,
        };
        self.sink.render(&frame);
    }

    fn run_script(&mut self) -> Result<(), NetworkError> {
        if self.state != ConnectionState::Connected {
            return Ok(());
        }
        let Some(script) = self.script.as_mut() else {
            return Ok(());
        };
        match script.next_command(self.sync.world()) {
            Some(command) => self.issue(command),
            None => Ok(()),
        }
    }

    /// Runs until Ctrl+C or until the network task goes away.
    pub async fn run(&mut self) -> Result<(), NetworkError> {
        let mut tick_interval = interval(self.tick_period);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut frame_interval = interval(Duration::from_millis(16));
        frame_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut script_interval = interval(Duration::from_secs(1));
        let demo = self.script.is_some();

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => return Err(NetworkError::ChannelClosed),
                },

                _ = tick_interval.tick() => {
                    self.sync.tick();
                    self.last_tick_at = Instant::now();
                },

                _ = frame_interval.tick() => self.render_frame(),

                _ = script_interval.tick(), if demo => self.run_script()?,

                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, disconnecting");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::LogSink;
    use shared::{Init, Snapshot};
    use std::collections::BTreeMap;

    fn offline_client() -> Client {
        let config = ClientConfig {
            server_url: "ws://127.0.0.1:1/ws".to_string(),
            ..Default::default()
        };
        Client::new(config, Box::new(LogSink::default()))
    }

    #[tokio::test]
    async fn test_events_drive_synchronizer() {
        let mut client = offline_client();
        let mut players = BTreeMap::new();
        players.insert(3, shared::Player::new(3, "Cy", "#00f"));

        client.handle_event(NetworkEvent::Init(Init {
            my_id: 3,
            server_time: 10,
            players: players.clone(),
        }));
        assert_eq!(client.synchronizer().world().my_id, Some(3));

        client.handle_event(NetworkEvent::Snapshot(Snapshot {
            server_time: 20,
            players,
            ..Default::default()
        }));
        assert_eq!(client.synchronizer().world().time, 20);

        client.handle_event(NetworkEvent::Pong {
            round_trip_ms: 42,
            server_time: 0,
        });
        assert_eq!(client.ping_ms, Some(42));
    }

    #[tokio::test]
    async fn test_issue_queues_while_offline() {
        let mut client = offline_client();
        client
            .issue(Command::Stop {
                ids: vec!["u1".to_string()],
            })
            .unwrap();
        assert_eq!(client.synchronizer().pending().len(), 1);
        client.render_frame();
    }
}
