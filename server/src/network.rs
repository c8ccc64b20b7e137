//! Server network layer: WebSocket accept loop and the fixed-rate tick loop

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::game::GameState;
use crate::registry::{IdGen, Registry};
use crate::session::handle_connection;
use log::{debug, error, info, warn};
use shared::protocol::{self, Message};
use shared::{Clock, CommandBuffer, QueuedCommand, SystemClock, TickPacer};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

/// Everything sessions and the tick loop share.
pub struct ServerContext {
    pub config: ServerConfig,
    pub ids: Arc<IdGen>,
    pub registry: Registry,
    /// Single hand-off point from sessions (producers) to the tick loop
    pub pipeline: CommandBuffer<QueuedCommand>,
    pub clients: RwLock<ClientManager>,
    pub clock: Arc<dyn Clock>,
}

impl ServerContext {
    pub fn new(config: ServerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            clients: RwLock::new(ClientManager::new(config.max_clients)),
            config,
            ids: Arc::new(IdGen::new()),
            registry: Registry::new(),
            pipeline: CommandBuffer::new(),
            clock,
        }
    }
}

/// Authoritative game server
pub struct Server {
    listener: TcpListener,
    ctx: Arc<ServerContext>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, ServerError> {
        Self::with_clock(config, Arc::new(SystemClock)).await
    }

    pub async fn with_clock(
        config: ServerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.address()).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            ctx: Arc::new(ServerContext::new(config, clock)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn context(&self) -> Arc<ServerContext> {
        Arc::clone(&self.ctx)
    }

    /// Runs the tick loop and accepts connections until the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        let game = GameState::new(self.ctx.config.tick_rate, self.ctx.ids.clone());
        let tick_loop = tokio::spawn(run_game_loop(Arc::clone(&self.ctx), game));

        info!(
            "Server started: {} Hz, up to {} players",
            self.ctx.config.tick_rate, self.ctx.config.max_clients
        );

        let result = self.accept_loop().await;
        tick_loop.abort();
        result
    }

    async fn accept_loop(&self) -> Result<(), ServerError> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let ctx = Arc::clone(&self.ctx);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, ctx).await {
                    error!("Connection {} ended with error: {}", addr, e);
                }
            });
        }
    }
}

/// Fixed-rate loop; the only code that mutates the world.
async fn run_game_loop(ctx: Arc<ServerContext>, mut game: GameState) {
    let mut pacer = TickPacer::new(ctx.config.tick_period());
    let snapshot_every = ctx.config.snapshot_every();

    loop {
        let started = Instant::now();

        let commands = ctx.pipeline.drain();
        if !commands.is_empty() {
            let mut clients = ctx.clients.write().await;
            for command in &commands {
                if let Some(player) = command.issuer {
                    clients.mark_command_processed(player, command.sequence);
                }
            }
        }

        game.set_players(ctx.registry.snapshot());
        game.step(&commands, ctx.clock.now_ms());

        if game.tick() % snapshot_every == 0 {
            broadcast_snapshots(&ctx, &mut game).await;
        }

        if pacer.record(started.elapsed()) {
            let stats = pacer.stats();
            warn!(
                "Tick {} overran: {:?} > {:?} ({} overruns)",
                stats.tick,
                stats.last_tick,
                pacer.period(),
                stats.overruns
            );
        }

        let stats = pacer.stats();
        if stats.tick % 60 == 0 {
            debug!(
                "Tick {}: {} players, {} entities, last tick {:?}, {} overruns",
                stats.tick,
                game.world().players.len(),
                game.world().entities.len(),
                stats.last_tick,
                stats.overruns
            );
        }

        tokio::time::sleep(pacer.next_delay()).await;
    }
}

/// Sends each client either a full snapshot (first one after joining) or the
/// shared delta, stamped with that client's own acknowledgement.
async fn broadcast_snapshots(ctx: &ServerContext, game: &mut GameState) {
    let delta = game.take_delta();

    let mut clients = ctx.clients.write().await;
    for client in clients.clients_mut() {
        let snapshot = if client.needs_full_snapshot {
            game.full_snapshot(client.last_acknowledged)
        } else {
            game.delta_snapshot(&delta, client.last_acknowledged)
        };

        match protocol::encode(&Message::Snapshot(snapshot)) {
            // A dropped frame breaks the delta chain for this client.
            Ok(frame) => client.needs_full_snapshot = !client.send(frame),
            Err(e) => warn!("Failed to encode snapshot for player {}: {}", client.id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{
        Command, EntitySpec, ManualClock, Owner, Player, Priority, UnitKind, Vec2, World,
    };
    use tokio::sync::mpsc;

    fn context() -> Arc<ServerContext> {
        Arc::new(ServerContext::new(
            ServerConfig::default(),
            Arc::new(ManualClock::new(5000)),
        ))
    }

    fn decode_snapshot(frame: &str) -> shared::Snapshot {
        match protocol::decode(frame).unwrap() {
            Message::Snapshot(snapshot) => snapshot,
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_first_snapshot_is_full_then_delta() {
        let ctx = context();
        let (tx, mut rx) = mpsc::channel(16);
        ctx.registry.add(Player::new(1, "Ann", "#ff0000"));
        ctx.clients
            .write()
            .await
            .add_client(1, "127.0.0.1:1".parse().unwrap(), tx)
            .unwrap();

        let mut game = GameState::new(20, ctx.ids.clone());
        game.set_players(ctx.registry.snapshot());
        ctx.pipeline.enqueue(
            QueuedCommand {
                issuer: Some(1),
                sequence: 4,
                command: Command::SpawnUnit {
                    unit: EntitySpec {
                        id: None,
                        kind: UnitKind::UnitSoldier,
                        x: 10.0,
                        y: 10.0,
                        w: 32.0,
                        h: 32.0,
                        hp: 100,
                        owner: Owner::Neutral,
                        speed: 90.0,
                        color: "green".to_string(),
                    },
                },
            },
            Priority::Low,
        );

        let commands = ctx.pipeline.drain();
        ctx.clients.write().await.mark_command_processed(1, 4);
        game.step(&commands, 5000);
        broadcast_snapshots(&ctx, &mut game).await;

        let first = decode_snapshot(&rx.try_recv().unwrap());
        assert!(first.full);
        assert_eq!(first.last_acknowledged_sequence, 4);
        assert_eq!(first.server_time, 5000);
        assert!(first.entities.contains_key("u1"));
        assert!(first.players.contains_key(&1));

        game.step(&[], 5050);
        broadcast_snapshots(&ctx, &mut game).await;
        let second = decode_snapshot(&rx.try_recv().unwrap());
        assert!(!second.full);
        assert!(second.entities.is_empty());
        assert_eq!(second.last_acknowledged_sequence, 4);
    }

    #[tokio::test]
    async fn test_dropped_delta_is_recovered_by_full_snapshot() {
        let ctx = context();
        let (tx, mut rx) = mpsc::channel(1);
        ctx.registry.add(Player::new(1, "Ann", "#ff0000"));
        ctx.clients
            .write()
            .await
            .add_client(1, "127.0.0.1:1".parse().unwrap(), tx)
            .unwrap();

        let mut game = GameState::new(20, ctx.ids.clone());
        game.set_players(ctx.registry.snapshot());
        let spawn = QueuedCommand::system(Command::SpawnUnit {
            unit: EntitySpec {
                id: None,
                kind: UnitKind::UnitSoldier,
                x: 0.0,
                y: 0.0,
                w: 20.0,
                h: 20.0,
                hp: 100,
                owner: Owner::Player(1),
                speed: 1000.0,
                color: "green".to_string(),
            },
        });
        game.step(&[spawn], 5000);
        broadcast_snapshots(&ctx, &mut game).await;

        // The queue is still holding the full snapshot, so this delta is lost.
        let order = QueuedCommand::system(Command::MoveLine {
            ids: vec!["u1".to_string()],
            target: Vec2::new(30.0, 0.0),
        });
        game.step(&[order], 5050);
        broadcast_snapshots(&ctx, &mut game).await;

        let mut client_world = World::new();
        client_world.apply_snapshot(&decode_snapshot(&rx.try_recv().unwrap()));
        assert!(rx.try_recv().is_err());

        for tick in 0..5 {
            game.step(&[], 5100 + tick * 50);
            broadcast_snapshots(&ctx, &mut game).await;
            while let Ok(frame) = rx.try_recv() {
                client_world.apply_snapshot(&decode_snapshot(&frame));
            }
        }

        let server_unit = game.world().entity("u1").unwrap();
        let client_unit = client_world.entity("u1").unwrap();
        assert_eq!(server_unit.x, 30.0);
        assert_eq!(client_unit.x, server_unit.x);
        assert_eq!(client_unit.y, server_unit.y);
    }

    #[tokio::test]
    async fn test_server_binds_ephemeral_port() {
        let config = ServerConfig {
            port: 0,
            ..Default::default()
        };
        let server = Server::new(config).await.unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
        assert!(server.context().registry.is_empty());
    }
}
