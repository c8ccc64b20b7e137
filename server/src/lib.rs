//! # Game Server Library
//!
//! Authoritative real-time core for a multiplayer strategy game. The server
//! owns the canonical world of units, applies player commands at a fixed tick
//! rate and broadcasts snapshots so every client can reconcile its local
//! prediction against ground truth.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! A single tick loop drains queued commands and runs the shared systems
//! (lifecycle, orders, movement) in that order. It is the only code that
//! mutates the world; sessions never touch it directly.
//!
//! ### Connection Sessions
//! Each WebSocket connection gets its own task. Pings are answered on the spot,
//! `join` binds a fresh player id to the connection and commands are handed to
//! the tick loop through the command pipeline. A failing connection is torn
//! down on its own without affecting anyone else.
//!
//! ### Snapshot Broadcasting
//! After each tick (or every `snapshot_interval` ticks) every client receives a
//! snapshot: a full one right after joining, deltas afterwards. Each snapshot
//! carries the highest command sequence the simulation has consumed from that
//! particular client.
//!
//! ## Module Organization
//!
//! ### Registry Module (`registry`)
//! Player and entity id counters, and the concurrent set of joined players.
//!
//! ### Client Manager Module (`client_manager`)
//! Per-client outbound queues, acknowledgement tracking and capacity limits.
//!
//! ### Session Module (`session`)
//! The read loop, tag dispatch and exactly-once teardown of one connection.
//!
//! ### Game Module (`game`)
//! The authoritative model plus full and delta snapshot building.
//!
//! ### Network Module (`network`)
//! The accept loop, the shared server context and the self-correcting tick
//! loop, which sleeps `max(0, period - last tick duration)` between ticks.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         port: 8080,
//!         tick_rate: 20,
//!         ..Default::default()
//!     };
//!
//!     let server = Server::new(config).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod error;
pub mod game;
pub mod network;
pub mod registry;
pub mod session;
