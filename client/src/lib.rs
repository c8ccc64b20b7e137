//! # Game Client Library
//!
//! Client side of the real-time core: it keeps a connection to the
//! authoritative server, predicts the effect of the player's commands locally
//! and reconciles that prediction against server snapshots without visible
//! snapping.
//!
//! ## Architecture Overview
//!
//! ### Client-Side Prediction
//! Every command the player issues gets a sequence number, is sent to the
//! server and is applied to a local copy of the simulation on the next local
//! tick. The local model runs the same systems as the server, so predicted
//! movement matches what the server will compute.
//!
//! ### Server Reconciliation
//! Snapshots acknowledge commands by sequence. Acknowledged commands are
//! dropped from the pending buffer. Entities whose predicted position drifted
//! from the authoritative one are walked back over a few ticks with a `Sync`
//! command. When many commands are still in flight the client instead replays
//! them on a shadow world seeded from the snapshot and swaps it in.
//!
//! ### Connection Resilience
//! While disconnected, outgoing messages wait in an outbox. After each
//! reconnect the client joins again and flushes the outbox. Reconnects back off
//! exponentially.
//!
//! ## Module Organization
//!
//! ### Commands Module (`commands`)
//! Sequence numbering and the buffer of unacknowledged commands.
//!
//! ### Sync Module (`sync`)
//! The prediction model and both reconciliation strategies.
//!
//! ### Network Module (`network`)
//! WebSocket connection task with ping timer, outbox, fake latency and
//! reconnect.
//!
//! ### Render Module (`render`)
//! The read-only frame view handed to renderers, plus interpolation.
//!
//! ### Input Module (`input`)
//! A scripted command source for headless runs.
//!
//! ### Game Module (`game`)
//! The run loop tying everything together.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::game::{Client, ClientConfig};
//! use client::render::LogSink;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig {
//!         name: "Ann".to_string(),
//!         color: "#ff0000".to_string(),
//!         demo: true,
//!         ..Default::default()
//!     };
//!
//!     let mut client = Client::new(config, Box::new(LogSink::default()));
//!     client.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod game;
pub mod input;
pub mod network;
pub mod render;
pub mod sync;
