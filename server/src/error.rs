//! Error types for the game server.

use shared::protocol::CodecError;
use tokio_tungstenite::tungstenite;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Binding or accepting on the listener failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket handshake or transport failure on a single connection
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("Protocol error: {0}")]
    Codec(#[from] CodecError),

    /// A join arrived while every player slot was taken
    #[error("Server full ({0} players)")]
    ServerFull(usize),
}
