use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::Server;
use shared::{DEFAULT_TICK_RATE, WS_PATH};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,
    /// Tick rate (updates per second)
    #[arg(short, long, default_value_t = DEFAULT_TICK_RATE)]
    tick_rate: u32,
    /// Maximum number of joined players
    #[arg(short, long, default_value = "32")]
    max_clients: usize,
    /// Broadcast a snapshot every N ticks
    #[arg(short, long, default_value = "1")]
    snapshot_interval: u32,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            host: args.host,
            port: args.port,
            tick_rate: args.tick_rate,
            max_clients: args.max_clients,
            snapshot_interval: args.snapshot_interval,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=debug for per-tick statistics");
    }
    env_logger::init();

    let config = ServerConfig::from(Args::parse());
    let server = Server::new(config).await?;
    info!("Clients connect to ws://{}{}", server.local_addr()?, WS_PATH);

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
