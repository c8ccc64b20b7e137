use clap::Parser;
use client::game::{Client, ClientConfig};
use client::render::LogSink;
use log::info;
use rand::Rng;
use shared::DEFAULT_TICK_RATE;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket URL of the server
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:8080/ws")]
    server: String,

    /// Player name sent on join
    #[arg(short = 'n', long, default_value = "Player")]
    name: String,

    /// Player color sent on join
    #[arg(short = 'c', long, default_value = "#3070ff")]
    color: String,

    /// Local prediction ticks per second
    #[arg(short = 't', long, default_value_t = DEFAULT_TICK_RATE)]
    tick_rate: u32,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Issue scripted commands
    #[arg(short = 'd', long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }

    let config = ClientConfig {
        server_url: args.server,
        name: args.name,
        color: args.color,
        client_id: format!("client-{:06x}", rand::thread_rng().gen_range(0..0x1000000)),
        tick_rate: args.tick_rate,
        fake_ping_ms: args.fake_ping,
        demo: args.demo,
    };

    let mut client = Client::new(config, Box::new(LogSink::default()));
    client.run().await?;

    Ok(())
}
