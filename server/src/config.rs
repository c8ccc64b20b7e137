//! Runtime settings for the authoritative server.

use shared::DEFAULT_TICK_RATE;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Player slots; a join beyond this closes the session
    pub max_clients: usize,
    /// Broadcast a snapshot every this many ticks
    pub snapshot_interval: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            tick_rate: DEFAULT_TICK_RATE,
            max_clients: 32,
            snapshot_interval: 1,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tick_period(&self) -> Duration {
        shared::tick_period(self.tick_rate)
    }

    pub fn snapshot_every(&self) -> u64 {
        self.snapshot_interval.max(1) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.address(), "127.0.0.1:8080");
        assert_eq!(config.tick_period(), Duration::from_millis(50));
        assert_eq!(config.snapshot_every(), 1);
    }

    #[test]
    fn test_zero_snapshot_interval_means_every_tick() {
        let config = ServerConfig {
            snapshot_interval: 0,
            ..Default::default()
        };
        assert_eq!(config.snapshot_every(), 1);
    }
}
