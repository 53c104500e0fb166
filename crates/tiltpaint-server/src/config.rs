//! Command line and environment configuration.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Default per-connection outbound queue length.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// TiltPaint relay server
#[derive(Debug, Clone, Parser)]
#[command(author, version, about)]
pub struct ServerConfig {
    /// Address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// History file (JSON Lines, one stroke per line)
    #[arg(long, env = "TILTPAINT_HISTORY", default_value = "data/strokes.jsonl")]
    pub history: PathBuf,

    /// Keep history in memory only
    #[arg(long, env = "TILTPAINT_NO_PERSIST")]
    pub no_persist: bool,

    /// Directory of client files served over plain HTTP
    #[arg(long, env = "TILTPAINT_STATIC_DIR", default_value = "public")]
    pub static_dir: PathBuf,

    /// Send strokes back to the client that painted them
    #[arg(long, env = "TILTPAINT_ECHO")]
    pub echo: bool,

    /// Frames buffered per client before it is dropped as too slow
    #[arg(long, env = "TILTPAINT_QUEUE_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Close connections that stay silent this long
    #[arg(long, env = "TILTPAINT_IDLE_TIMEOUT_SECS")]
    pub idle_timeout_secs: Option<u64>,
}

impl ServerConfig {
    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            history: PathBuf::from("data/strokes.jsonl"),
            no_persist: false,
            static_dir: PathBuf::from("public"),
            echo: false,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            idle_timeout_secs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_without_arguments() {
        let config = ServerConfig::try_parse_from(["tiltpaint-server"]).unwrap();
        assert!(config.queue_capacity > 0);
    }

    #[test]
    fn test_flags() {
        let config = ServerConfig::try_parse_from([
            "tiltpaint-server",
            "--port",
            "8080",
            "--host",
            "127.0.0.1",
            "--no-persist",
            "--echo",
            "--idle-timeout-secs",
            "30",
        ])
        .unwrap();

        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert!(config.no_persist);
        assert!(config.echo);
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(30)));
    }
}
