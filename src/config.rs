use std::{env, net::SocketAddr, time::Duration};

use clap::ValueEnum;
use thiserror::Error;

pub const DEFAULT_WEATHER_API_URL: &str = "https://httpbin.org/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// Unary, push and duplex adapters over HTTP.
    #[default]
    Http,
    /// Duplex adapter over stdin/stdout.
    Stdio,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub bind_port: u16,
    pub transport: TransportMode,
    pub ping_interval: Duration,
    pub weather_api_url: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("MCP_TRANSPORT must be one of: http, stdio")]
    InvalidTransport,
    #[error("MCP_PING_INTERVAL_SECS must be a positive integer")]
    InvalidPingInterval,
    #[error("WEATHER_API_URL must be an http(s) URL")]
    InvalidWeatherUrl,
    #[error("invalid bind address or port")]
    InvalidSocket,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            bind_port: 8000,
            transport: TransportMode::Http,
            ping_interval: Duration::from_secs(30),
            weather_api_url: DEFAULT_WEATHER_API_URL.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_addr = env::var("BIND_ADDR").unwrap_or(defaults.bind_addr);
        let bind_port = env::var("BIND_PORT")
            .ok()
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(defaults.bind_port);
        let transport = env::var("MCP_TRANSPORT")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(|value| {
                TransportMode::from_str(&value, true).map_err(|_| ConfigError::InvalidTransport)
            })
            .transpose()?
            .unwrap_or(defaults.transport);
        let ping_interval = env::var("MCP_PING_INTERVAL_SECS")
            .ok()
            .map(|value| {
                value
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .map(Duration::from_secs)
                    .ok_or(ConfigError::InvalidPingInterval)
            })
            .transpose()?
            .unwrap_or(defaults.ping_interval);
        let weather_api_url = env::var("WEATHER_API_URL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(|value| {
                if value.starts_with("http://") || value.starts_with("https://") {
                    Ok(value)
                } else {
                    Err(ConfigError::InvalidWeatherUrl)
                }
            })
            .transpose()?
            .unwrap_or(defaults.weather_api_url);

        let config = Self {
            bind_addr,
            bind_port,
            transport,
            ping_interval,
            weather_api_url,
        };

        let _ = config.bind_socket()?;
        Ok(config)
    }

    /// Applies command-line overrides on top of the environment.
    pub fn with_overrides(mut self, transport: Option<TransportMode>, port: Option<u16>) -> Self {
        if let Some(transport) = transport {
            self.transport = transport;
        }
        if let Some(port) = port {
            self.bind_port = port;
        }
        self
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    fn clear_env() {
        for key in [
            "BIND_ADDR",
            "BIND_PORT",
            "MCP_TRANSPORT",
            "MCP_PING_INTERVAL_SECS",
            "WEATHER_API_URL",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn parse_defaults() {
        clear_env();

        let config = Config::from_env().expect("config should parse");
        assert_eq!(config.bind_addr, "127.0.0.1");
        assert_eq!(config.bind_port, 8000);
        assert_eq!(config.transport, TransportMode::Http);
        assert_eq!(config.ping_interval, Duration::from_secs(30));
        assert_eq!(config.weather_api_url, DEFAULT_WEATHER_API_URL);
    }

    #[test]
    #[serial]
    fn parses_overrides_from_env() {
        clear_env();
        env::set_var("BIND_PORT", "9100");
        env::set_var("MCP_TRANSPORT", "STDIO");
        env::set_var("MCP_PING_INTERVAL_SECS", "5");
        env::set_var("WEATHER_API_URL", "http://127.0.0.1:9999/weather");

        let config = Config::from_env().expect("config should parse");
        assert_eq!(config.bind_port, 9100);
        assert_eq!(config.transport, TransportMode::Stdio);
        assert_eq!(config.ping_interval, Duration::from_secs(5));
        assert_eq!(config.weather_api_url, "http://127.0.0.1:9999/weather");
        clear_env();
    }

    #[test]
    #[serial]
    fn invalid_port_fails() {
        clear_env();
        env::set_var("BIND_PORT", "99999");

        let err = Config::from_env().expect_err("expected invalid port error");
        assert!(matches!(err, ConfigError::InvalidPort));
        clear_env();
    }

    #[test]
    #[serial]
    fn zero_ping_interval_fails() {
        clear_env();
        env::set_var("MCP_PING_INTERVAL_SECS", "0");

        let err = Config::from_env().expect_err("expected invalid interval error");
        assert!(matches!(err, ConfigError::InvalidPingInterval));
        clear_env();
    }

    #[test]
    #[serial]
    fn unknown_transport_fails() {
        clear_env();
        env::set_var("MCP_TRANSPORT", "carrier-pigeon");

        let err = Config::from_env().expect_err("expected invalid transport error");
        assert!(matches!(err, ConfigError::InvalidTransport));
        clear_env();
    }

    #[test]
    fn cli_overrides_win() {
        let config = Config::default().with_overrides(Some(TransportMode::Stdio), Some(8123));
        assert_eq!(config.transport, TransportMode::Stdio);
        assert_eq!(config.bind_port, 8123);
    }
}
