/// Server settings read from the environment.
use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// How often collected table deltas are flushed
    pub update_interval: Duration,
    /// How often responses to direct requests are flushed
    pub priority_interval: Duration,
    /// How often heartbeat pings are sent
    pub heartbeat_interval: Duration,
    /// How long before lack of client response causes a timeout
    pub client_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            update_interval: Duration::from_millis(250),
            priority_interval: Duration::from_millis(50),
            heartbeat_interval: Duration::from_secs(5),
            client_timeout: Duration::from_secs(10),
        }
    }
}

fn parse<T: std::str::FromStr>(name: &str, value: Option<String>, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| Error::InvalidConfig {
            name: name.to_string(),
            value,
        }),
    }
}

/// A non-zero period in milliseconds.
fn millis(name: &str, value: Option<String>, default: Duration) -> Result<Duration> {
    let raw = value.clone();
    match parse(name, value, default.as_millis() as u64)? {
        0 => Err(Error::InvalidConfig {
            name: name.to_string(),
            value: raw.unwrap_or_default(),
        }),
        ms => Ok(Duration::from_millis(ms)),
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any name to value lookup; unset names keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = ServerConfig::default();
        let config = ServerConfig {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse("PORT", lookup("PORT"), defaults.port)?,
            update_interval: millis(
                "LIVEGRID_UPDATE_INTERVAL_MS",
                lookup("LIVEGRID_UPDATE_INTERVAL_MS"),
                defaults.update_interval,
            )?,
            priority_interval: millis(
                "LIVEGRID_PRIORITY_INTERVAL_MS",
                lookup("LIVEGRID_PRIORITY_INTERVAL_MS"),
                defaults.priority_interval,
            )?,
            heartbeat_interval: millis(
                "LIVEGRID_HEARTBEAT_INTERVAL_MS",
                lookup("LIVEGRID_HEARTBEAT_INTERVAL_MS"),
                defaults.heartbeat_interval,
            )?,
            client_timeout: millis(
                "LIVEGRID_CLIENT_TIMEOUT_MS",
                lookup("LIVEGRID_CLIENT_TIMEOUT_MS"),
                defaults.client_timeout,
            )?,
        };
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.port, 8080);
        assert_eq!(config.update_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "9000"),
            ("LIVEGRID_PRIORITY_INTERVAL_MS", "20"),
        ]))
        .unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.priority_interval, Duration::from_millis(20));
        assert_eq!(config.client_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_bad_numbers_are_errors() {
        let err = ServerConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value 'eighty' for PORT");

        let err = ServerConfig::from_lookup(lookup(&[("LIVEGRID_CLIENT_TIMEOUT_MS", "-1")])).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn test_zero_periods_are_errors() {
        for name in [
            "LIVEGRID_UPDATE_INTERVAL_MS",
            "LIVEGRID_PRIORITY_INTERVAL_MS",
            "LIVEGRID_HEARTBEAT_INTERVAL_MS",
            "LIVEGRID_CLIENT_TIMEOUT_MS",
        ] {
            let err = ServerConfig::from_lookup(lookup(&[(name, "0")])).unwrap_err();
            assert_eq!(err.to_string(), format!("Invalid value '0' for {}", name));
        }
        let config = ServerConfig::from_lookup(lookup(&[("LIVEGRID_UPDATE_INTERVAL_MS", "1")])).unwrap();
        assert_eq!(config.update_interval, Duration::from_millis(1));
    }
}
