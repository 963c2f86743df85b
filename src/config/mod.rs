//! Client configuration loaded from environment.

use std::time::Duration;

/// Which request/reply variant the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// One HTTP POST per exchange.
    Http,
    /// Lockstep REQ socket.
    Socket,
}

/// What the binary does after connecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Interactive,
    Bot,
}

/// Client configuration loaded from `.env` and environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Request/reply variant (`http` or `socket`).
    pub transport: TransportKind,
    /// HTTP base URL (e.g. `http://localhost:8080`).
    pub server_url: String,
    /// REQ endpoint (e.g. `tcp://localhost:5555`).
    pub request_endpoint: String,
    /// SUB endpoint for broadcasts (e.g. `tcp://localhost:5558`).
    pub broadcast_endpoint: String,
    /// Upper bound for a single request/reply exchange.
    pub request_timeout: Duration,
    /// Username to log in with; prompted for when unset.
    pub username: Option<String>,
    pub mode: RunMode,
    /// Log level: `error`, `warn`, `info`, `debug`, `trace`.
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport: TransportKind::Socket,
            server_url: "http://localhost:8080".to_string(),
            request_endpoint: "tcp://localhost:5555".to_string(),
            broadcast_endpoint: "tcp://localhost:5558".to_string(),
            request_timeout: Duration::from_secs(30),
            username: None,
            mode: RunMode::Interactive,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment. Call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self, ConfigLoadError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup; unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let transport = match lookup("CHAT_TRANSPORT") {
            Some(raw) => parse_transport(&raw)?,
            None => defaults.transport,
        };
        let mode = match lookup("CHAT_MODE") {
            Some(raw) => parse_mode(&raw)?,
            None => defaults.mode,
        };
        let request_timeout = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| ConfigLoadError::InvalidTimeout(raw.clone()))?;
                if secs == 0 {
                    return Err(ConfigLoadError::InvalidTimeout(raw));
                }
                Duration::from_secs(secs)
            }
            None => defaults.request_timeout,
        };

        let server_url = lookup("SERVER_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.server_url);
        let request_endpoint = lookup("REQUEST_ENDPOINT").unwrap_or(defaults.request_endpoint);
        let broadcast_endpoint =
            lookup("BROADCAST_ENDPOINT").unwrap_or(defaults.broadcast_endpoint);
        let username = lookup("CHAT_USER")
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        let log_level = lookup("LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            transport,
            server_url,
            request_endpoint,
            broadcast_endpoint,
            request_timeout,
            username,
            mode,
            log_level,
        })
    }
}

fn parse_transport(raw: &str) -> Result<TransportKind, ConfigLoadError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "http" => Ok(TransportKind::Http),
        "socket" | "zmq" => Ok(TransportKind::Socket),
        _ => Err(ConfigLoadError::InvalidTransport(raw.to_string())),
    }
}

fn parse_mode(raw: &str) -> Result<RunMode, ConfigLoadError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "interactive" => Ok(RunMode::Interactive),
        "bot" => Ok(RunMode::Bot),
        _ => Err(ConfigLoadError::InvalidMode(raw.to_string())),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Invalid CHAT_TRANSPORT: {0}")]
    InvalidTransport(String),
    #[error("Invalid CHAT_MODE: {0}")]
    InvalidMode(String),
    #[error("Invalid REQUEST_TIMEOUT_SECS: {0}")]
    InvalidTimeout(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.transport, TransportKind::Socket);
        assert_eq!(config.request_endpoint, "tcp://localhost:5555");
        assert_eq!(config.broadcast_endpoint, "tcp://localhost:5558");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.mode, RunMode::Interactive);
        assert!(config.username.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("CHAT_TRANSPORT", "HTTP"),
            ("SERVER_URL", "http://chat:8080/"),
            ("REQUEST_TIMEOUT_SECS", "5"),
            ("CHAT_USER", "  alice "),
            ("CHAT_MODE", "bot"),
        ]))
        .unwrap();
        assert_eq!(config.transport, TransportKind::Http);
        assert_eq!(config.server_url, "http://chat:8080");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.username.as_deref(), Some("alice"));
        assert_eq!(config.mode, RunMode::Bot);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("CHAT_TRANSPORT", "carrier-pigeon")])),
            Err(ConfigLoadError::InvalidTransport(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("REQUEST_TIMEOUT_SECS", "0")])),
            Err(ConfigLoadError::InvalidTimeout(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("CHAT_MODE", "daemon")])),
            Err(ConfigLoadError::InvalidMode(_))
        ));
    }
}
