use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default MQTT port used when the endpoint omits one.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Broker connection and topic settings for the SiramBro link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker endpoint, e.g. `tcp://192.168.1.23:1883` or `ws://192.168.1.23:9001`
    pub url: String,
    /// Username for broker authentication (empty = anonymous)
    pub user: String,
    /// Password for broker authentication
    pub pw: String,
    pub client_id: String,
    pub keep_alive_secs: u64,
    /// Pause between reconnect attempts after a transport error
    pub reconnect_delay_ms: u64,
    /// Capacity of the rumqttc request queue and of the event channel
    pub channel_capacity: usize,
    pub topics: TopicConfig,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            url: "ws://192.168.1.23:9001".to_string(),
            user: String::new(),
            pw: String::new(),
            client_id: "sirambro-viewer".to_string(),
            keep_alive_secs: 5,
            reconnect_delay_ms: 2000,
            channel_capacity: 100,
            topics: TopicConfig::default(),
        }
    }
}

impl MqttConfig {
    pub fn endpoint(&self) -> Result<BrokerEndpoint, ConfigError> {
        BrokerEndpoint::parse(&self.url)
    }

    pub fn has_credentials(&self) -> bool {
        !self.user.is_empty()
    }
}

impl fmt::Display for MqttConfig {
    // Password bleibt draußen
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.has_credentials() {
            write!(f, "{}@{}", self.user, self.url)
        } else {
            write!(f, "{}", self.url)
        }
    }
}

/// Topic names of the device protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    /// Inbound JSON telemetry
    pub sensors: String,
    /// Inbound plain-text pump state (`ON` / anything else)
    pub pump_status: String,
    /// Outbound activation command
    pub pump_control: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            sensors: "sirambro/sensors".to_string(),
            pump_status: "sirambro/pump/status".to_string(),
            pump_control: "sirambro/pump/control".to_string(),
        }
    }
}

impl TopicConfig {
    /// Topics the client subscribes to on every connection.
    pub fn inbound(&self) -> [&str; 2] {
        [self.sensors.as_str(), self.pump_status.as_str()]
    }
}

/// Where and how to reach the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerEndpoint {
    /// Plain MQTT over TCP
    Tcp { host: String, port: u16 },
    /// MQTT over WebSocket; rumqttc expects the full URL as host
    WebSocket { url: String, port: u16 },
}

impl BrokerEndpoint {
    /// Parses `tcp://host:port`, `mqtt://host:port`, `host:port`, `host` or
    /// `ws://host:port[/path]`.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConfigError::InvalidEndpoint(
                "broker url is empty".to_string(),
            ));
        }

        if let Some(rest) = raw.strip_prefix("ws://") {
            let authority = rest.split('/').next().unwrap_or_default();
            let (_, port) = split_host_port(authority, 80)?;
            return Ok(BrokerEndpoint::WebSocket {
                url: raw.to_string(),
                port,
            });
        }

        if raw.starts_with("wss://") {
            return Err(ConfigError::InvalidEndpoint(format!(
                "secure websockets are not supported: {}",
                raw
            )));
        }

        let authority = raw
            .strip_prefix("tcp://")
            .or_else(|| raw.strip_prefix("mqtt://"))
            .unwrap_or(raw);

        if authority.contains("://") {
            return Err(ConfigError::InvalidEndpoint(format!(
                "unknown scheme in {}",
                raw
            )));
        }

        let (host, port) = split_host_port(authority.trim_end_matches('/'), DEFAULT_MQTT_PORT)?;
        Ok(BrokerEndpoint::Tcp { host, port })
    }

    pub fn port(&self) -> u16 {
        match self {
            BrokerEndpoint::Tcp { port, .. } | BrokerEndpoint::WebSocket { port, .. } => *port,
        }
    }
}

impl fmt::Display for BrokerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BrokerEndpoint::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
            BrokerEndpoint::WebSocket { url, .. } => write!(f, "{}", url),
        }
    }
}

fn split_host_port(authority: &str, default_port: u16) -> Result<(String, u16), ConfigError> {
    let mut parts = authority.splitn(2, ':');
    let host = parts.next().unwrap_or_default();
    if host.is_empty() {
        return Err(ConfigError::InvalidEndpoint(format!(
            "missing host in {}",
            authority
        )));
    }

    let port = match parts.next() {
        Some(port) => port
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidEndpoint(format!("invalid port in {}", authority)))?,
        None => default_port,
    };

    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_websocket_endpoint_with_port() {
        let endpoint = BrokerEndpoint::parse("ws://192.168.1.23:9001").unwrap();
        assert_eq!(
            endpoint,
            BrokerEndpoint::WebSocket {
                url: "ws://192.168.1.23:9001".to_string(),
                port: 9001
            }
        );
    }

    #[test]
    fn websocket_path_is_kept_in_url() {
        let endpoint = BrokerEndpoint::parse("ws://broker.local:8080/mqtt").unwrap();
        assert_eq!(endpoint.port(), 8080);
        assert_eq!(endpoint.to_string(), "ws://broker.local:8080/mqtt");
    }

    #[test]
    fn parses_tcp_forms() {
        assert_eq!(
            BrokerEndpoint::parse("tcp://broker.local:1884").unwrap(),
            BrokerEndpoint::Tcp {
                host: "broker.local".to_string(),
                port: 1884
            }
        );
        assert_eq!(
            BrokerEndpoint::parse("10.0.0.2:1900").unwrap(),
            BrokerEndpoint::Tcp {
                host: "10.0.0.2".to_string(),
                port: 1900
            }
        );
        assert_eq!(
            BrokerEndpoint::parse("broker.local").unwrap().port(),
            DEFAULT_MQTT_PORT
        );
    }

    #[test]
    fn rejects_broken_endpoints() {
        assert!(BrokerEndpoint::parse("").is_err());
        assert!(BrokerEndpoint::parse("tcp://:1883").is_err());
        assert!(BrokerEndpoint::parse("broker:notaport").is_err());
        assert!(BrokerEndpoint::parse("http://broker:80").is_err());
        assert!(BrokerEndpoint::parse("wss://broker:443").is_err());
    }

    #[test]
    fn display_hides_password() {
        let config = MqttConfig {
            user: "garden".to_string(),
            pw: "secret".to_string(),
            ..MqttConfig::default()
        };
        let shown = config.to_string();
        assert!(shown.starts_with("garden@"));
        assert!(!shown.contains("secret"));
    }
}
