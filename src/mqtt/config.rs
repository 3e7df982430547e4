use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Broker address and credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttServer {
    /// `host:port`; the port defaults to 1883
    pub url: String,
    pub user: String,
    pub pw: String,
}

impl Default for MqttServer {
    fn default() -> Self {
        Self {
            url: "localhost:1883".to_string(),
            user: String::new(),
            pw: String::new(),
        }
    }
}

impl fmt::Display for MqttServer {
    /// Password is left out
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.user.is_empty() {
            write!(f, "{}", self.url)
        } else {
            write!(f, "{}@{}", self.user, self.url)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub server: MqttServer,
    pub client_id: String,
    /// Topic every payload is published to
    pub topic: String,
    pub keep_alive_secs: u64,
    pub connect_timeout_secs: u64,
    /// Request channel capacity of the rumqttc client
    pub capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            server: MqttServer::default(),
            client_id: "padstream".to_string(),
            topic: "padstream/input".to_string(),
            keep_alive_secs: 5,
            connect_timeout_secs: 5,
            capacity: 100,
        }
    }
}

impl MqttConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }
}
