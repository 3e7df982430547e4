//! rumqttc link with a statum lifecycle
//!
//! ```text
//! Configured ──connect()──► Connected ──close()──► Closed
//! ```
//!
//! Only a `Connected` link is a [`Transport`]. The rumqttc event loop is driven by a
//! pump task that mirrors the connection state into a watch channel; when the loop
//! errors the pump stops and the link reports itself disconnected. Reconnecting is
//! left to the caller.
//!
//! Closing queues a DISCONNECT; the pump keeps polling until it has gone out (or
//! [`DISCONNECT_GRACE`] passes) before it drops the socket.

use crate::mqtt::config::MqttConfig;
use crate::mqtt::transport::{Transport, TransportError};
use rumqttc::{
    AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS,
};
use statum::{machine, state};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long the pump keeps polling after close to flush the DISCONNECT packet
pub const DISCONNECT_GRACE: Duration = Duration::from_millis(500);

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

#[state]
#[derive(Debug, Clone)]
pub enum LinkState {
    Configured,
    Connected,
    Closed,
}

#[machine]
pub struct MqttLink<S: LinkState> {
    config: MqttConfig,
    client: Option<AsyncClient>,
    connection: watch::Receiver<ConnectionState>,
    connection_tx: Option<watch::Sender<ConnectionState>>,
    shutdown: CancellationToken,
}

impl<S: LinkState> MqttLink<S> {
    pub fn config(&self) -> &MqttConfig {
        &self.config
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.connection.clone()
    }
}

impl MqttLink<Configured> {
    pub fn configure(config: MqttConfig) -> Self {
        let (connection_tx, connection) = watch::channel(ConnectionState::Disconnected);
        Self::new(
            config,
            None,
            connection,
            Some(connection_tx),
            CancellationToken::new(),
        )
    }

    /// Connects and waits for the broker's ConnAck.
    ///
    /// On failure the link is consumed and the caller keeps nothing connected.
    pub async fn connect(mut self) -> Result<MqttLink<Connected>, TransportError> {
        let (host, port) = parse_server(&self.config.server.url)?;
        info!(
            "Connecting to MQTT broker {} as '{}'",
            self.config.server, self.config.client_id
        );

        let connection_tx = self
            .connection_tx
            .take()
            .ok_or(TransportError::NotConnected)?;
        connection_tx.send_replace(ConnectionState::Connecting);

        let mut options = MqttOptions::new(self.config.client_id.clone(), host, port);
        options.set_keep_alive(self.config.keep_alive());
        if !self.config.server.user.is_empty() {
            options.set_credentials(self.config.server.user.clone(), self.config.server.pw.clone());
        }

        let (client, mut eventloop) = AsyncClient::new(options, self.config.capacity.max(1));

        let timeout = self.config.connect_timeout();
        let handshake = tokio::time::timeout(timeout, await_connack(&mut eventloop)).await;
        let outcome = match handshake {
            Ok(result) => result,
            Err(_) => Err(TransportError::ConnectTimeout(timeout.as_secs())),
        };
        if let Err(e) = outcome {
            error!("MQTT connection failed: {}", e);
            connection_tx.send_replace(ConnectionState::Failed);
            return Err(e);
        }

        connection_tx.send_replace(ConnectionState::Connected);
        info!("Connected to MQTT broker {}", self.config.server);

        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            run_event_pump(eventloop, connection_tx, shutdown).await;
        });

        self.client = Some(client);
        Ok(self.transition())
    }
}

impl MqttLink<Connected> {
    pub fn disconnect(mut self) -> MqttLink<Closed> {
        info!("Closing MQTT connection to {}", self.config.server);
        if let Some(client) = self.client.take() {
            if let Err(e) = client.try_disconnect() {
                warn!("Failed to send disconnect: {}", e);
            }
        }
        self.shutdown.cancel();
        self.transition()
    }
}

impl MqttLink<Closed> {
    /// Resolves once the event pump has flushed the DISCONNECT and stopped
    pub async fn wait_closed(mut self) {
        let _ = self
            .connection
            .wait_for(|state| *state != ConnectionState::Connected)
            .await;
    }
}

impl Transport for MqttLink<Connected> {
    fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<(), TransportError> {
        let client = self.client.as_ref().ok_or(TransportError::NotConnected)?;
        client
            .try_publish(subject, QoS::AtMostOnce, false, payload)
            .map_err(|e| TransportError::PublishError(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    fn close(self) {
        let _closed = self.disconnect();
    }
}

async fn await_connack(eventloop: &mut EventLoop) -> Result<(), TransportError> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                return if ack.code == ConnectReturnCode::Success {
                    Ok(())
                } else {
                    Err(TransportError::Rejected(format!("{:?}", ack.code)))
                };
            }
            Ok(event) => debug!("Event before ConnAck: {:?}", event),
            Err(e) => return Err(TransportError::ConnectError(e.to_string())),
        }
    }
}

async fn run_event_pump(
    mut eventloop: EventLoop,
    connection_tx: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
) {
    debug!("MQTT event pump started");
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("MQTT event pump cancelled");
                flush_disconnect(&mut eventloop).await;
                connection_tx.send_replace(ConnectionState::Disconnected);
                break;
            }
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    warn!("Broker closed the connection");
                    connection_tx.send_replace(ConnectionState::Disconnected);
                    break;
                }
                Ok(event) => debug!("MQTT event: {:?}", event),
                Err(e) => {
                    error!("MQTT connection lost: {}", e);
                    connection_tx.send_replace(ConnectionState::Failed);
                    break;
                }
            }
        }
    }
}

/// Polls until the queued DISCONNECT has been written
async fn flush_disconnect(eventloop: &mut EventLoop) {
    let flush = async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    debug!("DISCONNECT sent");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Event loop ended while closing: {}", e);
                    break;
                }
            }
        }
    };
    if tokio::time::timeout(DISCONNECT_GRACE, flush).await.is_err() {
        warn!(
            "DISCONNECT not flushed within {} ms, dropping connection",
            DISCONNECT_GRACE.as_millis()
        );
    }
}

/// Splits `host[:port]`, defaulting the port to 1883
fn parse_server(url: &str) -> Result<(String, u16), TransportError> {
    let url = url.trim();
    let url = url.strip_prefix("mqtt://").unwrap_or(url);
    let (host, port) = match url.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| TransportError::InvalidServer(url.to_string()))?;
            (host, port)
        }
        None => (url, 1883),
    };
    if host.is_empty() {
        return Err(TransportError::InvalidServer(url.to_string()));
    }
    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_port() {
        assert_eq!(parse_server("broker.local:1884").unwrap(), ("broker.local".to_string(), 1884));
        assert_eq!(parse_server("mqtt://10.0.0.2:8883").unwrap(), ("10.0.0.2".to_string(), 8883));
    }

    #[test]
    fn port_defaults_to_1883() {
        assert_eq!(parse_server("localhost").unwrap(), ("localhost".to_string(), 1883));
    }

    #[test]
    fn rejects_bad_addresses() {
        assert!(matches!(parse_server(":1883"), Err(TransportError::InvalidServer(_))));
        assert!(matches!(parse_server("host:port"), Err(TransportError::InvalidServer(_))));
    }

    #[test]
    fn configured_link_starts_disconnected() {
        let link = MqttLink::configure(MqttConfig::default());
        assert_eq!(link.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn invalid_server_fails_before_connecting() {
        let config = MqttConfig {
            server: crate::mqtt::config::MqttServer {
                url: "broker:notaport".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let result = MqttLink::configure(config).connect().await;
        assert!(matches!(result, Err(TransportError::InvalidServer(_))));
    }

    #[tokio::test]
    async fn close_flushes_disconnect_to_broker() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let broker = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 256];
            let n = socket.read(&mut buf).await.unwrap();
            assert!(n > 0 && buf[0] == 0x10, "expected CONNECT");
            // CONNACK, accepted
            socket.write_all(&[0x20, 0x02, 0x00, 0x00]).await.unwrap();

            let mut received = Vec::new();
            loop {
                let n = socket.read(&mut buf).await.unwrap_or(0);
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
            }
            received
        });

        let config = MqttConfig {
            server: crate::mqtt::config::MqttServer {
                url: format!("127.0.0.1:{}", port),
                ..Default::default()
            },
            ..Default::default()
        };
        let link = MqttLink::configure(config).connect().await.unwrap();
        assert!(link.is_connected());

        let closed = link.disconnect();
        tokio::time::timeout(Duration::from_secs(5), closed.wait_closed())
            .await
            .unwrap();

        let received = tokio::time::timeout(Duration::from_secs(5), broker)
            .await
            .unwrap()
            .unwrap();
        assert!(
            received.windows(2).any(|w| w == [0xE0, 0x00]),
            "no DISCONNECT in {:?}",
            received
        );
    }
}
