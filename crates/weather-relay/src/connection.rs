//! Broker connection lifecycle.
//!
//! Dialing retries forever at a fixed interval: until the broker is reachable
//! the relay has nothing else to do. Everything after a successful dial
//! (channel, qos, queue declare, consume) is fatal on error, since it points at
//! misconfiguration rather than an unavailable broker.

use async_trait::async_trait;
use lapin::options::{BasicConsumeOptions, BasicQosOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, Consumer};
use std::time::Duration;
use tokio::sync::watch;

use crate::error::{RelayError, Result};

/// Fixed delay between dial attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Where the connection manager is in its dial loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting { attempt: u32 },
    Connected,
}

/// Backoff between dial attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    interval: Duration,
}

impl RetryPolicy {
    pub fn fixed(interval: Duration) -> Self {
        Self { interval }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn next_delay(&self, _attempt: u32) -> Duration {
        self.interval
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_INTERVAL)
    }
}

/// Opens a raw broker connection.
#[async_trait]
pub trait Dialer: Send + Sync {
    type Connection: Send;

    async fn dial(&self, url: &str) -> Result<Self::Connection>;
}

/// Dials RabbitMQ over AMQP 0-9-1.
#[derive(Debug, Default, Clone, Copy)]
pub struct LapinDialer;

#[async_trait]
impl Dialer for LapinDialer {
    type Connection = Connection;

    async fn dial(&self, url: &str) -> Result<Connection> {
        Connection::connect(url, ConnectionProperties::default())
            .await
            .map_err(|e| RelayError::Connect(e.to_string()))
    }
}

/// Drives the dial loop and tracks its state.
pub struct ConnectionManager<D> {
    dialer: D,
    url: String,
    policy: RetryPolicy,
    state: ConnectionState,
    attempts: u32,
}

impl<D: Dialer> ConnectionManager<D> {
    pub fn new(dialer: D, url: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            dialer,
            url: url.into(),
            policy,
            state: ConnectionState::Disconnected,
            attempts: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Dial attempts made so far, successful one included.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Dial until the broker answers.
    ///
    /// Only returns an error when `shutdown` fires first.
    pub async fn dial(&mut self, shutdown: &mut watch::Receiver<()>) -> Result<D::Connection> {
        loop {
            self.attempts += 1;
            let attempt = self.attempts;
            self.state = ConnectionState::Connecting { attempt };

            let result = tokio::select! {
                biased;
                _ = shutdown.changed() => None,
                result = self.dialer.dial(&self.url) => Some(result),
            };

            let Some(result) = result else {
                self.state = ConnectionState::Disconnected;
                return Err(RelayError::Shutdown);
            };

            match result {
                Ok(connection) => {
                    self.state = ConnectionState::Connected;
                    log::info!("Connected to RabbitMQ after {} attempt(s)", attempt);
                    return Ok(connection);
                }
                Err(e) => {
                    self.state = ConnectionState::Disconnected;
                    let delay = self.policy.next_delay(attempt);
                    log::warn!(
                        "Waiting for RabbitMQ (attempt {}): {}; retrying in {:?}",
                        attempt,
                        e,
                        delay
                    );
                    tokio::select! {
                        biased;
                        _ = shutdown.changed() => return Err(RelayError::Shutdown),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

/// Consumer settings for the relay queue.
#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub name: String,
    pub prefetch_count: u16,
    pub consumer_tag: String,
}

/// Open broker connection and channel, held for the relay's lifetime.
pub struct BrokerSession {
    connection: Connection,
    channel: Channel,
}

impl BrokerSession {
    /// Open a channel, declare the durable queue and start a manual-ack consumer.
    pub async fn open(connection: Connection, queue: &QueueSettings) -> Result<(Self, Consumer)> {
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| RelayError::Channel(format!("Failed to open channel: {e}")))?;

        channel
            .basic_qos(queue.prefetch_count, BasicQosOptions::default())
            .await
            .map_err(|e| RelayError::Channel(format!("Failed to set prefetch: {e}")))?;

        let declared = channel
            .queue_declare(
                &queue.name,
                QueueDeclareOptions {
                    durable: true,
                    exclusive: false,
                    auto_delete: false,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                RelayError::Channel(format!("Failed to declare queue '{}': {}", queue.name, e))
            })?;

        log::info!(
            "Declared queue '{}' ({} message(s) ready)",
            declared.name().as_str(),
            declared.message_count()
        );

        let consumer = channel
            .basic_consume(
                &queue.name,
                &queue.consumer_tag,
                BasicConsumeOptions {
                    no_ack: false,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| {
                RelayError::Channel(format!("Failed to consume from '{}': {}", queue.name, e))
            })?;

        Ok((
            Self {
                connection,
                channel,
            },
            consumer,
        ))
    }

    /// Close the channel and connection.
    pub async fn close(self) {
        if let Err(e) = self.channel.close(200, "relay shutting down").await {
            log::warn!("Failed to close channel: {}", e);
        }
        if let Err(e) = self.connection.close(200, "relay shutting down").await {
            log::warn!("Failed to close connection: {}", e);
        }
    }
}

/// Dial the broker until reachable, then open the consumption stream on `queue`.
pub async fn connect(
    url: &str,
    queue: &QueueSettings,
    policy: RetryPolicy,
    shutdown: &mut watch::Receiver<()>,
) -> Result<(BrokerSession, Consumer)> {
    let mut manager = ConnectionManager::new(LapinDialer, url, policy);
    let connection = manager.dial(shutdown).await?;
    BrokerSession::open(connection, queue).await
}
