//! The relay loop: decode, forward, settle, one message at a time.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicNackOptions};
use std::fmt::Display;
use std::time::Duration;
use tokio::sync::watch;

use crate::decoder;
use crate::error::{RelayError, Result};
use crate::forwarder::Forwarder;
use crate::policy::{decide, Disposition, Outcome};

/// Default local pause before a transiently failed message is requeued.
pub const DEFAULT_REQUEUE_DELAY: Duration = Duration::from_secs(2);

/// A message received from the broker, settled exactly once.
#[async_trait]
pub trait Delivered: Send + Sync {
    fn body(&self) -> &[u8];

    /// Whether the broker has delivered this message before.
    fn redelivered(&self) -> bool;

    /// Apply `disposition` on the broker.
    async fn settle(&self, disposition: Disposition) -> Result<()>;
}

/// Broker call that applies a disposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleAction {
    Ack,
    Nack { requeue: bool },
}

impl From<Disposition> for SettleAction {
    fn from(disposition: Disposition) -> Self {
        match disposition {
            Disposition::Ack => SettleAction::Ack,
            Disposition::RequeueWithDelay => SettleAction::Nack { requeue: true },
            Disposition::DiscardNoRequeue => SettleAction::Nack { requeue: false },
        }
    }
}

/// `basic.nack` options for `disposition`, `None` when it is an ack.
pub fn nack_options(disposition: Disposition) -> Option<BasicNackOptions> {
    match SettleAction::from(disposition) {
        SettleAction::Ack => None,
        SettleAction::Nack { requeue } => Some(BasicNackOptions {
            multiple: false,
            requeue,
        }),
    }
}

#[async_trait]
impl Delivered for Delivery {
    fn body(&self) -> &[u8] {
        &self.data
    }

    fn redelivered(&self) -> bool {
        self.redelivered
    }

    async fn settle(&self, disposition: Disposition) -> Result<()> {
        let result = match nack_options(disposition) {
            None => self.acker.ack(BasicAckOptions::default()).await,
            Some(options) => self.acker.nack(options).await,
        };
        result.map_err(|e| RelayError::Broker(format!("Failed to settle delivery: {e}")))
    }
}

/// Per-run counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub acked: u64,
    pub requeued: u64,
    pub discarded: u64,
}

impl RelayStats {
    fn record(&mut self, disposition: Disposition) {
        match disposition {
            Disposition::Ack => self.acked += 1,
            Disposition::RequeueWithDelay => self.requeued += 1,
            Disposition::DiscardNoRequeue => self.discarded += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.acked + self.requeued + self.discarded
    }
}

/// Sequential consumer relaying weather records to a [`Forwarder`].
pub struct Relay<F> {
    forwarder: F,
    requeue_delay: Duration,
}

impl<F: Forwarder> Relay<F> {
    pub fn new(forwarder: F, requeue_delay: Duration) -> Self {
        Self {
            forwarder,
            requeue_delay,
        }
    }

    pub fn forwarder(&self) -> &F {
        &self.forwarder
    }

    /// Decode and forward one body, returning how it should be settled.
    pub async fn process(&self, body: &[u8]) -> Disposition {
        let outcome = match decoder::decode(body) {
            Ok(record) => {
                let result = self.forwarder.forward(&record).await;
                match &result {
                    Ok(()) => {}
                    Err(e) if e.is_transient() => {
                        log::warn!("Failed to forward {} (will requeue): {}", record.city, e)
                    }
                    Err(e) => log::warn!("Failed to forward {} (discarding): {}", record.city, e),
                }
                Outcome::from(&result)
            }
            Err(e) => {
                log::warn!("Discarding undecodable message: {}", e);
                Outcome::DecodeFailed
            }
        };
        decide(outcome)
    }

    /// Drain `deliveries` until shutdown.
    ///
    /// Each message is settled before the next one is pulled. A stream error
    /// or end of stream means the broker side is gone, which is fatal.
    pub async fn run<S, D, E>(
        &self,
        mut deliveries: S,
        mut shutdown: watch::Receiver<()>,
    ) -> Result<RelayStats>
    where
        S: Stream<Item = std::result::Result<D, E>> + Unpin,
        D: Delivered,
        E: Display,
    {
        let mut stats = RelayStats::default();

        loop {
            let next = tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    log::info!("Relay shutting down");
                    break;
                }
                next = deliveries.next() => next,
            };

            let delivery = match next {
                Some(Ok(delivery)) => delivery,
                Some(Err(e)) => return Err(RelayError::Broker(e.to_string())),
                None => return Err(RelayError::StreamClosed),
            };

            if delivery.redelivered() {
                log::debug!("Processing redelivered message");
            }

            let disposition = self.process(delivery.body()).await;

            let mut stopping = false;
            if disposition == Disposition::RequeueWithDelay {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => stopping = true,
                    _ = tokio::time::sleep(self.requeue_delay) => {}
                }
            }

            delivery.settle(disposition).await?;
            stats.record(disposition);

            if stopping {
                log::info!("Relay shutting down");
                break;
            }
        }

        Ok(stats)
    }
}
