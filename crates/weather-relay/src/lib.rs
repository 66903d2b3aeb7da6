//! Weather Relay
//!
//! Consumes weather observations from a durable RabbitMQ queue and forwards
//! each one to the weather HTTP API, with at-least-once delivery.
//!
//! # Architecture
//!
//! ```text
//! RabbitMQ queue ──► Relay ──► decode ──► HttpForwarder ──► POST /api/weather
//!                     ▲                         │
//!                     │   ack / nack(requeue)   │
//!                     └──────── policy ◄────────┘
//! ```
//!
//! # Modules
//!
//! - [`config`] — YAML file plus environment overrides.
//! - [`connection`] — Broker dial loop, queue declaration and consumer setup.
//! - [`decoder`] — Message body to [`WeatherRecord`].
//! - [`error`] — Service-level error type.
//! - [`forwarder`] — HTTP delivery with transient/permanent classification.
//! - [`policy`] — Maps an outcome to ack, requeue or discard.
//! - [`record`] — The weather observation shape.
//! - [`relay`] — Sequential consume loop.
//! - [`runner`] — Process lifecycle used by the binary.

pub mod config;
pub mod connection;
pub mod decoder;
pub mod error;
pub mod forwarder;
pub mod policy;
pub mod record;
pub mod relay;
pub mod runner;

pub use config::RelayConfig;
pub use connection::{ConnectionManager, ConnectionState, Dialer, RetryPolicy};
pub use decoder::{decode, DecodeError};
pub use error::RelayError;
pub use forwarder::{ForwardError, Forwarder, HttpForwarder};
pub use policy::{decide, Disposition, Outcome};
pub use record::{Location, WeatherRecord};
pub use relay::{Delivered, Relay, RelayStats};
pub use runner::{run, run_with_config, setup_logging};
