//! Process entry: logging, CLI, config, shutdown, and the relay lifecycle.

use argh::FromArgs;
use std::path::PathBuf;
use tokio::sync::watch;

use crate::config::RelayConfig;
use crate::connection::{self, QueueSettings, RetryPolicy};
use crate::error::{RelayError, Result};
use crate::forwarder::HttpForwarder;
use crate::relay::Relay;

/// Relay weather observations from RabbitMQ to the weather API.
#[derive(FromArgs, Debug)]
pub struct RelayArgs {
    /// path to YAML configuration file (optional, environment and defaults otherwise)
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,
}

/// Initialize logging with env_logger.
///
/// Respects RUST_LOG environment variable. Defaults to "info" level.
pub fn setup_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Set up a shutdown channel triggered by SIGINT, SIGTERM or SIGHUP.
///
/// Installs a process-wide handler, so it can only be called once.
pub fn setup_shutdown() -> Result<watch::Sender<()>> {
    let (tx, _rx) = watch::channel(());
    let shutdown_tx = tx.clone();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        let _ = shutdown_tx.send(());
    })?;
    Ok(tx)
}

/// Run the relay with standard CLI handling and lifecycle management.
///
/// Returns once a shutdown signal has been handled. Any error is fatal and
/// should terminate the process with a non-zero status.
pub async fn run() -> Result<()> {
    setup_logging();

    let args: RelayArgs = argh::from_env();
    log::info!(
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let config = RelayConfig::load(args.config.as_deref())?;
    let shutdown_tx = setup_shutdown()?;

    run_with_config(config, shutdown_tx.subscribe()).await
}

/// Run the relay with an already loaded configuration until `shutdown` fires.
pub async fn run_with_config(config: RelayConfig, mut shutdown: watch::Receiver<()>) -> Result<()> {
    let forwarder = HttpForwarder::new(&config.api_url, config.request_timeout())?
        .with_retry_client_errors(config.retry_client_errors);
    log::info!("Forwarding to {}", forwarder.endpoint());

    let queue = QueueSettings {
        name: config.queue_name.clone(),
        prefetch_count: config.prefetch_count,
        consumer_tag: config.consumer_tag.clone(),
    };
    let policy = RetryPolicy::fixed(config.reconnect_interval());

    let (session, consumer) =
        match connection::connect(&config.rabbitmq_url, &queue, policy, &mut shutdown).await {
            Ok(opened) => opened,
            Err(RelayError::Shutdown) => {
                log::info!("Shutdown requested before broker was reachable");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

    log::info!("Relay listening on queue: {}", queue.name);

    let relay = Relay::new(forwarder, config.requeue_delay());
    let result = relay.run(consumer, shutdown).await;

    session.close().await;

    let stats = result?;
    log::info!(
        "Relay stopped: {} acked, {} requeued, {} discarded",
        stats.acked,
        stats.requeued,
        stats.discarded
    );
    Ok(())
}
