//! # Telemetry Ingest
//!
//! Streams telemetry from a serial link or UDP socket into CSV files.
//!
//! # Usage
//!
//! ```bash
//! telemetry-ingest [config.toml]
//! ```
//!
//! The `[ingest] mode` setting picks the driver:
//!
//! - `serial-listener`: decode frames from `[serial] port`, one row per sample
//! - `serial-talker`: write synthetic frames to `[serial] port`
//! - `udp-listener`: log each JSON datagram received on `[udp]` as one row
//! - `udp-talker`: send a sample JSON document to `[udp]`
//!
//! Listener sessions are written to `<log_dir>/<YYYY-MM-DD>/<HH-MM-SS>.csv`.
//! Ctrl+C stops the driver; rows already being written are completed before
//! the files are closed.

use anyhow::{Context, Result};
use chrono::Local;
use std::future::Future;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;

use telemetry_ingest::config::{Config, IngestMode, LoggingConfig};
use telemetry_ingest::error::IngestError;
use telemetry_ingest::serial::reader::{self, FrameReader};
use telemetry_ingest::serial::talker::SampleTalker;
use telemetry_ingest::serial::SerialLink;
use telemetry_ingest::telemetry::session::session_key;
use telemetry_ingest::telemetry::DestinationTable;
use telemetry_ingest::udp::{self, UdpListener, UdpTalker};

/// Configuration file used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// File name prefix for rolling diagnostic logs
const DIAGNOSTICS_FILE_PREFIX: &str = "telemetry-ingest.log";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path))?;

    // Flushes the diagnostics file on drop
    let _guard = init_logging(&config.logging);

    info!("Telemetry Ingest v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Mode: {:?}, log directory: {}", config.ingest.mode, config.ingest.log_dir);

    let table = Arc::new(DestinationTable::new(&config.ingest.log_dir));
    let session = session_key(&Local::now());

    let result = run(&config, &table, &session, shutdown_signal()).await;

    table.close()?;
    for key in table.destination_keys() {
        info!("Wrote {}", table.path_for(&key).display());
    }

    match result {
        Err(IngestError::TransportClosed) => {
            warn!("Transport closed, exiting");
            Ok(())
        }
        other => Ok(other?),
    }
}

/// Install the stdout subscriber, plus a daily rolling file when configured
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());
    let stdout = tracing_subscriber::fmt::layer();

    match &config.diagnostics_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, DIAGNOSTICS_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);

            tracing_subscriber::registry()
                .with(filter)
                .with(stdout)
                .with(file)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(filter).with(stdout).init();
            None
        }
    }
}

/// Resolves on Ctrl+C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down...");
}

/// Run the configured driver until shutdown, failure or transport close
async fn run<F>(
    config: &Config,
    table: &DestinationTable,
    session: &str,
    shutdown: F,
) -> telemetry_ingest::error::Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let status_interval = config.logging.status_interval_records;

    match config.ingest.mode {
        IngestMode::SerialListener => {
            let link = SerialLink::open(&config.serial.port, config.serial.baud_rate)?;
            info!(
                "Listening on {} at {} baud, checksum {:?}",
                link.device_path(),
                config.serial.baud_rate,
                config.serial.checksum
            );
            info!("CSV file: {}", table.path_for(session).display());

            let mut frames = FrameReader::new(link.into_stream(), config.serial.checksum);
            let result =
                reader::run_listener(&mut frames, table, session, status_interval, shutdown).await;

            let stats = frames.stats();
            info!(
                "Total frames: {} ok, {} checksum errors",
                stats.frames, stats.checksum_errors
            );
            result
        }

        IngestMode::SerialTalker => {
            let link = SerialLink::open(&config.serial.port, config.serial.baud_rate)?;
            let mut talker = SampleTalker::new(link.into_stream(), config.serial.checksum);
            let mut tick = interval(Duration::from_millis(config.serial.talker_interval_ms));
            let mut last_status = 0u64;

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        talker.send_next().await?;
                        if talker.sent() - last_status >= status_interval {
                            info!("Sent {} frames", talker.sent());
                            last_status = talker.sent();
                        }
                    }
                    _ = &mut shutdown => break,
                }
            }

            info!("Total frames sent: {}", talker.sent());
            Ok(())
        }

        IngestMode::UdpListener => {
            let mut listener = UdpListener::bind(
                &config.udp.bind_address,
                config.udp.port,
                config.udp.max_datagram_size,
            )
            .await?;
            info!("CSV file: {}", table.path_for(session).display());

            udp::run_listener(&mut listener, table, session, status_interval, shutdown).await
        }

        IngestMode::UdpTalker => {
            let target = tokio::net::lookup_host((config.udp.bind_address.as_str(), config.udp.port))
                .await?
                .next()
                .ok_or_else(|| {
                    std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("cannot resolve {}", config.udp.bind_address),
                    )
                })?;
            let mut talker = UdpTalker::connect(target).await?;
            let mut tick = interval(Duration::from_millis(config.udp.talker_interval_ms));
            let mut last_status = 0u64;

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        talker.send_sample().await?;
                        if talker.sent() - last_status >= status_interval {
                            info!("Sent {} datagrams", talker.sent());
                            last_status = talker.sent();
                        }
                    }
                    _ = &mut shutdown => break,
                }
            }

            info!("Total datagrams sent: {}", talker.sent());
            Ok(())
        }
    }
}
