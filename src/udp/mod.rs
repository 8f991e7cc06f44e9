//! # UDP JSON Module
//!
//! One JSON document per datagram, flattened and logged as one CSV row.
//!
//! This module handles:
//! - Binding the listener socket
//! - Parsing and flattening datagrams (malformed ones are dropped)
//! - Stamping each record with its arrival time
//! - Sending sample documents for bench testing

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::error::{IngestError, Result};
use crate::record::{flatten, parse_document, FlatRecord};
use crate::telemetry::session::timestamped_record;
use crate::telemetry::DestinationTable;

/// Build the CSV row for one datagram
///
/// The arrival timestamp comes first; a document key with the same name
/// overrides its value but keeps the first position.
///
/// # Errors
///
/// Returns `MalformedDocument` if the payload is not UTF-8 JSON
pub fn datagram_record(payload: &[u8], arrival: DateTime<Utc>) -> Result<FlatRecord> {
    let document = parse_document(payload)?;
    let mut record = timestamped_record(arrival);
    record.extend(flatten(&document));
    Ok(record)
}

/// Datagram receiver
#[derive(Debug)]
pub struct UdpListener {
    socket: UdpSocket,
    buffer: Vec<u8>,
}

impl UdpListener {
    /// Bind to `address:port`
    ///
    /// # Errors
    ///
    /// Returns `Io` error if the socket cannot be bound
    pub async fn bind(address: &str, port: u16, max_datagram_size: usize) -> Result<Self> {
        let socket = UdpSocket::bind((address, port)).await?;
        info!("Listening for JSON datagrams on {}", socket.local_addr()?);

        Ok(Self {
            socket,
            buffer: vec![0u8; max_datagram_size],
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Wait for the next datagram and turn it into a record
    ///
    /// Returns `Ok(None)` for a malformed datagram, which is logged and
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns `Io` error if the socket fails
    pub async fn next_record(&mut self) -> Result<Option<FlatRecord>> {
        let (len, peer) = self.socket.recv_from(&mut self.buffer).await?;
        let arrival = Utc::now();
        debug!("Received {} bytes from {}", len, peer);

        match datagram_record(&self.buffer[..len], arrival) {
            Ok(record) => Ok(Some(record)),
            Err(IngestError::MalformedDocument(reason)) => {
                warn!("Dropping datagram from {}: {}", peer, reason);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Log every well-formed datagram to `key` until `shutdown` resolves
///
/// # Errors
///
/// Returns error if the socket fails or the destination cannot be written
pub async fn run_listener<F>(
    listener: &mut UdpListener,
    table: &DestinationTable,
    key: &str,
    status_interval: u64,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut logged = 0u64;
    let mut dropped = 0u64;
    let mut last_status = 0u64;

    loop {
        let next = tokio::select! {
            next = listener.next_record() => next?,
            _ = &mut shutdown => break,
        };

        match next {
            Some(record) => {
                table.write(key, &record)?;
                logged += 1;
                if logged - last_status >= status_interval {
                    info!("Datagrams: {} logged, {} dropped", logged, dropped);
                    last_status = logged;
                }
            }
            None => dropped += 1,
        }
    }

    info!("Total datagrams: {} logged, {} dropped", logged, dropped);
    Ok(())
}

/// Sample document sent by the talker
pub fn sample_message(timestamp: f64) -> Value {
    json!({
        "message": "Hello, world!",
        "number": 37,
        "timestamp": timestamp,
        "nested": {
            "nestedness": true,
            "data": [1, 2, 3, 4, 5]
        }
    })
}

/// Datagram sender for bench testing a listener
#[derive(Debug)]
pub struct UdpTalker {
    socket: UdpSocket,
    target: SocketAddr,
    sent: u64,
}

impl UdpTalker {
    /// Bind an ephemeral local port and aim at `target`
    pub async fn connect(target: SocketAddr) -> Result<Self> {
        let local: SocketAddr = if target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        info!("Sending JSON datagrams to {}", target);

        Ok(Self { socket, target, sent: 0 })
    }

    /// Send one document
    pub async fn send(&mut self, document: &Value) -> Result<usize> {
        let payload = document.to_string();
        let sent = self.socket.send_to(payload.as_bytes(), self.target).await?;
        self.sent += 1;
        debug!("Sent {} bytes", sent);
        Ok(sent)
    }

    /// Send the sample document stamped with the current time
    pub async fn send_sample(&mut self) -> Result<usize> {
        let now = Utc::now();
        let timestamp = now.timestamp_micros() as f64 / 1_000_000.0;
        self.send(&sample_message(timestamp)).await
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }
}
