// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw TCP print client (JetDirect, port 9100).
//
// Open a socket, write the ESC/POS stream, flush, shut down the write half.
// Thermal printers give no application-level acknowledgement, so a clean
// shutdown is the success signal.

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, info};

use tillwerk_core::error::{Result, TillwerkError};
use tillwerk_core::types::TransportKind;

/// Write size per syscall; printers with small buffers prefer short writes.
const CHUNK_SIZE: usize = 4096;

/// Send `bytes` to `addr`. The whole exchange (connect, write, flush,
/// shutdown) must finish within `limit`.
pub async fn send_raw(addr: SocketAddr, bytes: &[u8], limit: Duration) -> Result<()> {
    let deadline = Instant::now() + limit;
    info!(%addr, total = bytes.len(), "connecting via raw TCP");

    let mut stream = timeout_at(deadline, TcpStream::connect(addr))
        .await
        .map_err(|_| {
            TillwerkError::timeout(
                TransportKind::Network,
                format!("connect to {addr} timed out after {}ms", limit.as_millis()),
            )
        })?
        .map_err(|e| io_failure(addr, "connect", e))?;

    let mut sent = 0usize;
    for chunk in bytes.chunks(CHUNK_SIZE) {
        timeout_at(deadline, stream.write_all(chunk))
            .await
            .map_err(|_| write_timeout(addr, sent))?
            .map_err(|e| io_failure(addr, "send", e))?;
        sent += chunk.len();
        debug!(sent, total = bytes.len(), "raw TCP progress");
    }

    timeout_at(deadline, stream.flush())
        .await
        .map_err(|_| write_timeout(addr, sent))?
        .map_err(|e| io_failure(addr, "flush", e))?;
    timeout_at(deadline, stream.shutdown())
        .await
        .map_err(|_| write_timeout(addr, sent))?
        .map_err(|e| io_failure(addr, "shutdown", e))?;

    info!(%addr, total = bytes.len(), "raw TCP receipt sent");
    Ok(())
}

fn write_timeout(addr: SocketAddr, sent: usize) -> TillwerkError {
    TillwerkError::timeout(
        TransportKind::Network,
        format!("{addr} stopped accepting data after {sent} bytes"),
    )
}

fn io_failure(addr: SocketAddr, stage: &str, e: std::io::Error) -> TillwerkError {
    match e.kind() {
        ErrorKind::TimedOut => {
            TillwerkError::timeout(TransportKind::Network, format!("{stage} {addr}: {e}"))
        }
        _ => TillwerkError::rejected(TransportKind::Network, format!("{stage} {addr}: {e}")),
    }
}
