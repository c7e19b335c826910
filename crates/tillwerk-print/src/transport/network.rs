// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Network socket transport: ESC/POS bytes straight to the printer's raw port.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use tillwerk_core::error::{Result, TillwerkError};
use tillwerk_core::types::{PrinterDevice, TransportKind};

use super::{Payload, Transport};
use crate::raw_client;

pub struct NetworkTransport {
    timeout: Duration,
}

impl NetworkTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Transport for NetworkTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Network
    }

    async fn attempt(&self, device: &PrinterDevice, payload: &Payload<'_>) -> Result<String> {
        let (ip, port) = device.network_address().ok_or_else(|| {
            TillwerkError::inapplicable(TransportKind::Network, "printer has no IP address")
        })?;
        let addr = SocketAddr::new(ip, port);
        debug!(printer_id = %device.id, %addr, "network attempt");

        raw_client::send_raw(addr, payload.bytes, self.timeout).await?;
        Ok(format!("sent {} bytes to {addr}", payload.bytes.len()))
    }
}
