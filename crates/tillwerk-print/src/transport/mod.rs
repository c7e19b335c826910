// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transport adapters: the interchangeable ways a receipt can leave the till.
//
// Each adapter makes one attempt and reports success with a short detail
// string, or a transport error. Adapters never retry and never fall back;
// ordering and timeouts belong to the delivery service.

use async_trait::async_trait;

use tillwerk_core::error::Result;
use tillwerk_core::types::{PrinterDevice, ReceiptDocument, TransportKind};

pub mod email;
pub mod export;
pub mod network;
pub mod render;

pub use email::EmailTransport;
pub use export::ExportTransport;
pub use network::NetworkTransport;
pub use render::RenderTransport;

/// What a transport is given: the source document and its ESC/POS encoding.
#[derive(Debug, Clone, Copy)]
pub struct Payload<'a> {
    pub document: &'a ReceiptDocument,
    /// Encoded once per delivery, shared by every attempt.
    pub bytes: &'a [u8],
}

#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Make one delivery attempt. `Ok` carries a detail for the attempt trace
    /// (address, file path, ...).
    async fn attempt(&self, device: &PrinterDevice, payload: &Payload<'_>) -> Result<String>;
}
