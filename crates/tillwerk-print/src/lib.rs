// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tillwerk Print — printer registry, transport adapters, the delivery
// fallback chain, the local durability store, and subnet discovery. This
// crate connects the domain types in `tillwerk-core` to sockets, spoolers,
// files and the email backend.

pub mod delivery;
pub mod discovery;
pub mod raw_client;
pub mod registry;
pub mod store;
pub mod transport;

pub use delivery::{DeliveryService, FallbackChain};
pub use discovery::{Probe, Scanner, TcpProbe};
pub use registry::PrinterRegistry;
pub use store::ReceiptStore;
pub use transport::{EmailTransport, ExportTransport, NetworkTransport, RenderTransport, Transport};
