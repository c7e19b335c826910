// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for receipt delivery.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TillwerkError;

/// Caller-assigned printer identifier (e.g. `"kitchen-1"`).
pub type DeviceId = String;

/// Default raw TCP port for thermal printers (JetDirect).
pub const DEFAULT_PRINTER_PORT: u16 = 9100;

/// What a printer is used for in the restaurant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterRole {
    Kitchen,
    Bar,
    Receipt,
}

impl FromStr for PrinterRole {
    type Err = TillwerkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kitchen" => Ok(Self::Kitchen),
            "bar" => Ok(Self::Bar),
            "receipt" => Ok(Self::Receipt),
            other => Err(TillwerkError::Config(format!("unknown printer role '{other}'"))),
        }
    }
}

/// Last known reachability of a printer.
///
/// Deliveries never change this; it is set by registration (`Configured`) and
/// by whoever does status probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterStatus {
    Configured,
    Online,
    Offline,
}

/// Network address of a printer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportBinding {
    pub ip: Option<IpAddr>,
    pub port: Option<u16>,
    pub model: Option<String>,
}

/// A known output device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrinterDevice {
    pub id: DeviceId,
    pub name: String,
    pub role: PrinterRole,
    /// Absent for devices that are not reachable over the network.
    pub binding: Option<TransportBinding>,
    pub status: PrinterStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PrinterDevice {
    /// A device with no network binding.
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: PrinterRole) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            role,
            binding: None,
            status: PrinterStatus::Configured,
            created_at: now,
            updated_at: now,
        }
    }

    /// A device reachable at `ip:port`.
    pub fn networked(
        id: impl Into<String>,
        name: impl Into<String>,
        role: PrinterRole,
        ip: IpAddr,
        port: u16,
    ) -> Self {
        let mut device = Self::new(id, name, role);
        device.binding = Some(TransportBinding {
            ip: Some(ip),
            port: Some(port),
            model: None,
        });
        device
    }

    /// The socket address to use for raw printing, if the device has an IP.
    pub fn network_address(&self) -> Option<(IpAddr, u16)> {
        let binding = self.binding.as_ref()?;
        let ip = binding.ip?;
        Some((ip, binding.port.unwrap_or(DEFAULT_PRINTER_PORT)))
    }
}

/// One ordered line on a receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
}

impl LineItem {
    pub fn new(name: impl Into<String>, quantity: u32, unit_price: f64) -> Self {
        Self {
            name: name.into(),
            quantity,
            unit_price,
            special_instructions: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.special_instructions = Some(note.into());
        self
    }
}

/// A receipt as produced by order entry.
///
/// `total` is computed by the caller and trusted; nothing in this workspace
/// recomputes it. It is optional only so that a document without one can be
/// represented and rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptDocument {
    pub header: String,
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub subtotal: Option<f64>,
    #[serde(default)]
    pub tax: Option<f64>,
    #[serde(default)]
    pub discount: Option<f64>,
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub footer: String,
    pub timestamp: DateTime<FixedOffset>,
    /// Customer email address for the email transport.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

impl ReceiptDocument {
    /// An empty receipt stamped with the current local time.
    pub fn new(header: impl Into<String>, total: f64) -> Self {
        Self {
            header: header.into(),
            items: Vec::new(),
            subtotal: None,
            tax: None,
            discount: None,
            total: Some(total),
            footer: String::new(),
            timestamp: Local::now().fixed_offset(),
            destination: None,
        }
    }

    pub fn with_item(mut self, item: LineItem) -> Self {
        self.items.push(item);
        self
    }

    /// The short canned receipt used to check a printer end to end.
    pub fn test_page(printer_name: &str) -> Self {
        let mut doc = Self::new("TEST PRINT", 0.0)
            .with_item(LineItem::new(format!("Printer: {printer_name}"), 1, 0.0))
            .with_item(LineItem::new("Connection check", 1, 0.0));
        doc.footer = "Printer is working".into();
        doc
    }
}

/// The delivery mechanisms a fallback chain can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Network,
    Render,
    Export,
    Email,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Render => "render",
            Self::Export => "export",
            Self::Email => "email",
        }
    }

    /// Label for operator-facing messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Network => "network printer",
            Self::Render => "print dialog",
            Self::Export => "PDF export",
            Self::Email => "email",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = TillwerkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "network" => Ok(Self::Network),
            "render" => Ok(Self::Render),
            "export" => Ok(Self::Export),
            "email" => Ok(Self::Email),
            other => Err(TillwerkError::Config(format!("unknown transport '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    Success,
    Failure,
}

/// Trace entry for one transport attempt. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub transport: TransportKind,
    pub printer_id: DeviceId,
    pub outcome: AttemptOutcome,
    pub detail: String,
}

/// Outcome of a delivery that got past device lookup and encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub success: bool,
    /// The transport that delivered the receipt.
    pub method: Option<TransportKind>,
    pub printer_id: DeviceId,
    /// True when every transport failed and the receipt went to the local store.
    pub saved_locally: bool,
    pub error: Option<String>,
    pub attempts: Vec<DeliveryAttempt>,
}

impl DeliveryResult {
    pub fn delivered(
        printer_id: impl Into<String>,
        method: TransportKind,
        attempts: Vec<DeliveryAttempt>,
    ) -> Self {
        Self {
            success: true,
            method: Some(method),
            printer_id: printer_id.into(),
            saved_locally: false,
            error: None,
            attempts,
        }
    }

    pub fn saved(
        printer_id: impl Into<String>,
        error: impl Into<String>,
        attempts: Vec<DeliveryAttempt>,
    ) -> Self {
        Self {
            success: false,
            method: None,
            printer_id: printer_id.into(),
            saved_locally: true,
            error: Some(error.into()),
            attempts,
        }
    }
}

/// A receipt that could not be delivered by any transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedReceipt {
    pub id: i64,
    pub printer_id: DeviceId,
    pub document: ReceiptDocument,
    pub saved_at: DateTime<Utc>,
    /// SHA-256 hex digest of the document's JSON form.
    pub fingerprint: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointStatus {
    Found,
}

/// A host that accepted a connection during a discovery scan.
///
/// Reachability is all this proves; the operator decides whether it is a
/// printer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredEndpoint {
    pub ip: IpAddr,
    pub port: u16,
    pub status: EndpointStatus,
}

impl DiscoveredEndpoint {
    pub fn found(ip: IpAddr, port: u16) -> Self {
        Self {
            ip,
            port,
            status: EndpointStatus::Found,
        }
    }

    /// Build the device an operator confirmed this endpoint as.
    pub fn into_device(
        self,
        id: impl Into<String>,
        name: impl Into<String>,
        role: PrinterRole,
    ) -> PrinterDevice {
        PrinterDevice::networked(id, name, role, self.ip, self.port)
    }
}

/// Fixed-width rendering of a receipt, handed to a print presenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReceipt {
    pub title: String,
    pub text: String,
    pub html: String,
}
