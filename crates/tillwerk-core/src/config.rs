// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::TransportKind;

/// Persistent application settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub delivery: DeliveryConfig,
    pub discovery: DiscoveryConfig,
    /// Spooler command used by the render transport (e.g. `["lp", "-d", "front"]`).
    /// When unset, `lp` is probed for at startup.
    pub render_command: Option<Vec<String>>,
}

/// Fallback chain and per-transport limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Transports tried in order for every receipt.
    pub fallback_chain: Vec<TransportKind>,
    pub network_timeout_ms: u64,
    /// How long the render transport waits for the presenter to finish.
    pub render_timeout_ms: u64,
    pub export_timeout_ms: u64,
    pub email_timeout_ms: u64,
    /// Where exported PDFs are written. Relative paths resolve against the
    /// data directory.
    pub export_dir: PathBuf,
    /// Base URL of the backend that serves `POST /email/receipt`.
    pub email_base_url: Option<String>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            fallback_chain: vec![
                TransportKind::Network,
                TransportKind::Render,
                TransportKind::Export,
                TransportKind::Email,
            ],
            network_timeout_ms: 5_000,
            render_timeout_ms: 60_000,
            export_timeout_ms: 10_000,
            email_timeout_ms: 15_000,
            export_dir: PathBuf::from("exports"),
            email_base_url: None,
        }
    }
}

impl DeliveryConfig {
    /// The bounded wait applied to one attempt of `kind`.
    pub fn timeout_for(&self, kind: TransportKind) -> Duration {
        let ms = match kind {
            TransportKind::Network => self.network_timeout_ms,
            TransportKind::Render => self.render_timeout_ms,
            TransportKind::Export => self.export_timeout_ms,
            TransportKind::Email => self.email_timeout_ms,
        };
        Duration::from_millis(ms)
    }
}

/// Network sweep settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Raw (9100), LPD (515) and IPP (631).
    pub ports: Vec<u16>,
    pub probe_timeout_ms: u64,
    /// Maximum probes in flight.
    pub concurrency: usize,
    /// No new probes are dispatched after this.
    pub scan_timeout_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            ports: vec![9100, 515, 631],
            probe_timeout_ms: 500,
            concurrency: 64,
            scan_timeout_ms: 30_000,
        }
    }
}

impl DiscoveryConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_chain_order() {
        let config = DeliveryConfig::default();
        assert_eq!(
            config.fallback_chain,
            vec![
                TransportKind::Network,
                TransportKind::Render,
                TransportKind::Export,
                TransportKind::Email
            ]
        );
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"delivery": {"fallback_chain": ["export"]}}"#).unwrap();
        assert_eq!(config.delivery.fallback_chain, vec![TransportKind::Export]);
        assert_eq!(config.delivery.network_timeout_ms, 5_000);
        assert_eq!(config.discovery, DiscoveryConfig::default());
    }

    #[test]
    fn timeouts_per_transport() {
        let config = DeliveryConfig {
            network_timeout_ms: 250,
            ..Default::default()
        };
        assert_eq!(
            config.timeout_for(TransportKind::Network),
            Duration::from_millis(250)
        );
        assert_eq!(
            config.timeout_for(TransportKind::Email),
            Duration::from_millis(15_000)
        );
    }
}
