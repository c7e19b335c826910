// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer — builds every backend subsystem once at startup and
// exposes the operations the command line calls.
//
// The registry, durability store, delivery service and scanner are shared
// through `Arc`s; the struct is cheap to clone.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tillwerk_bridge::platform_presenter;
use tillwerk_core::AppConfig;
use tillwerk_core::error::Result;
use tillwerk_core::types::{
    DeliveryResult, DeviceId, DiscoveredEndpoint, PersistedReceipt, PrinterDevice,
    ReceiptDocument, TransportKind,
};
use tillwerk_print::{
    DeliveryService, EmailTransport, ExportTransport, FallbackChain, NetworkTransport,
    PrinterRegistry, ReceiptStore, RenderTransport, Scanner, Transport,
};
use tracing::{info, warn};

const CONFIG_FILE: &str = "config.json";
const PRINTERS_DB: &str = "printers.db";
const RECEIPTS_DB: &str = "receipts.db";

#[derive(Clone)]
pub struct AppServices {
    registry: Arc<PrinterRegistry>,
    store: Arc<ReceiptStore>,
    delivery: Arc<DeliveryService>,
    scanner: Arc<Scanner>,
    data_dir: PathBuf,
    config: Arc<Mutex<AppConfig>>,
}

impl AppServices {
    /// Open the databases under `dir`, load the config and bind transports.
    pub fn init(dir: PathBuf) -> Result<Self> {
        info!(path = %dir.display(), "initialising app services");
        let registry = PrinterRegistry::open(dir.join(PRINTERS_DB))?;
        let store = ReceiptStore::open(dir.join(RECEIPTS_DB))?;
        let config = load_config(&dir);
        Self::build(dir, registry, store, config)
    }

    /// In-memory databases, config from `dir`. Used when the database files
    /// cannot be opened.
    pub fn fallback(dir: PathBuf) -> Result<Self> {
        warn!("using in-memory printer registry and receipt store");
        let config = load_config(&dir);
        Self::build(
            dir,
            PrinterRegistry::open_in_memory()?,
            ReceiptStore::open_in_memory()?,
            config,
        )
    }

    fn build(
        dir: PathBuf,
        registry: PrinterRegistry,
        store: ReceiptStore,
        config: AppConfig,
    ) -> Result<Self> {
        let delivery_config = config.delivery.clone();
        let chain = FallbackChain::new(delivery_config.fallback_chain.clone())?;

        let export_dir = if delivery_config.export_dir.is_absolute() {
            delivery_config.export_dir.clone()
        } else {
            dir.join(&delivery_config.export_dir)
        };
        let presenter = platform_presenter(config.render_command.as_deref());
        let transports: Vec<Arc<dyn Transport>> = vec![
            Arc::new(NetworkTransport::new(
                delivery_config.timeout_for(TransportKind::Network),
            )),
            Arc::new(RenderTransport::new(
                presenter,
                delivery_config.timeout_for(TransportKind::Render),
            )),
            Arc::new(ExportTransport::new(export_dir)),
            Arc::new(EmailTransport::new(
                delivery_config.email_base_url.clone(),
                delivery_config.timeout_for(TransportKind::Email),
            )?),
        ];

        let registry = Arc::new(registry);
        let store = Arc::new(store);
        let delivery = DeliveryService::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            chain,
            transports,
            delivery_config,
        )?;
        let scanner = Scanner::new(&config.discovery);

        info!(
            chain = ?delivery.chain().kinds(),
            printers = registry.len(),
            "app services initialised"
        );
        Ok(Self {
            registry,
            store,
            delivery: Arc::new(delivery),
            scanner: Arc::new(scanner),
            data_dir: dir,
            config: Arc::new(Mutex::new(config)),
        })
    }

    // -- Registry ------------------------------------------------------------

    pub fn register_printer(&self, device: PrinterDevice) -> Result<DeviceId> {
        self.registry.register(device)
    }

    pub fn printers(&self) -> Vec<PrinterDevice> {
        self.registry.list()
    }

    pub fn remove_printer(&self, id: &str) -> Result<()> {
        self.registry.remove(id)
    }

    // -- Delivery ------------------------------------------------------------

    pub async fn print_receipt(
        &self,
        printer_id: &str,
        document: &ReceiptDocument,
    ) -> Result<DeliveryResult> {
        self.delivery.print_receipt(printer_id, document).await
    }

    pub async fn test_print(&self, printer_id: &str) -> Result<DeliveryResult> {
        self.delivery.test_print(printer_id).await
    }

    /// Saved receipts, newest first. `None` returns all of them.
    pub fn saved_receipts(&self, limit: Option<usize>) -> Result<Vec<PersistedReceipt>> {
        match limit {
            Some(n) => self.store.recent(n),
            None => {
                let mut all = self.store.all()?;
                all.reverse();
                Ok(all)
            }
        }
    }

    // -- Discovery -----------------------------------------------------------

    /// Sweep a /24. Ports and probe timeout fall back to the configured ones.
    pub async fn discover(
        &self,
        prefix: &str,
        ports: Option<Vec<u16>>,
        probe_timeout: Option<Duration>,
    ) -> Result<Vec<DiscoveredEndpoint>> {
        let discovery = self.config().discovery;
        let ports = ports.unwrap_or_else(|| discovery.ports.clone());
        let probe_timeout = probe_timeout.unwrap_or(discovery.probe_timeout());
        self.scanner.discover(prefix, &ports, probe_timeout).await
    }

    pub fn stop_discovery(&self) {
        self.scanner.stop();
    }

    // -- Config --------------------------------------------------------------

    pub fn config(&self) -> AppConfig {
        self.config.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Validate and persist a new fallback chain. Takes effect on next start.
    pub fn set_fallback_chain(&self, kinds: Vec<TransportKind>) -> Result<()> {
        let chain = FallbackChain::new(kinds)?;
        let mut config = self.config.lock().unwrap_or_else(|e| e.into_inner());
        let mut next = config.clone();
        next.delivery.fallback_chain = chain.kinds().to_vec();
        persist_config(&self.data_dir, &next)?;
        *config = next;
        info!(chain = ?chain.kinds(), "fallback chain updated");
        Ok(())
    }
}

// -- Config persistence --------------------------------------------------------

/// Read `config.json`; a missing or unreadable file yields defaults.
fn load_config(data_dir: &Path) -> AppConfig {
    let path = data_dir.join(CONFIG_FILE);
    let data = match std::fs::read_to_string(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return AppConfig::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read config; using defaults");
            return AppConfig::default();
        }
    };
    serde_json::from_str(&data).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "invalid config; using defaults");
        AppConfig::default()
    })
}

fn persist_config(data_dir: &Path, config: &AppConfig) -> Result<()> {
    let path = data_dir.join(CONFIG_FILE);
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    Ok(())
}
