// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Delivery orchestrator.
//
// Resolve the printer, encode once, then walk the fallback chain: one bounded
// attempt per transport, first success wins. Transport failures are recorded
// and swallowed. When every transport has failed the receipt goes to the
// durability store so that nothing is lost.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::time::timeout;
use tracing::{info, instrument, warn};

use tillwerk_core::config::DeliveryConfig;
use tillwerk_core::error::{Result, TillwerkError};
use tillwerk_core::types::{
    AttemptOutcome, DeliveryAttempt, DeliveryResult, PrinterDevice, ReceiptDocument,
    TransportKind,
};

use crate::registry::PrinterRegistry;
use crate::store::ReceiptStore;
use crate::transport::{Payload, Transport};

// -- Fallback chain -----------------------------------------------------------

/// Ordered, duplicate-free list of transports to try.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackChain(Vec<TransportKind>);

impl FallbackChain {
    pub fn new(kinds: Vec<TransportKind>) -> Result<Self> {
        if kinds.is_empty() {
            return Err(TillwerkError::Config("fallback chain is empty".into()));
        }
        let mut seen = HashSet::new();
        for kind in &kinds {
            if !seen.insert(*kind) {
                return Err(TillwerkError::Config(format!(
                    "transport '{kind}' appears twice in the fallback chain"
                )));
            }
        }
        Ok(Self(kinds))
    }

    pub fn kinds(&self) -> &[TransportKind] {
        &self.0
    }
}

impl Default for FallbackChain {
    fn default() -> Self {
        Self(DeliveryConfig::default().fallback_chain)
    }
}

// -- Service ------------------------------------------------------------------

pub struct DeliveryService {
    registry: Arc<PrinterRegistry>,
    store: Arc<ReceiptStore>,
    chain: FallbackChain,
    transports: HashMap<TransportKind, Arc<dyn Transport>>,
    config: DeliveryConfig,
}

impl DeliveryService {
    /// Bind a chain to its adapters. Every kind in the chain must have one.
    pub fn new(
        registry: Arc<PrinterRegistry>,
        store: Arc<ReceiptStore>,
        chain: FallbackChain,
        transports: Vec<Arc<dyn Transport>>,
        config: DeliveryConfig,
    ) -> Result<Self> {
        let transports: HashMap<_, _> = transports.into_iter().map(|t| (t.kind(), t)).collect();
        if let Some(missing) = chain.kinds().iter().find(|k| !transports.contains_key(*k)) {
            return Err(TillwerkError::Config(format!(
                "no adapter bound for transport '{missing}'"
            )));
        }
        Ok(Self {
            registry,
            store,
            chain,
            transports,
            config,
        })
    }

    pub fn chain(&self) -> &FallbackChain {
        &self.chain
    }

    /// Deliver a receipt to a registered printer.
    ///
    /// Errors only when nothing was attempted (unknown printer, invalid
    /// receipt) or when the receipt could not even be saved locally. Every
    /// other outcome is a `DeliveryResult`.
    #[instrument(skip(self, document), fields(items = document.items.len()))]
    pub async fn print_receipt(
        &self,
        printer_id: &str,
        document: &ReceiptDocument,
    ) -> Result<DeliveryResult> {
        let device = self.registry.get(printer_id)?;
        let bytes = tillwerk_document::encode(document)?;
        let payload = Payload {
            document,
            bytes: &bytes,
        };

        let mut attempts = Vec::with_capacity(self.chain.kinds().len());
        for kind in self.chain.kinds() {
            let (outcome, detail) = match self.attempt(*kind, &device, &payload).await {
                Ok(detail) => (AttemptOutcome::Success, detail),
                Err(e) => {
                    warn!(
                        transport = %kind,
                        error = %e,
                        class = ?e.class(),
                        "delivery attempt failed"
                    );
                    (AttemptOutcome::Failure, e.to_string())
                }
            };
            attempts.push(DeliveryAttempt {
                transport: *kind,
                printer_id: device.id.clone(),
                outcome,
                detail,
            });
            if outcome == AttemptOutcome::Success {
                info!(transport = %kind, attempts = attempts.len(), "receipt delivered");
                return Ok(DeliveryResult::delivered(&device.id, *kind, attempts));
            }
        }

        let summary = TillwerkError::AllTransportsExhausted {
            attempts: attempts.len(),
        }
        .to_string();
        let store = Arc::clone(&self.store);
        let saved_doc = document.clone();
        let saved_for = device.id.clone();
        let saved = tokio::task::spawn_blocking(move || store.append(&saved_for, &saved_doc))
            .await
            .map_err(|e| TillwerkError::Database(format!("save task failed: {e}")))??;

        warn!(saved_id = saved.id, "all transports failed; receipt saved locally");
        Ok(DeliveryResult::saved(&device.id, summary, attempts))
    }

    /// Print the canned test page on a registered printer.
    pub async fn test_print(&self, printer_id: &str) -> Result<DeliveryResult> {
        let device = self.registry.get(printer_id)?;
        let document = ReceiptDocument::test_page(&device.name);
        self.print_receipt(printer_id, &document).await
    }

    async fn attempt(
        &self,
        kind: TransportKind,
        device: &PrinterDevice,
        payload: &Payload<'_>,
    ) -> Result<String> {
        let transport = self
            .transports
            .get(&kind)
            .ok_or_else(|| TillwerkError::Config(format!("no adapter bound for '{kind}'")))?;
        let limit = self.config.timeout_for(kind);
        timeout(limit, transport.attempt(device, payload))
            .await
            .map_err(|_| {
                TillwerkError::timeout(kind, format!("no answer within {}ms", limit.as_millis()))
            })?
    }
}
