// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Render transport: fixed-width rendering handed to the platform presenter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use tillwerk_bridge::PrintPresenter;
use tillwerk_core::error::{Result, TillwerkError};
use tillwerk_core::types::{PrinterDevice, TransportKind};

use super::{Payload, Transport};

pub struct RenderTransport {
    presenter: Arc<dyn PrintPresenter>,
    wait: Duration,
}

impl RenderTransport {
    /// `wait` bounds how long the presenter may take.
    pub fn new(presenter: Arc<dyn PrintPresenter>, wait: Duration) -> Self {
        Self { presenter, wait }
    }
}

#[async_trait]
impl Transport for RenderTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Render
    }

    async fn attempt(&self, device: &PrinterDevice, payload: &Payload<'_>) -> Result<String> {
        let rendered = tillwerk_document::render(payload.document)?;
        let presenter = Arc::clone(&self.presenter);
        let wait = self.wait;
        debug!(printer_id = %device.id, platform = presenter.platform_name(), "render attempt");

        tokio::task::spawn_blocking(move || {
            presenter.present_for_print(&rendered, wait)?;
            Ok::<_, TillwerkError>(format!("presented via {}", presenter.platform_name()))
        })
        .await
        .map_err(|e| TillwerkError::Bridge(format!("presenter task failed: {e}")))?
    }
}
