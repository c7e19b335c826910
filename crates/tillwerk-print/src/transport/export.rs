// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document export transport: writes an 80mm PDF into the export directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use tillwerk_core::error::{Result, TillwerkError};
use tillwerk_core::types::{PrinterDevice, ReceiptDocument, TransportKind};
use tillwerk_document::ReceiptPdfWriter;

use super::{Payload, Transport};

pub struct ExportTransport {
    dir: PathBuf,
}

impl ExportTransport {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl Transport for ExportTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Export
    }

    async fn attempt(&self, device: &PrinterDevice, payload: &Payload<'_>) -> Result<String> {
        let path = self.dir.join(file_name(&device.id, payload.document));
        let document = payload.document.clone();
        debug!(printer_id = %device.id, path = %path.display(), "export attempt");

        let written = tokio::task::spawn_blocking(move || {
            ReceiptPdfWriter::new().write_to_file(&document, &path)
        })
        .await
        .map_err(|e| TillwerkError::PdfError(format!("export task failed: {e}")))??;

        Ok(written.display().to_string())
    }
}

/// `receipt-{printer}-{YYYYmmdd-HHMMSS}-{short uuid}.pdf`
fn file_name(printer_id: &str, doc: &ReceiptDocument) -> String {
    let printer: String = printer_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let unique = Uuid::new_v4().simple().to_string();
    format!(
        "receipt-{printer}-{}-{}.pdf",
        doc.timestamp.format("%Y%m%d-%H%M%S"),
        &unique[..8]
    )
}
