// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// tillwerk-document — Receipt formatting for the Tillwerk delivery subsystem.
//
// Provides the ESC/POS command encoder for thermal printers, a fixed-width
// text/HTML rendering for print dialogs, and an 80mm PDF export. Everything
// here is pure: no sockets, no spoolers.

pub mod escpos;
pub mod pdf;
pub mod render;

// Re-export the primary entry points so callers can use `tillwerk_document::encode` etc.
pub use escpos::encode;
pub use pdf::writer::ReceiptPdfWriter;
pub use render::render;
