// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for native print presentation.

use std::time::Duration;

use tillwerk_core::error::Result;
use tillwerk_core::types::RenderedReceipt;

/// Hand a rendered receipt to whatever the platform uses to print documents
/// (print dialog, spooler, ...).
///
/// Implementations block: they return once the presentation has finished or
/// `wait` has elapsed, whichever comes first. Callers run them on a blocking
/// thread.
pub trait PrintPresenter: Send + Sync {
    /// Human-readable platform name (e.g. "CUPS spooler (lp)").
    fn platform_name(&self) -> &str;

    /// Whether this presenter can actually print. The headless stub cannot.
    fn is_available(&self) -> bool {
        true
    }

    /// Present the receipt for physical printing.
    ///
    /// `Ok(())` means the platform accepted the document without error.
    fn present_for_print(&self, receipt: &RenderedReceipt, wait: Duration) -> Result<()>;
}
