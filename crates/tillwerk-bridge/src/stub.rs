// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Headless presenter for hosts with no print dialog or spooler.
//
// Every call returns `PlatformUnavailable` so the fallback chain moves on.

use std::time::Duration;

use tillwerk_core::error::{Result, TillwerkError};
use tillwerk_core::types::RenderedReceipt;

use crate::traits::PrintPresenter;

/// No-op presenter bound when no print capability was found at startup.
pub struct HeadlessPresenter;

impl PrintPresenter for HeadlessPresenter {
    fn platform_name(&self) -> &str {
        "Headless (no print dialog)"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn present_for_print(&self, receipt: &RenderedReceipt, _wait: Duration) -> Result<()> {
        tracing::warn!(title = %receipt.title, "present_for_print called on headless presenter");
        Err(TillwerkError::PlatformUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_always_unavailable() {
        let receipt = RenderedReceipt {
            title: "t".into(),
            text: "x\n".into(),
            html: String::new(),
        };
        let presenter = HeadlessPresenter;
        assert!(!presenter.is_available());
        assert!(matches!(
            presenter.present_for_print(&receipt, Duration::from_secs(1)),
            Err(TillwerkError::PlatformUnavailable)
        ));
    }
}
