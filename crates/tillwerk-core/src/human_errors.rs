// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain-language messages for staff at the till.
//
// Every error and every delivery outcome maps to a short message plus what
// to do next. Severity drives how loudly the front end shows it.

use crate::error::TillwerkError;
use crate::types::DeliveryResult;

/// How the front end should present a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Receipt went out.
    Info,
    /// Direct delivery failed but nothing was lost.
    Warning,
    /// Nothing was attempted; staff must fix something first.
    Error,
}

/// A message a server or cashier can act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HumanError {
    /// Short summary (toast heading).
    pub message: String,
    /// What to do about it.
    pub suggestion: String,
    /// Whether trying again unchanged could help.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `TillwerkError` into a message for the operator.
pub fn humanize_error(err: &TillwerkError) -> HumanError {
    match err {
        TillwerkError::DeviceNotFound(id) => HumanError {
            message: format!("Printer '{id}' is not set up."),
            suggestion: "Pick another printer or add this one under printer settings.".into(),
            retriable: false,
            severity: Severity::Error,
        },

        TillwerkError::DuplicateId(id) => HumanError {
            message: format!("A printer called '{id}' already exists."),
            suggestion: "Choose a different printer id.".into(),
            retriable: false,
            severity: Severity::Error,
        },

        TillwerkError::Encoding(detail) => HumanError {
            message: "This receipt is incomplete and was not printed.".into(),
            suggestion: format!("Reopen the order and check its totals. ({detail})"),
            retriable: false,
            severity: Severity::Error,
        },

        TillwerkError::TransportTimeout { transport, .. } => HumanError {
            message: format!("The {} did not answer in time.", transport.display_name()),
            suggestion: "Check that the printer is switched on and connected.".into(),
            retriable: true,
            severity: Severity::Warning,
        },

        TillwerkError::TransportRejected { transport, detail } => HumanError {
            message: format!("The {} refused the receipt.", transport.display_name()),
            suggestion: format!("Check paper and cables, then try again. ({detail})"),
            retriable: true,
            severity: Severity::Warning,
        },

        TillwerkError::TransportInapplicable { transport, detail } => HumanError {
            message: format!("The {} can't be used here.", transport.display_name()),
            suggestion: format!("Another delivery method will be used. ({detail})"),
            retriable: false,
            severity: Severity::Warning,
        },

        TillwerkError::AllTransportsExhausted { .. } => HumanError {
            message: "The receipt couldn't be printed, but it was saved.".into(),
            suggestion: "Reprint it from saved receipts once the printer is back.".into(),
            retriable: true,
            severity: Severity::Warning,
        },

        TillwerkError::Discovery(detail) => HumanError {
            message: "We couldn't search the network for printers.".into(),
            suggestion: format!("Check the network prefix and Wi-Fi connection. ({detail})"),
            retriable: true,
            severity: Severity::Warning,
        },

        TillwerkError::PdfError(_) => HumanError {
            message: "The receipt couldn't be saved as a PDF.".into(),
            suggestion: "Check that the export folder exists and has free space.".into(),
            retriable: true,
            severity: Severity::Warning,
        },

        TillwerkError::Bridge(_) | TillwerkError::PlatformUnavailable => HumanError {
            message: "This device can't open a print dialog.".into(),
            suggestion: "Use a network printer or PDF export instead.".into(),
            retriable: false,
            severity: Severity::Warning,
        },

        TillwerkError::Config(detail) => HumanError {
            message: "The printing settings are invalid.".into(),
            suggestion: format!("Fix the settings and restart. ({detail})"),
            retriable: false,
            severity: Severity::Error,
        },

        TillwerkError::Http(detail) => HumanError {
            message: "The email service could not be reached.".into(),
            suggestion: format!("Check the internet connection. ({detail})"),
            retriable: true,
            severity: Severity::Warning,
        },

        TillwerkError::Database(_)
        | TillwerkError::Io(_)
        | TillwerkError::Serialization(_) => HumanError {
            message: "Local storage on this till is not working.".into(),
            suggestion: "Restart the app. If it keeps happening, free up disk space.".into(),
            retriable: true,
            severity: Severity::Error,
        },
    }
}

/// One-line summary of a delivery for a toast.
pub fn describe_result(result: &DeliveryResult) -> String {
    match (result.success, result.method, result.saved_locally) {
        (true, Some(method), _) => {
            format!("Receipt sent via {}.", method.display_name())
        }
        (_, _, true) => {
            "Printing failed, but the receipt was saved on this till.".to_string()
        }
        _ => "Printing failed.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeliveryAttempt, TransportKind};

    #[test]
    fn unknown_device_is_an_error_without_retry() {
        let h = humanize_error(&TillwerkError::DeviceNotFound("bar-9".into()));
        assert_eq!(h.severity, Severity::Error);
        assert!(!h.retriable);
        assert!(h.message.contains("bar-9"));
    }

    #[test]
    fn malformed_receipt_mentions_detail() {
        let h = humanize_error(&TillwerkError::Encoding("total is missing".into()));
        assert!(h.suggestion.contains("total is missing"));
    }

    #[test]
    fn describe_success_names_method() {
        let result = DeliveryResult::delivered("kitchen-1", TransportKind::Export, Vec::new());
        assert_eq!(describe_result(&result), "Receipt sent via PDF export.");
    }

    #[test]
    fn describe_saved_locally() {
        let attempts = vec![DeliveryAttempt {
            transport: TransportKind::Network,
            printer_id: "kitchen-1".into(),
            outcome: crate::types::AttemptOutcome::Failure,
            detail: "refused".into(),
        }];
        let result = DeliveryResult::saved("kitchen-1", "all failed", attempts);
        assert!(describe_result(&result).contains("saved"));
    }
}
