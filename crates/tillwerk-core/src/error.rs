// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Tillwerk.

use thiserror::Error;

use crate::types::TransportKind;

/// Top-level error type for all Tillwerk operations.
#[derive(Debug, Error)]
pub enum TillwerkError {
    // -- Registry --
    #[error("a printer with id '{0}' is already registered")]
    DuplicateId(String),

    #[error("no printer registered with id '{0}'")]
    DeviceNotFound(String),

    // -- Encoding --
    #[error("receipt cannot be encoded: {0}")]
    Encoding(String),

    // -- Transport attempts (recoverable, swallowed by the fallback chain) --
    #[error("{transport} transport timed out: {detail}")]
    TransportTimeout {
        transport: TransportKind,
        detail: String,
    },

    #[error("{transport} transport rejected the receipt: {detail}")]
    TransportRejected {
        transport: TransportKind,
        detail: String,
    },

    #[error("{transport} transport does not apply to this printer: {detail}")]
    TransportInapplicable {
        transport: TransportKind,
        detail: String,
    },

    #[error("all {attempts} delivery methods failed; receipt saved locally")]
    AllTransportsExhausted { attempts: usize },

    // -- Discovery --
    #[error("printer discovery failed: {0}")]
    Discovery(String),

    // -- Export --
    #[error("PDF export failed: {0}")]
    PdfError(String),

    // -- Platform bridge --
    #[error("platform bridge error: {0}")]
    Bridge(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    Config(String),

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(String),
}

/// Whether an error may be absorbed by the delivery fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Confined to one transport attempt; the next transport is tried.
    Recoverable,
    /// Stops the delivery before any transport is attempted.
    Fatal,
}

impl TillwerkError {
    /// Classify this error for the fallback chain.
    ///
    /// Everything a transport can produce is recoverable; only lookup and
    /// encoding failures (and a storage failure while saving a receipt) are
    /// fatal.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::DeviceNotFound(_)
            | Self::Encoding(_)
            | Self::DuplicateId(_)
            | Self::Config(_)
            | Self::Database(_) => ErrorClass::Fatal,
            _ => ErrorClass::Recoverable,
        }
    }

    /// Build a timeout error for a transport.
    pub fn timeout(transport: TransportKind, detail: impl Into<String>) -> Self {
        Self::TransportTimeout {
            transport,
            detail: detail.into(),
        }
    }

    /// Build a rejection error for a transport.
    pub fn rejected(transport: TransportKind, detail: impl Into<String>) -> Self {
        Self::TransportRejected {
            transport,
            detail: detail.into(),
        }
    }

    /// Build an inapplicability error for a transport.
    pub fn inapplicable(transport: TransportKind, detail: impl Into<String>) -> Self {
        Self::TransportInapplicable {
            transport,
            detail: detail.into(),
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TillwerkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_and_encoding_are_fatal() {
        assert_eq!(
            TillwerkError::DeviceNotFound("x".into()).class(),
            ErrorClass::Fatal
        );
        assert_eq!(
            TillwerkError::Encoding("missing total".into()).class(),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn transport_failures_are_recoverable() {
        let errors = [
            TillwerkError::timeout(TransportKind::Network, "3s"),
            TillwerkError::rejected(TransportKind::Email, "backend said no"),
            TillwerkError::inapplicable(TransportKind::Network, "no ip"),
            TillwerkError::PlatformUnavailable,
            TillwerkError::PdfError("font".into()),
        ];
        for err in &errors {
            assert_eq!(err.class(), ErrorClass::Recoverable, "{err}");
        }
    }

    #[test]
    fn messages_name_the_transport() {
        let err = TillwerkError::rejected(TransportKind::Email, "quota exceeded");
        assert_eq!(
            err.to_string(),
            "email transport rejected the receipt: quota exceeded"
        );
    }
}
