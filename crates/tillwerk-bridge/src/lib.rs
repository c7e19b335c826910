// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tillwerk — Native print presentation bridges.
//
// The render transport hands a fixed-width receipt to a `PrintPresenter`.
// Which presenter is bound is decided once, at startup, by probing the host:
// a usable spooler yields `SpoolPresenter`, anything else yields
// `HeadlessPresenter`. The delivery path never checks again.

use std::sync::Arc;

use tracing::info;

pub mod spool;
pub mod stub;
pub mod traits;

pub use spool::SpoolPresenter;
pub use stub::HeadlessPresenter;
pub use traits::PrintPresenter;

/// Spooler probed for when no command is configured.
pub const DEFAULT_SPOOLER: &str = "lp";

/// Probe the host and bind a presenter.
///
/// `command` is an optional configured spooler invocation (program followed
/// by arguments). If it is unset, [`DEFAULT_SPOOLER`] is looked up on `PATH`.
pub fn platform_presenter(command: Option<&[String]>) -> Arc<dyn PrintPresenter> {
    let (program, args): (&str, Vec<String>) = match command {
        Some([program, args @ ..]) => (program.as_str(), args.to_vec()),
        _ => (DEFAULT_SPOOLER, Vec::new()),
    };

    match spool::find_in_path(program) {
        Some(path) => {
            let presenter = SpoolPresenter::new(path, args);
            info!(platform = presenter.platform_name(), "print presenter bound");
            Arc::new(presenter)
        }
        None => {
            info!(program, "no spooler found; render transport runs headless");
            Arc::new(HeadlessPresenter)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_spooler_binds_headless() {
        let command = vec!["no-such-spooler-for-tillwerk".to_string()];
        let presenter = platform_presenter(Some(&command));
        assert!(!presenter.is_available());
    }

    #[cfg(unix)]
    #[test]
    fn configured_command_is_bound() {
        let command = vec!["cat".to_string()];
        let presenter = platform_presenter(Some(&command));
        assert!(presenter.is_available());
        assert_eq!(presenter.platform_name(), "Spooler (cat)");
    }
}
