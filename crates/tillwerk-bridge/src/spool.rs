// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Spooler presenter for desktop hosts.
//
// Pipes the fixed-width text rendering into a print command (CUPS `lp` by
// default) and waits for it to exit. The command's exit status is the
// platform's verdict; a command still running when the wait elapses is
// killed and reported as a timeout.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tillwerk_core::error::{Result, TillwerkError};
use tillwerk_core::types::{RenderedReceipt, TransportKind};
use tracing::{debug, info, warn};

use crate::traits::PrintPresenter;

/// How often a running spooler is polled for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long after the spooler exits its stdin writer may take to report.
const WRITER_GRACE: Duration = Duration::from_millis(200);

/// Presenter that sends receipts to a spooler command.
pub struct SpoolPresenter {
    program: PathBuf,
    args: Vec<String>,
    name: String,
}

impl SpoolPresenter {
    /// Bind a spooler command. `program` should already be resolved with
    /// [`find_in_path`].
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        let program = program.into();
        let name = format!(
            "Spooler ({})",
            program
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| program.display().to_string())
        );
        Self {
            program,
            args,
            name,
        }
    }
}

impl PrintPresenter for SpoolPresenter {
    fn platform_name(&self) -> &str {
        &self.name
    }

    fn present_for_print(&self, receipt: &RenderedReceipt, wait: Duration) -> Result<()> {
        info!(
            program = %self.program.display(),
            title = %receipt.title,
            "sending receipt to spooler"
        );

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                TillwerkError::Bridge(format!("spawn {}: {e}", self.program.display()))
            })?;

        // Feed stdin from its own thread so a spooler that never reads cannot
        // hold us past the deadline.
        let (written_tx, written_rx) = mpsc::channel();
        if let Some(mut stdin) = child.stdin.take() {
            let text = receipt.text.clone().into_bytes();
            thread::spawn(move || {
                let _ = written_tx.send(stdin.write_all(&text));
            });
        }

        let deadline = Instant::now() + wait;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    warn!(wait_ms = wait.as_millis() as u64, "spooler did not finish in time");
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(TillwerkError::timeout(
                        TransportKind::Render,
                        format!("spooler still running after {}ms", wait.as_millis()),
                    ));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(TillwerkError::Bridge(format!("wait for spooler: {e}")));
                }
            }
        };

        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            return Err(TillwerkError::Bridge(format!(
                "spooler exited with {status}: {}",
                stderr.trim()
            )));
        }

        // The writer finishes before a spooler that read everything can exit;
        // anything else means part of the receipt never reached it.
        match written_rx.recv_timeout(WRITER_GRACE) {
            Ok(Ok(())) => {
                debug!("spooler accepted receipt");
                Ok(())
            }
            Ok(Err(e)) => Err(TillwerkError::Bridge(format!(
                "spooler exited before reading the receipt: {e}"
            ))),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Err(
                TillwerkError::Bridge("spooler exited before reading the receipt".into()),
            ),
        }
    }
}

/// Resolve `program` against `PATH`. Paths containing a separator are checked
/// as given.
pub fn find_in_path(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|p| p.is_file())
}
