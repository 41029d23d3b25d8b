//! Shutdown signal handling for foreground mounts.
//!
//! - First Ctrl+C / SIGTERM / SIGHUP: wakes [`ShutdownSignal::wait_for_shutdown`] so the
//!   mount can be torn down cleanly
//! - Second signal: immediate exit

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};

use anyhow::{Context, Result};

/// Exit status used when a second signal aborts the cleanup.
const FORCED_EXIT: i32 = 130;

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Receiver woken once by the first shutdown signal.
pub struct ShutdownSignal {
    rx: Receiver<()>,
}

/// Install the process-wide handler. Call once, before mounting.
pub fn install() -> Result<ShutdownSignal> {
    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        if SHUTDOWN_REQUESTED.swap(true, Ordering::SeqCst) {
            eprintln!("\nForced exit");
            std::process::exit(FORCED_EXIT);
        }
        eprintln!("\nShutdown requested (Ctrl+C again to force exit)");
        let _ = tx.send(());
    })
    .context("Failed to set signal handler")?;
    Ok(ShutdownSignal { rx })
}

impl ShutdownSignal {
    /// Block until the first shutdown signal arrives.
    pub fn wait_for_shutdown(&self) {
        // A disconnected sender means the handler is gone; treat that as shutdown too.
        let _ = self.rx.recv();
    }
}
