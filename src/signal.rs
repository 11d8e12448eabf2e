//! Ctrl+C handling for graceful shutdown.
//!
//! A [`ShutdownHandler`] combines an `AtomicBool` (for synchronous checks)
//! with a `tokio` [`Notify`] so the async session loop can wake up as soon
//! as shutdown is requested, whether by the signal or by the console's
//! `quit` command.
//!
//! ```rust,no_run
//! use qrattend::signal::install_handler;
//!
//! # async fn demo() -> Result<(), qrattend::signal::SignalError> {
//! let handler = install_handler()?;
//! handler.wait().await;
//! assert!(handler.is_shutdown_requested());
//! # Ok(())
//! # }
//! ```

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::sync::Notify;

/// Shared shutdown flag with async wake-up.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandler {
    flag: Arc<AtomicBool>,
    interrupted: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Request shutdown and wake the waiting task.
    pub fn request_shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
        // notify_one stores a permit if nobody is waiting yet.
        self.notify.notify_one();
    }

    /// Request shutdown on behalf of a signal.
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        self.request_shutdown();
    }

    /// Whether shutdown came from a signal rather than a normal quit.
    #[must_use]
    pub fn was_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown has been requested.
    pub async fn wait(&self) {
        while !self.is_shutdown_requested() {
            self.notify.notified().await;
        }
    }

    /// Clear the flag so the handler can be reused.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
        self.interrupted.store(false, Ordering::SeqCst);
    }
}

/// Error installing the signal handler.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("Failed to install signal handler: {0}")]
    InstallFailed(#[from] ctrlc::Error),
}

static GLOBAL_HANDLER: OnceLock<ShutdownHandler> = OnceLock::new();

/// Install the process-wide Ctrl+C handler.
///
/// The handler can only be registered once per process; later calls reset
/// and return the same [`ShutdownHandler`].
///
/// # Errors
///
/// Returns [`SignalError`] if the OS refuses the handler and no handler
/// was registered before.
pub fn install_handler() -> Result<ShutdownHandler, SignalError> {
    if let Some(handler) = GLOBAL_HANDLER.get() {
        handler.reset();
        return Ok(handler.clone());
    }

    let handler = ShutdownHandler::new();
    let hooked = handler.clone();

    match ctrlc::set_handler(move || {
        let _ = writeln!(std::io::stderr(), "\nInterrupted. Stopping scanner...");
        let _ = std::io::stderr().flush();
        log::info!("Shutdown signal received");
        hooked.interrupt();
    }) {
        Ok(()) => {
            let _ = GLOBAL_HANDLER.set(handler.clone());
            Ok(handler)
        }
        Err(ctrlc::Error::MultipleHandlers) => {
            log::debug!("Ctrl+C handler already registered, using unhooked handler");
            Ok(GLOBAL_HANDLER.get_or_init(ShutdownHandler::new).clone())
        }
        Err(e) => Err(e.into()),
    }
}
