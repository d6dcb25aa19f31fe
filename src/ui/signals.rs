use crate::error::{MergeError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag. The first Ctrl+C asks the running merge
/// to stop at the next archive boundary; the second exits immediately.
#[derive(Debug, Clone)]
pub struct GracefulShutdown {
    running: Arc<AtomicBool>,
    interrupted: Arc<AtomicBool>,
}

impl GracefulShutdown {
    pub fn new() -> Result<Self> {
        let shutdown = Self::new_for_test();

        let running = shutdown.running.clone();
        let interrupted = shutdown.interrupted.clone();

        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);

            if !interrupted.swap(true, Ordering::SeqCst) {
                eprintln!("\n🛑 Stopping after the current archive... (press Ctrl+C again to force exit)");
            } else {
                eprintln!("\n💀 Force stopping...");
                std::process::exit(130);
            }
        })
        .map_err(|e| MergeError::Config {
            message: format!("Failed to set signal handler: {}", e),
        })?;

        Ok(shutdown)
    }

    /// No signal handler is installed; cancellation only via `request_shutdown`.
    pub fn new_for_test() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            interrupted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn check_shutdown(&self) -> Result<()> {
        if !self.is_running() {
            return Err(MergeError::Cancelled);
        }
        Ok(())
    }

    pub fn request_shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
