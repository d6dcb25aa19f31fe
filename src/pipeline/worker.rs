use crate::error::{MergeError, Result};
use crate::merge::RowFilter;
use crate::pipeline::{MergeController, MergeOptions, MergeOutcome, WorkerEvent};
use crate::scanner::InputFile;
use crate::ui::GracefulShutdown;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Runs merges off the async runtime, one at a time.
pub struct MergeWorker {
    options: MergeOptions,
    row_filter: Arc<dyn RowFilter>,
    shutdown: GracefulShutdown,
    active: Arc<AtomicBool>,
}

/// Clears the busy flag when the blocking task ends, however it ends.
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl MergeWorker {
    pub fn new(
        options: MergeOptions,
        row_filter: Arc<dyn RowFilter>,
        shutdown: GracefulShutdown,
    ) -> Self {
        Self {
            options,
            row_filter,
            shutdown,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Starts a run on the blocking pool. Fails right away for an empty
    /// batch or while another run from this worker is still going.
    pub fn submit(&self, batch: Vec<InputFile>) -> Result<RunHandle> {
        if batch.is_empty() {
            return Err(MergeError::EmptyBatch);
        }

        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(MergeError::RunInProgress);
        }
        let guard = ActiveGuard(self.active.clone());

        let mut controller = MergeController::new(self.options.clone(), self.row_filter.clone())?;
        let shutdown = self.shutdown.clone();
        let (sender, events) = mpsc::unbounded_channel();

        debug!(files = batch.len(), "submitting merge run");

        let task = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            let mut sink = |event: WorkerEvent| {
                // The receiver may already be gone; the outcome still
                // comes back through the join handle.
                let _ = sender.send(event);
            };
            controller.run(&batch, &shutdown, &mut sink)
        });

        Ok(RunHandle { events, task })
    }
}

/// Receiving end of one submitted run.
pub struct RunHandle {
    events: mpsc::UnboundedReceiver<WorkerEvent>,
    task: JoinHandle<Result<MergeOutcome>>,
}

impl RunHandle {
    /// Next event in emission order; `None` once the run has ended and
    /// every event has been received.
    pub async fn next_event(&mut self) -> Option<WorkerEvent> {
        self.events.recv().await
    }

    pub async fn finish(self) -> Result<MergeOutcome> {
        self.task.await.map_err(|e| MergeError::Worker {
            message: format!("merge task panicked or was aborted: {}", e),
        })?
    }
}
