//! Background compaction task
//!
//! A dedicated thread owned by one store instance, ticking on a crossbeam
//! timer until the store closes or is dropped.

use std::sync::Weak;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Sender};

use crate::error::Result;

use super::Store;

#[derive(Debug, PartialEq, Eq)]
enum Event {
    Tick,
    /// Explicit cancel or a dropped sender
    Shutdown,
}

/// Handle to a running compaction loop; dropping it stops the loop
pub(crate) struct CompactionTask {
    /// Dropping the sender disconnects the channel, which wakes the loop
    shutdown: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl CompactionTask {
    /// Start running `do_compaction` every `period`.
    ///
    /// The thread only holds a `Weak` reference, so it never keeps a store
    /// alive on its own.
    pub(crate) fn spawn(store: Weak<Store>, period: Duration) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = channel::bounded::<()>(1);

        let handle = thread::Builder::new()
            .name("hashkv-compaction".to_string())
            .spawn(move || {
                let ticker = channel::tick(period);
                let mut run_id = 0u64;

                tracing::info!(period_ms = period.as_millis() as u64, "Compaction task started");

                loop {
                    let event = crossbeam::select! {
                        recv(ticker) -> _ => Event::Tick,
                        recv(shutdown_rx) -> _ => Event::Shutdown,
                    };
                    if event == Event::Shutdown {
                        break;
                    }

                    let Some(store) = store.upgrade() else { break };
                    run_id += 1;

                    match store.do_compaction() {
                        Ok(stats) => {
                            tracing::debug!(run_id, ?stats, "Scheduled compaction finished");
                        }
                        Err(e) => {
                            tracing::warn!(run_id, error = %e, "Scheduled compaction failed");
                        }
                    }
                }

                tracing::info!(runs = run_id, "Compaction task stopped");
            })?;

        Ok(Self {
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    /// Stop the loop and wait for an in-flight run to finish
    pub(crate) fn cancel(&mut self) {
        self.shutdown.take();

        if let Some(handle) = self.handle.take() {
            // The last store reference can be dropped on the task thread itself
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if handle.join().is_err() {
                tracing::error!("Compaction task panicked");
            }
        }
    }
}

impl Drop for CompactionTask {
    fn drop(&mut self) {
        self.cancel();
    }
}
