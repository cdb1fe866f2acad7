//! Periodic flush task for the write-behind pipeline.
//!
//! The enqueue path only re-evaluates the flush triggers when a new event
//! arrives, so during silence a small trailing batch could wait past its
//! time budget. This ticker attempts a flush on a fixed cadence,
//! independent of enqueue activity, through the same single-flush gate.
//! On shutdown it drains the buffer before exiting.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use emis_events::EventPublisher;

use crate::store::{ConversationStore, MessageStore};
use crate::write_behind::MessagePersistence;

/// Background task that flushes the pipeline on a fixed cadence.
pub struct FlushTicker<M, C, P> {
    pipeline: Arc<MessagePersistence<M, C, P>>,
    interval: Duration,
}

impl<M, C, P> FlushTicker<M, C, P>
where
    M: MessageStore + 'static,
    C: ConversationStore + 'static,
    P: EventPublisher + 'static,
{
    /// Create a ticker over a shared pipeline.
    pub fn new(pipeline: Arc<MessagePersistence<M, C, P>>, interval: Duration) -> Self {
        Self { pipeline, interval }
    }

    /// Run until `shutdown` flips to true, then drain the buffer.
    ///
    /// Spawn via `tokio::spawn`. Flush failures are logged, not fatal:
    /// failed entries were requeued and a later tick retries them.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            "Flush ticker started"
        );

        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(e) = self.pipeline.flush().await {
                        warn!(error = %e, "Periodic flush failed, entries requeued");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.drain().await;
        info!("Flush ticker stopped");
    }

    /// Flush until the buffer is empty (or a flush makes no progress).
    async fn drain(&self) {
        while !self.pipeline.buffer().is_empty() {
            match self.pipeline.flush().await {
                Ok(report) if report.flushed == 0 && report.skipped == 0 => {
                    // Gate contention or nothing drained; do not spin.
                    warn!(
                        remaining = self.pipeline.buffer().len(),
                        "Shutdown drain made no progress"
                    );
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(
                        error = %e,
                        remaining = self.pipeline.buffer().len(),
                        "Shutdown drain failed; remaining entries rely on broker redelivery"
                    );
                    break;
                }
            }
        }
    }
}
