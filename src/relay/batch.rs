//! Chunked batch execution — range enumeration, dispatch, and accounting.

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::types::{BatchReport, Event, ItemOutcome, MessageId, MessageRef};

use super::item_task::{ItemSource, ItemTaskContext};
use super::{BatchRequest, MediaRelay, TrackedTask, sleep_unless_cancelled};

/// Outcome counters for one batch run, monotonically non-decreasing
#[derive(Default)]
struct Counters {
    processed: u64,
    skipped: u64,
    failed: u64,
}

impl MediaRelay {
    /// Execute a batch run to completion (or cancellation).
    ///
    /// Chunk *i* is fully resolved before chunk *i+1* is dispatched; items
    /// within a chunk run concurrently under the transfer gate. The
    /// inter-chunk delay paces actions against the remote service
    /// independently of the gate's per-item concurrency cap.
    pub(crate) async fn run_batch(
        &self,
        request: BatchRequest,
        cancel: CancellationToken,
    ) -> BatchReport {
        let started_at = Utc::now();
        let destination = request.destination.clone();

        let start = match MessageRef::parse(&request.start_reference) {
            Ok(parsed) => parsed,
            Err(e) => {
                // Abort before any dispatch; the parse failure is the only side effect
                tracing::warn!(error = %e, "Batch start reference did not parse");
                self.reply_soft(&destination, &format!("Could not start the batch: {e}"))
                    .await;
                return BatchReport {
                    processed: 0,
                    skipped: 0,
                    failed: 0,
                    cancelled: false,
                    started_at,
                    completed_at: Utc::now(),
                };
            }
        };

        let end = MessageId(start.id.0 + i64::from(request.count.max(1)) - 1);
        self.emit_event(Event::BatchStarted {
            chat: start.chat.clone(),
            start: start.id,
            end,
        });
        tracing::info!(
            chat = %start.chat,
            start = start.id.0,
            end = end.0,
            total = request.count,
            "Starting batch run"
        );

        let status = self
            .reporter
            .post(
                &destination,
                &format!(
                    "Starting batch\nFrom: {}\nTo: {}\nTotal: {} posts",
                    start.id, end, request.count
                ),
            )
            .await
            .ok();

        let chunk_size = self.config.transfer.chunk_size;
        let delay = self.config.transfer.inter_action_delay();
        let mut counters = Counters::default();
        let mut chunk: Vec<TrackedTask<ItemOutcome>> = Vec::with_capacity(chunk_size);
        let mut chunk_index = 0;
        let mut aborted = false;

        for raw_id in start.id.0..=end.0 {
            if cancel.is_cancelled() {
                aborted = true;
                break;
            }
            let id = MessageId(raw_id);

            // Pre-check: missing or empty messages are skipped without
            // spending a dispatch or a gate permit.
            match self.store.fetch_message(&start.chat, id).await {
                Ok(None) => {
                    counters.skipped += 1;
                    continue;
                }
                Ok(Some(view)) if view.is_empty() => {
                    counters.skipped += 1;
                    continue;
                }
                Ok(Some(_)) => {}
                Err(e) => {
                    counters.failed += 1;
                    tracing::warn!(chat = %start.chat, message_id = raw_id, error = %e, "Pre-check failed");
                    continue;
                }
            }

            chunk.push(self.spawn_batch_item(start.with_id(id), &request));

            if chunk.len() >= chunk_size {
                if self.drain_chunk(&mut chunk, chunk_index, &mut counters).await {
                    aborted = true;
                    break;
                }
                chunk_index += 1;

                // Stay under the remote service's action rate between
                // chunks; this is independent of the gate width.
                if !sleep_unless_cancelled(&cancel, delay).await {
                    aborted = true;
                    break;
                }
            }
        }

        // Flush the final partial chunk
        if !aborted
            && !chunk.is_empty()
            && self.drain_chunk(&mut chunk, chunk_index, &mut counters).await
        {
            aborted = true;
        }

        if let Some(status) = status
            && let Err(e) = self.reporter.delete(status).await
        {
            tracing::debug!(status = status.0, error = %e, "Failed to delete batch status message");
        }

        if aborted {
            self.reply_soft(
                &destination,
                &format!("Batch cancelled after processing {} posts.", counters.processed),
            )
            .await;
        } else {
            self.reply_soft(
                &destination,
                &format!(
                    "Batch complete.\nProcessed: {}\nSkipped: {}\nFailed: {}",
                    counters.processed, counters.skipped, counters.failed
                ),
            )
            .await;
        }

        let report = BatchReport {
            processed: counters.processed,
            skipped: counters.skipped,
            failed: counters.failed,
            cancelled: aborted,
            started_at,
            completed_at: Utc::now(),
        };
        tracing::info!(
            processed = report.processed,
            skipped = report.skipped,
            failed = report.failed,
            cancelled = report.cancelled,
            "Batch run finished"
        );
        self.emit_event(Event::BatchCompleted {
            report: report.clone(),
        });
        report
    }

    /// Dispatch one item task for a message in the batch range.
    fn spawn_batch_item(
        &self,
        source: MessageRef,
        request: &BatchRequest,
    ) -> TrackedTask<ItemOutcome> {
        let relay = self.clone();
        let destination = request.destination.clone();
        let tier = request.tier;
        self.state.tracker.track(move |cancel| async move {
            let ctx = ItemTaskContext {
                relay,
                destination,
                tier,
                cancel,
            };
            super::item_task::run_item(ctx, ItemSource::Resolved(source)).await
        })
    }

    /// Await every task in the chunk and classify its outcome.
    ///
    /// Returns `true` if the batch must abort (an item was cancelled).
    async fn drain_chunk(
        &self,
        chunk: &mut Vec<TrackedTask<ItemOutcome>>,
        index: usize,
        counters: &mut Counters,
    ) -> bool {
        let size = chunk.len();
        for task in chunk.drain(..) {
            match task.join().await {
                Ok(ItemOutcome::Processed) => counters.processed += 1,
                Ok(ItemOutcome::Skipped) => counters.skipped += 1,
                Ok(ItemOutcome::Failed) => counters.failed += 1,
                Ok(ItemOutcome::Cancelled) => return true,
                Err(e) => {
                    counters.failed += 1;
                    tracing::error!(error = %e, "Item task panicked");
                }
            }
        }
        self.emit_event(Event::ChunkCompleted { index, size });
        false
    }

    /// Send a reply, logging instead of failing when the surface rejects it.
    pub(crate) async fn reply_soft(&self, destination: &crate::types::ChatRef, text: &str) {
        if let Err(e) = self.reporter.reply(destination, text).await {
            tracing::warn!(destination = %destination, error = %e, "Failed to send reply");
        }
    }
}
