//! Orchestrator module for the geocode-then-index pipeline.
//!
//! Pulls tasks from the task source, runs them, and hands failures back to
//! the queue for another attempt.

mod deferred;

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, sleep_until, Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

use deferred::DeferredTasks;

use crate::config::PipelineConfig;
use crate::errors::{IngestError, TaskError};
use crate::queue::{StreamMessage, TaskEnvelope, TaskQueue, TaskSource};
use crate::tasks::{PipelineStats, TaskRunner};

/// How long shutdown waits for re-enqueued tasks to reach the queue.
const QUEUE_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Size of the message channel buffer.
    pub channel_buffer_size: usize,
    /// How often progress is logged.
    pub progress_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: 1000,
            progress_interval: Duration::from_secs(10),
        }
    }
}

/// Worker loop for the task queue.
///
/// The orchestrator:
/// - Starts the task source and routes its batches to the runner
/// - Re-enqueues failed tasks with a growing delay until `max_attempts`
/// - Sets retries that arrive early aside until they are due, without
///   holding up the rest of their batch
/// - Acknowledges a batch once every task in it completed or was re-enqueued
/// - Handles shutdown signals and logs progress
pub struct Orchestrator {
    source: Arc<dyn TaskSource>,
    runner: Arc<TaskRunner>,
    queue: Arc<dyn TaskQueue>,
    pipeline: PipelineConfig,
    config: OrchestratorConfig,
    shutdown_tx: broadcast::Sender<()>,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn TaskSource>,
        runner: Arc<TaskRunner>,
        queue: Arc<dyn TaskQueue>,
        pipeline: PipelineConfig,
    ) -> Self {
        Self::with_config(source, runner, queue, pipeline, OrchestratorConfig::default())
    }

    pub fn with_config(
        source: Arc<dyn TaskSource>,
        runner: Arc<TaskRunner>,
        queue: Arc<dyn TaskQueue>,
        pipeline: PipelineConfig,
        config: OrchestratorConfig,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            source,
            runner,
            queue,
            pipeline,
            config,
            shutdown_tx,
        }
    }

    pub fn stats(&self) -> &Arc<PipelineStats> {
        self.runner.stats()
    }

    /// Run the orchestrator.
    ///
    /// Blocks until the source ends, `shutdown` is called, or ctrl-c is
    /// received.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), IngestError> {
        info!(
            index_policy = %self.pipeline.index_policy,
            max_attempts = self.pipeline.max_attempts,
            "Starting firm indexer orchestrator"
        );

        self.source.subscribe()?;

        let (task_transmitter, mut task_receiver) =
            mpsc::channel::<StreamMessage>(self.config.channel_buffer_size);
        let (ack_transmitter, ack_receiver) =
            mpsc::channel::<StreamMessage>(self.config.channel_buffer_size);

        let source = self.source.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        let source_handle = tokio::spawn(async move {
            if let Err(e) = source.run(task_transmitter, ack_receiver, shutdown_rx).await {
                error!(error = %e, "Task source error");
            }
        });

        info!("Ready to process tasks");

        let mut progress_timer = interval(self.config.progress_interval);
        progress_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut prev_completed: u64 = 0;
        let mut prev_time = std::time::Instant::now();
        let mut deferred = DeferredTasks::default();

        loop {
            let next_due = deferred.next_due().unwrap_or_else(Instant::now);

            tokio::select! {
                msg = task_receiver.recv() => {
                    match msg {
                        Some(StreamMessage::Tasks { tasks, offsets }) => {
                            debug!(task_count = tasks.len(), offset_count = offsets.len(), "Received tasks");
                            match self.process_tasks(tasks).await {
                                Ok(waiting) if waiting.is_empty() => {
                                    let ack = StreamMessage::Acknowledgment {
                                        offsets,
                                        success: true,
                                        error: None,
                                    };
                                    let _ = ack_transmitter.send(ack).await;
                                }
                                Ok(waiting) => {
                                    debug!(deferred = waiting.len(), "Holding acknowledgment until deferred retries run");
                                    deferred.hold(offsets, waiting);
                                }
                                Err(e) => {
                                    error!(error = %e, "Failed to hand back failed tasks. Sending NACK");
                                    let ack = StreamMessage::Acknowledgment {
                                        offsets,
                                        success: false,
                                        error: Some(e.to_string()),
                                    };
                                    let _ = ack_transmitter.send(ack).await;
                                }
                            }
                        }
                        Some(StreamMessage::Error(e)) => {
                            error!(error = %e, "Received error from task source");
                        }
                        Some(StreamMessage::End) | None => {
                            info!("Task stream ended");
                            break;
                        }
                        Some(StreamMessage::Acknowledgment { .. }) => {
                            warn!("Received acknowledgment on task channel (should be on ack channel)");
                        }
                    }
                }
                _ = sleep_until(next_due), if !deferred.is_empty() => {
                    for (batch, envelope) in deferred.take_due(Instant::now()) {
                        let error = match self.run_envelope(&envelope).await {
                            Ok(()) => None,
                            Err(e) => {
                                error!(error = %e, task = %envelope.task, "Failed to hand back deferred task");
                                Some(e.to_string())
                            }
                        };
                        if let Some(ack) = deferred.finish(batch, error) {
                            let _ = ack_transmitter.send(ack).await;
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    let _ = self.shutdown_tx.send(());
                    break;
                }
                _ = progress_timer.tick() => {
                    let stats = self.stats().snapshot();
                    let now = std::time::Instant::now();
                    let elapsed_secs = now.duration_since(prev_time).as_secs_f64();
                    let tasks_per_sec = if elapsed_secs > 0.0 {
                        (stats.tasks_completed.saturating_sub(prev_completed) as f64) / elapsed_secs
                    } else {
                        0.0
                    };

                    info!(
                        tasks_completed = stats.tasks_completed,
                        tasks_retried = stats.tasks_retried,
                        tasks_abandoned = stats.tasks_abandoned,
                        geocode_succeeded = stats.geocode_succeeded,
                        geocode_failed = stats.geocode_failed,
                        documents_stored = stats.documents_stored,
                        documents_deleted = stats.documents_deleted,
                        tasks_per_sec = format!("{:.2}", tasks_per_sec),
                        "Processing progress"
                    );

                    prev_completed = stats.tasks_completed;
                    prev_time = now;
                }
            }
        }

        let _ = source_handle.await;

        if !deferred.is_empty() {
            // Their batches were never acknowledged, so a durable queue redelivers them
            warn!(deferred = deferred.len(), "Stopping with retries that were not yet due");
        }

        if let Err(e) = self.queue.flush(QUEUE_FLUSH_TIMEOUT) {
            warn!(error = %e, "Queued retries may not have been delivered");
        }

        let stats = self.stats().snapshot();
        info!(
            tasks_completed = stats.tasks_completed,
            tasks_abandoned = stats.tasks_abandoned,
            "Orchestrator shutdown complete"
        );
        Ok(())
    }

    /// Run the due tasks of a batch in delivery order.
    ///
    /// Returns the retries that are not due yet. Returns an error only when a
    /// failed task could not be handed back to the queue, so the batch is not
    /// acknowledged.
    async fn process_tasks(&self, tasks: Vec<TaskEnvelope>) -> Result<Vec<TaskEnvelope>, IngestError> {
        let mut waiting = Vec::new();
        for envelope in tasks {
            if let Some(delay) = envelope.remaining_delay() {
                debug!(task = %envelope.task, delay_ms = delay.as_millis() as u64, "Deferring retry");
                waiting.push(envelope);
                continue;
            }
            self.run_envelope(&envelope).await?;
        }
        Ok(waiting)
    }

    async fn run_envelope(&self, envelope: &TaskEnvelope) -> Result<(), IngestError> {
        match self.runner.run(&envelope.task).await {
            Ok(_) => {
                self.stats().record_task_completed();
                Ok(())
            }
            Err(e) => self.handle_failure(envelope, e),
        }
    }

    fn handle_failure(&self, envelope: &TaskEnvelope, error: TaskError) -> Result<(), IngestError> {
        if envelope.attempt >= self.pipeline.max_attempts {
            error!(
                task = %envelope.task,
                task_id = %envelope.id,
                attempt = envelope.attempt,
                error = %error,
                "Task failed on its last attempt, giving up"
            );
            self.stats().record_task_abandoned();
            return Ok(());
        }

        let delay = self.pipeline.backoff_for(envelope.attempt);
        warn!(
            task = %envelope.task,
            task_id = %envelope.id,
            attempt = envelope.attempt,
            retry_in_ms = delay.as_millis() as u64,
            error = %error,
            "Task failed, scheduling retry"
        );
        self.queue.enqueue_envelope(envelope.next_attempt(delay))?;
        self.stats().record_task_retried();
        Ok(())
    }

    /// Trigger a graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}
