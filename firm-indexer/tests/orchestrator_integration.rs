//! Integration tests for the orchestrator worker loop.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, timeout};

use chrono::Utc;
use firm_indexer::config::{IndexPolicy, PipelineConfig};
use firm_indexer::errors::IngestError;
use firm_indexer::notifier::ChangeNotifier;
use firm_indexer::orchestrator::Orchestrator;
use firm_indexer::queue::{
    ChannelTaskQueue, Offset, StreamMessage, Task, TaskEnvelope, TaskQueue, TaskSource,
};
use firm_indexer::tasks::{PipelineStats, StatsSnapshot, TaskRunner};
use firm_indexer_repository::{InMemoryEntityStore, InMemoryIndex, IndexCall};
use firm_indexer_shared::{Coordinates, Firm, FirmId, Office, OfficeId};
use geocoder::MockGeocoder;

const HOLBORN: &str = "120 Holborn, EC1N 2TD, United Kingdom";

/// Task source that delivers one scripted batch, waits for its
/// acknowledgment and ends the stream.
struct ScriptedSource {
    batch: Mutex<Option<(Vec<TaskEnvelope>, Vec<Offset>)>>,
    acks: Arc<Mutex<Vec<bool>>>,
}

impl ScriptedSource {
    fn new(tasks: Vec<Task>) -> (Self, Arc<Mutex<Vec<bool>>>) {
        Self::with_envelopes(tasks.into_iter().map(TaskEnvelope::new).collect())
    }

    fn with_envelopes(envelopes: Vec<TaskEnvelope>) -> (Self, Arc<Mutex<Vec<bool>>>) {
        let acks = Arc::new(Mutex::new(Vec::new()));
        let offsets = vec![("firm-indexer.tasks".to_string(), 0, 41)];
        let source = Self {
            batch: Mutex::new(Some((envelopes, offsets))),
            acks: acks.clone(),
        };
        (source, acks)
    }
}

#[async_trait]
impl TaskSource for ScriptedSource {
    fn subscribe(&self) -> Result<(), IngestError> {
        Ok(())
    }

    async fn run(
        &self,
        sender: mpsc::Sender<StreamMessage>,
        mut ack_receiver: mpsc::Receiver<StreamMessage>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), IngestError> {
        let batch = self.batch.lock().unwrap().take();
        if let Some((tasks, offsets)) = batch {
            sender
                .send(StreamMessage::Tasks { tasks, offsets })
                .await
                .map_err(|e| IngestError::channel(e.to_string()))?;

            tokio::select! {
                Some(StreamMessage::Acknowledgment { success, .. }) = ack_receiver.recv() => {
                    self.acks.lock().unwrap().push(success);
                }
                _ = shutdown.recv() => {}
            }
        }

        let _ = sender.send(StreamMessage::End).await;
        Ok(())
    }
}

struct Harness {
    store: Arc<InMemoryEntityStore>,
    index: Arc<InMemoryIndex>,
    queue: Arc<ChannelTaskQueue>,
    runner: Arc<TaskRunner>,
    config: PipelineConfig,
}

fn harness(max_attempts: u32, retry_backoff: Duration) -> (Harness, firm_indexer::queue::ChannelTaskSource) {
    let store = Arc::new(InMemoryEntityStore::new());
    let index = Arc::new(InMemoryIndex::new());
    let geocoder = Arc::new(MockGeocoder::new());
    geocoder.register(HOLBORN, Coordinates::new(51.5180697, -0.1085203));

    let (queue, source) = ChannelTaskQueue::new();
    let queue = Arc::new(queue);
    let config = PipelineConfig {
        index_policy: IndexPolicy::Always,
        max_attempts,
        retry_backoff,
    };
    let runner = Arc::new(TaskRunner::new(
        store.clone(),
        geocoder,
        index.clone(),
        queue.clone(),
        &config,
        Arc::new(PipelineStats::new()),
    ));

    (
        Harness {
            store,
            index,
            queue,
            runner,
            config,
        },
        source,
    )
}

async fn onboard_firm(harness: &Harness) {
    let notifier = ChangeNotifier::new(harness.queue.clone(), harness.config.index_policy);
    let mut firm = Firm::new(FirmId(1), "Acme Advice Ltd", Utc::now());
    firm.email_address = Some("advice@acme.example".to_string());
    firm.telephone_number = Some("020 7946 0000".to_string());
    firm.advice_types.equity_release = true;

    let mut scope = notifier.begin();
    scope.record(&harness.store.save_firm(firm).await);
    scope.record(
        &harness
            .store
            .save_office(Office::new(
                OfficeId(10),
                FirmId(1),
                "120 Holborn",
                "London",
                "EC1N 2TD",
                Utc::now(),
            ))
            .await,
    );
    scope.mark_committed();
}

/// Poll the stats until `done` holds or a second passes.
async fn wait_for(orchestrator: &Orchestrator, done: impl Fn(&StatsSnapshot) -> bool) -> StatsSnapshot {
    let result = timeout(Duration::from_secs(1), async {
        loop {
            let stats = orchestrator.stats().snapshot();
            if done(&stats) {
                return stats;
            }
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    result.expect("Condition not reached in time")
}

#[tokio::test]
async fn test_orchestrator_runs_committed_work() {
    let (harness, source) = harness(3, Duration::from_millis(10));
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(source),
        harness.runner.clone(),
        harness.queue.clone(),
        harness.config.clone(),
    ));
    let worker = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.run().await })
    };

    onboard_firm(&harness).await;
    let stats = wait_for(&orchestrator, |s| s.documents_stored >= 2).await;

    assert_eq!(stats.geocode_succeeded, 1);
    assert_eq!(stats.tasks_retried, 0);
    let document = harness.index.document(FirmId(1)).await.unwrap();
    assert_eq!(document.address_line_one.as_deref(), Some("120 Holborn"));
    assert_eq!(document.equity_release, 100);

    orchestrator.shutdown();
    let result = timeout(Duration::from_secs(5), worker).await;
    assert!(result.is_ok(), "Orchestrator should stop after shutdown");
    assert!(result.unwrap().unwrap().is_ok());
}

#[tokio::test]
async fn test_failed_task_is_retried_until_it_succeeds() {
    let (harness, source) = harness(5, Duration::from_millis(100));
    onboard_firm(&harness).await;
    harness.index.set_failing(true);

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(source),
        harness.runner.clone(),
        harness.queue.clone(),
        harness.config.clone(),
    ));
    let worker = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.run().await })
    };

    wait_for(&orchestrator, |s| s.tasks_retried >= 1).await;
    harness.index.set_failing(false);
    wait_for(&orchestrator, |s| s.documents_stored >= 1).await;

    assert!(harness.index.contains(FirmId(1)).await);
    assert_eq!(orchestrator.stats().snapshot().tasks_abandoned, 0);

    orchestrator.shutdown();
    let result = timeout(Duration::from_secs(5), worker).await;
    assert!(result.is_ok(), "Orchestrator should stop after shutdown");
}

#[tokio::test]
async fn test_task_is_abandoned_after_max_attempts() {
    let (harness, source) = harness(2, Duration::from_millis(10));
    harness.index.set_failing(true);
    harness.queue.enqueue(Task::index_firm(FirmId(1))).unwrap();

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(source),
        harness.runner.clone(),
        harness.queue.clone(),
        harness.config.clone(),
    ));
    let worker = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.run().await })
    };

    // A missing firm is deleted from the index, which is failing
    let stats = wait_for(&orchestrator, |s| s.tasks_abandoned >= 1).await;
    assert_eq!(stats.tasks_retried, 1);
    assert_eq!(stats.tasks_completed, 0);

    orchestrator.shutdown();
    let result = timeout(Duration::from_secs(5), worker).await;
    assert!(result.is_ok(), "Orchestrator should stop after shutdown");
}

#[tokio::test]
async fn test_batch_is_nacked_when_retry_cannot_be_enqueued() {
    let (harness, channel_source) = harness(3, Duration::from_millis(10));
    // Retries have nowhere to go
    drop(channel_source);
    harness.index.set_failing(true);

    let (source, acks) = ScriptedSource::new(vec![Task::index_firm(FirmId(1))]);
    let orchestrator = Orchestrator::new(
        Arc::new(source),
        harness.runner.clone(),
        harness.queue.clone(),
        harness.config.clone(),
    );

    let result = timeout(Duration::from_secs(5), orchestrator.run()).await;
    assert!(result.is_ok(), "Orchestrator should finish when the stream ends");
    assert!(result.unwrap().is_ok());
    assert_eq!(*acks.lock().unwrap(), vec![false]);
}

#[tokio::test]
async fn test_successful_batch_is_acknowledged() {
    let (harness, _channel_source) = harness(3, Duration::from_millis(10));
    let (source, acks) = ScriptedSource::new(vec![
        Task::index_firm(FirmId(1)),
        Task::geocode_firm(FirmId(2), true),
    ]);
    let orchestrator = Orchestrator::new(
        Arc::new(source),
        harness.runner.clone(),
        harness.queue.clone(),
        harness.config.clone(),
    );

    let result = timeout(Duration::from_secs(5), orchestrator.run()).await;
    assert!(result.is_ok(), "Orchestrator should finish when the stream ends");
    assert_eq!(*acks.lock().unwrap(), vec![true]);
    assert_eq!(orchestrator.stats().snapshot().tasks_completed, 2);
}

#[tokio::test]
async fn test_worker_leaves_index_preparation_to_startup() {
    let (harness, _channel_source) = harness(3, Duration::from_millis(10));
    let (source, acks) = ScriptedSource::new(vec![Task::index_firm(FirmId(1))]);
    let orchestrator = Orchestrator::new(
        Arc::new(source),
        harness.runner.clone(),
        harness.queue.clone(),
        harness.config.clone(),
    );

    let result = timeout(Duration::from_secs(5), orchestrator.run()).await;

    assert!(result.is_ok(), "Orchestrator should finish when the stream ends");
    assert_eq!(*acks.lock().unwrap(), vec![true]);
    assert_eq!(harness.index.calls().await, vec![IndexCall::Delete(FirmId(1))]);
}

#[tokio::test]
async fn test_due_task_is_not_held_up_by_pending_retry() {
    let (harness, source) = harness(3, Duration::from_millis(10));
    let retry = TaskEnvelope::new(Task::index_firm(FirmId(2))).next_attempt(Duration::from_secs(30));
    harness.queue.enqueue_envelope(retry).unwrap();
    onboard_firm(&harness).await;

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(source),
        harness.runner.clone(),
        harness.queue.clone(),
        harness.config.clone(),
    ));
    let worker = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.run().await })
    };

    let stats = wait_for(&orchestrator, |s| s.documents_stored >= 2).await;
    assert_eq!(stats.documents_deleted, 0, "The retry is not due yet");
    assert!(harness.index.contains(FirmId(1)).await);

    // Shutdown is not blocked by the pending retry either
    orchestrator.shutdown();
    let result = timeout(Duration::from_secs(5), worker).await;
    assert!(result.is_ok(), "Orchestrator should stop after shutdown");
}

#[tokio::test]
async fn test_batch_with_pending_retry_is_acknowledged_once_it_runs() {
    let (harness, _channel_source) = harness(3, Duration::from_millis(10));
    let retry = TaskEnvelope::new(Task::index_firm(FirmId(1))).next_attempt(Duration::from_millis(200));
    let (source, acks) = ScriptedSource::with_envelopes(vec![
        retry,
        TaskEnvelope::new(Task::index_firm(FirmId(2))),
    ]);
    let orchestrator = Orchestrator::new(
        Arc::new(source),
        harness.runner.clone(),
        harness.queue.clone(),
        harness.config.clone(),
    );

    let started = tokio::time::Instant::now();
    let result = timeout(Duration::from_secs(5), orchestrator.run()).await;

    assert!(result.is_ok(), "Orchestrator should finish when the stream ends");
    assert!(started.elapsed() >= Duration::from_millis(150));
    assert_eq!(*acks.lock().unwrap(), vec![true]);
    assert_eq!(orchestrator.stats().snapshot().tasks_completed, 2);
}

#[tokio::test]
async fn test_orchestrator_shutdown() {
    let (harness, source) = harness(3, Duration::from_millis(10));
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(source),
        harness.runner.clone(),
        harness.queue.clone(),
        harness.config.clone(),
    ));
    let worker = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.run().await })
    };

    // Let the source subscribe to the shutdown channel
    sleep(Duration::from_millis(50)).await;
    orchestrator.shutdown();

    let result = timeout(Duration::from_secs(5), worker).await;
    assert!(result.is_ok(), "Orchestrator should stop after shutdown");
}
