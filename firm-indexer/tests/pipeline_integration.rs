//! End-to-end tests for the geocode-then-index pipeline.
//!
//! Writers record changes on commit scopes; queued tasks are drained from the
//! in-process queue and run through the real task runner against the
//! in-memory store, the in-memory index and the mock geocoder.

use std::sync::Arc;

use chrono::{Duration, Utc};
use firm_indexer::config::{IndexPolicy, PipelineConfig};
use firm_indexer::errors::TaskError;
use firm_indexer::notifier::{ChangeNotifier, CommitState};
use firm_indexer::queue::{ChannelTaskQueue, ChannelTaskSource, Task};
use firm_indexer::tasks::{PipelineStats, TaskRunner};
use firm_indexer_repository::{EntityStore, InMemoryEntityStore, InMemoryIndex, IndexCall};
use firm_indexer_shared::{
    Adviser, AdviserId, Coordinates, EntityChange, Firm, FirmId, Office, OfficeId, ReferenceData,
};
use geocoder::MockGeocoder;

const HOLBORN: &str = "120 Holborn, EC1N 2TD, United Kingdom";
const LEEDS: &str = "1 Park Row, LS1 5HN, United Kingdom";
const ADVISER_HOLBORN: &str = "EC1N 2TD, United Kingdom";
const ADVISER_LEEDS: &str = "LS1 5HN, United Kingdom";

struct Pipeline {
    store: Arc<InMemoryEntityStore>,
    index: Arc<InMemoryIndex>,
    geocoder: Arc<MockGeocoder>,
    source: ChannelTaskSource,
    notifier: ChangeNotifier,
    runner: TaskRunner,
}

impl Pipeline {
    fn new(policy: IndexPolicy) -> Self {
        let store = Arc::new(InMemoryEntityStore::new());
        let index = Arc::new(InMemoryIndex::new());
        let geocoder = Arc::new(MockGeocoder::new());
        geocoder.register(HOLBORN, Coordinates::new(51.5180697, -0.1085203));
        geocoder.register(LEEDS, Coordinates::new(53.7979, -1.5467));
        geocoder.register(ADVISER_HOLBORN, Coordinates::new(51.518, -0.108));
        geocoder.register(ADVISER_LEEDS, Coordinates::new(53.7979, -1.5467));

        let (queue, source) = ChannelTaskQueue::new();
        let queue = Arc::new(queue);
        let config = PipelineConfig::with_policy(policy);
        let runner = TaskRunner::new(
            store.clone(),
            geocoder.clone(),
            index.clone(),
            queue.clone(),
            &config,
            Arc::new(PipelineStats::new()),
        );

        Self {
            store,
            index,
            geocoder,
            source,
            notifier: ChangeNotifier::new(queue, policy),
            runner,
        }
    }

    /// Run queued tasks, including those they schedule, until the queue is
    /// empty. Returns every task run, in order.
    async fn run_pending(&self) -> Vec<Task> {
        let mut ran = Vec::new();
        loop {
            let batch = self.source.drain_pending();
            if batch.is_empty() {
                return ran;
            }
            for envelope in batch {
                self.runner
                    .run(&envelope.task)
                    .await
                    .unwrap_or_else(|e| panic!("{} failed: {}", envelope.task, e));
                ran.push(envelope.task);
            }
        }
    }

    /// Save a valid firm with a main office at `line_one`/`postcode` in one
    /// transaction.
    async fn onboard_firm(&self, id: i64, line_one: &str, town: &str, postcode: &str) {
        let mut scope = self.notifier.begin();
        scope.record(&self.store.save_firm(valid_firm(id)).await);
        scope.record(
            &self
                .store
                .save_office(Office::new(
                    OfficeId(id * 10),
                    FirmId(id),
                    line_one,
                    town,
                    postcode,
                    Utc::now(),
                ))
                .await,
        );
        scope.mark_committed();
    }

    /// Commit one adviser save and run everything it schedules.
    async fn save_adviser(&self, adviser: Adviser) -> Vec<Task> {
        let mut scope = self.notifier.begin();
        scope.record(&self.store.save_adviser(adviser).await);
        scope.mark_committed();
        self.run_pending().await
    }
}

fn valid_firm(id: i64) -> Firm {
    let mut firm = Firm::new(FirmId(id), "Acme Advice Ltd", Utc::now());
    firm.email_address = Some("advice@acme.example".to_string());
    firm.telephone_number = Some("020 7946 0000".to_string());
    firm.advice_types.retirement_income_products = true;
    firm
}

fn adviser(firm_id: i64, postcode: &str) -> Adviser {
    Adviser::new(AdviserId(100), FirmId(firm_id), "ABC12345", "Ada Adviser", postcode, 25)
}

fn count(tasks: &[Task], task: Task) -> usize {
    tasks.iter().filter(|t| **t == task).count()
}

#[tokio::test]
async fn test_new_firm_is_geocoded_and_indexed() {
    let pipeline = Pipeline::new(IndexPolicy::Always);
    pipeline.onboard_firm(1, "120 Holborn", "London", "EC1N 2TD").await;

    let ran = pipeline.run_pending().await;

    let firm = pipeline.store.firm(FirmId(1)).await.unwrap();
    assert_eq!(firm.coordinates, Some(Coordinates::new(51.51807, -0.10852)));
    assert_eq!(pipeline.geocoder.lookups(), vec![HOLBORN.to_string()]);
    assert_eq!(count(&ran, Task::geocode_firm(FirmId(1), true)), 1);

    let document = pipeline.index.document(FirmId(1)).await.unwrap();
    assert_eq!(document.registered_name, "Acme Advice Ltd");
    assert_eq!(document.address_postcode.as_deref(), Some("EC1N 2TD"));
    assert_eq!(document.retirement_income_products, 100);
}

#[tokio::test]
async fn test_unknown_address_clears_coordinates_without_reindex() {
    let pipeline = Pipeline::new(IndexPolicy::OnGeocodeSuccess);
    pipeline
        .onboard_firm(1, "1000 Fantasy Ave", "Neverland", "ABC 123")
        .await;

    let ran = pipeline.run_pending().await;

    assert_eq!(pipeline.store.firm(FirmId(1)).await.unwrap().coordinates, None);
    // The office save indexes; the failed geocode adds nothing
    assert_eq!(count(&ran, Task::index_firm(FirmId(1))), 1);
    assert_eq!(pipeline.geocoder.lookup_count(), 1);
}

#[tokio::test]
async fn test_geocoded_adviser_is_nested_in_firm_document() {
    let pipeline = Pipeline::new(IndexPolicy::OnGeocodeSuccess);
    pipeline.onboard_firm(1, "120 Holborn", "London", "EC1N 2TD").await;
    pipeline.run_pending().await;

    let mut scope = pipeline.notifier.begin();
    scope.record(&pipeline.store.save_adviser(adviser(1, "EC1N 2TD")).await);
    scope.mark_committed();
    let ran = pipeline.run_pending().await;

    assert_eq!(
        ran,
        vec![
            Task::geocode_adviser(AdviserId(100), true),
            Task::index_firm(FirmId(1)),
        ]
    );
    let document = pipeline.index.document(FirmId(1)).await.unwrap();
    assert_eq!(document.advisers.len(), 1);
    assert_eq!(document.advisers[0].range, 25);
    assert_eq!(document.advisers[0].location.lat, 51.518);
}

#[tokio::test]
async fn test_firm_without_offices_is_removed_from_index() {
    let pipeline = Pipeline::new(IndexPolicy::Always);

    let mut scope = pipeline.notifier.begin();
    scope.record(&pipeline.store.save_firm(valid_firm(1)).await);
    scope.mark_committed();
    pipeline.run_pending().await;

    let calls = pipeline.index.calls().await;
    assert!(!calls.is_empty());
    assert!(calls.iter().all(|call| *call == IndexCall::Delete(FirmId(1))));
    assert!(!pipeline.index.contains(FirmId(1)).await);
}

#[tokio::test]
async fn test_removing_last_office_unpublishes_firm() {
    let pipeline = Pipeline::new(IndexPolicy::Always);
    pipeline.onboard_firm(1, "120 Holborn", "London", "EC1N 2TD").await;
    pipeline.run_pending().await;
    assert!(pipeline.index.contains(FirmId(1)).await);

    let mut scope = pipeline.notifier.begin();
    scope.record(&pipeline.store.destroy_office(OfficeId(10)).await.unwrap());
    scope.mark_committed();
    pipeline.run_pending().await;

    assert!(!pipeline.index.contains(FirmId(1)).await);
    assert_eq!(pipeline.store.firm(FirmId(1)).await.unwrap().coordinates, None);
}

#[tokio::test]
async fn test_new_main_office_regeocodes_firm() {
    let pipeline = Pipeline::new(IndexPolicy::Always);
    pipeline.onboard_firm(1, "120 Holborn", "London", "EC1N 2TD").await;
    pipeline.run_pending().await;

    // An older office becomes the main office
    let mut scope = pipeline.notifier.begin();
    scope.record(
        &pipeline
            .store
            .save_office(Office::new(
                OfficeId(5),
                FirmId(1),
                "1 Park Row",
                "Leeds",
                "LS1 5HN",
                Utc::now() - Duration::days(30),
            ))
            .await,
    );
    scope.mark_committed();
    pipeline.run_pending().await;

    assert_eq!(
        pipeline.store.firm(FirmId(1)).await.unwrap().coordinates,
        Some(Coordinates::new(53.7979, -1.5467))
    );
    let document = pipeline.index.document(FirmId(1)).await.unwrap();
    assert_eq!(document.address_town.as_deref(), Some("Leeds"));
    assert_eq!(document.offices.len(), 2);
}

#[tokio::test]
async fn test_moving_adviser_reindexes_both_firms() {
    let pipeline = Pipeline::new(IndexPolicy::OnGeocodeSuccess);
    pipeline.onboard_firm(1, "120 Holborn", "London", "EC1N 2TD").await;
    pipeline.onboard_firm(2, "1 Park Row", "Leeds", "LS1 5HN").await;
    let mut scope = pipeline.notifier.begin();
    scope.record(&pipeline.store.save_adviser(adviser(1, "EC1N 2TD")).await);
    scope.mark_committed();
    pipeline.run_pending().await;
    assert_eq!(pipeline.index.document(FirmId(1)).await.unwrap().advisers.len(), 1);

    let mut scope = pipeline.notifier.begin();
    scope.record(&pipeline.store.save_adviser(adviser(2, "EC1N 2TD")).await);
    scope.mark_committed();
    let ran = pipeline.run_pending().await;

    assert_eq!(count(&ran, Task::index_firm(FirmId(1))), 1);
    assert!(count(&ran, Task::index_firm(FirmId(2))) >= 1);
    assert!(pipeline.index.document(FirmId(1)).await.unwrap().advisers.is_empty());
    assert_eq!(pipeline.index.document(FirmId(2)).await.unwrap().advisers.len(), 1);
    // Same postcode, coordinates kept
    assert_eq!(pipeline.geocoder.lookup_count(), 3);
}

#[tokio::test]
async fn test_reindexing_is_idempotent() {
    let pipeline = Pipeline::new(IndexPolicy::Always);
    pipeline.onboard_firm(1, "120 Holborn", "London", "EC1N 2TD").await;
    pipeline
        .store
        .set_reference_data(
            FirmId(1),
            ReferenceData {
                in_person_advice_methods: vec![1, 2],
                ..ReferenceData::default()
            },
        )
        .await;
    pipeline.run_pending().await;
    let first = pipeline.index.document_json(FirmId(1)).await.unwrap();

    pipeline.runner.run(&Task::index_firm(FirmId(1))).await.unwrap();
    let second = pipeline.index.document_json(FirmId(1)).await.unwrap();

    assert_eq!(first, second);
    assert!(pipeline.index.document(FirmId(1)).await.unwrap().postcode_searchable);
}

#[tokio::test]
async fn test_rolled_back_transaction_schedules_nothing() {
    let pipeline = Pipeline::new(IndexPolicy::Always);

    let mut scope = pipeline.notifier.begin();
    scope.record(&pipeline.store.save_firm(valid_firm(1)).await);
    let result = scope.commit(async { Err::<(), _>("deadlock detected") }).await;

    assert!(result.is_err());
    assert_eq!(scope.state(), CommitState::RolledBack);
    assert!(pipeline.run_pending().await.is_empty());
    assert_eq!(pipeline.geocoder.lookup_count(), 0);
}

#[tokio::test]
async fn test_repeated_saves_in_one_transaction_are_deduplicated() {
    let pipeline = Pipeline::new(IndexPolicy::Always);

    let mut scope = pipeline.notifier.begin();
    for _ in 0..3 {
        scope.record(&pipeline.store.save_firm(valid_firm(1)).await);
    }
    let report = scope.commit(async { Ok::<(), String>(()) }).await.unwrap();

    assert_eq!(
        report.scheduled,
        vec![
            Task::geocode_firm(FirmId(1), false),
            Task::index_firm(FirmId(1)),
        ]
    );
}

#[tokio::test]
async fn test_provider_outage_clears_coordinates_and_fails_task() {
    let pipeline = Pipeline::new(IndexPolicy::Always);
    pipeline.onboard_firm(1, "120 Holborn", "London", "EC1N 2TD").await;
    pipeline.run_pending().await;
    pipeline.geocoder.fail_with(Some("OVER_QUERY_LIMIT"));

    let result = pipeline
        .runner
        .run(&Task::geocode_firm(FirmId(1), true))
        .await;

    assert!(matches!(result, Err(TaskError::GeocodingError(_))));
    assert_eq!(pipeline.store.firm(FirmId(1)).await.unwrap().coordinates, None);

    // The retry succeeds once the provider recovers
    pipeline.geocoder.fail_with(None);
    pipeline
        .runner
        .run(&Task::geocode_firm(FirmId(1), true))
        .await
        .unwrap();
    assert!(pipeline.store.firm(FirmId(1)).await.unwrap().coordinates.is_some());
}

#[tokio::test]
async fn test_destroyed_firm_is_removed_from_index() {
    let pipeline = Pipeline::new(IndexPolicy::OnGeocodeSuccess);
    pipeline.onboard_firm(1, "120 Holborn", "London", "EC1N 2TD").await;
    pipeline.run_pending().await;
    assert!(pipeline.index.contains(FirmId(1)).await);

    let mut scope = pipeline.notifier.begin();
    scope.record(&pipeline.store.destroy_firm(FirmId(1)).await.unwrap());
    scope.mark_committed();
    let ran = pipeline.run_pending().await;

    assert_eq!(ran, vec![Task::index_firm(FirmId(1))]);
    assert!(pipeline.index.is_empty().await);
}

#[tokio::test]
async fn test_adviser_moving_to_unknown_postcode_leaves_firm_document() {
    for policy in [IndexPolicy::Always, IndexPolicy::OnGeocodeSuccess] {
        let pipeline = Pipeline::new(policy);
        pipeline.onboard_firm(1, "120 Holborn", "London", "EC1N 2TD").await;
        pipeline.run_pending().await;
        pipeline.save_adviser(adviser(1, "EC1N 2TD")).await;
        assert_eq!(pipeline.index.document(FirmId(1)).await.unwrap().advisers.len(), 1);

        let ran = pipeline.save_adviser(adviser(1, "ZZ9 9ZZ")).await;

        assert!(count(&ran, Task::index_firm(FirmId(1))) >= 1, "{policy}");
        let stored = pipeline.store.load_adviser(AdviserId(100)).await.unwrap().unwrap();
        assert_eq!(stored.coordinates, None);
        let document = pipeline.index.document(FirmId(1)).await.unwrap();
        assert!(document.advisers.is_empty(), "{policy}: stale adviser location kept");
    }
}

#[tokio::test]
async fn test_adviser_moving_to_known_postcode_is_relocated() {
    for policy in [IndexPolicy::Always, IndexPolicy::OnGeocodeSuccess] {
        let pipeline = Pipeline::new(policy);
        pipeline.onboard_firm(1, "120 Holborn", "London", "EC1N 2TD").await;
        pipeline.run_pending().await;
        pipeline.save_adviser(adviser(1, "EC1N 2TD")).await;

        pipeline.save_adviser(adviser(1, "LS1 5HN")).await;

        let document = pipeline.index.document(FirmId(1)).await.unwrap();
        assert_eq!(document.advisers.len(), 1, "{policy}");
        assert_eq!(document.advisers[0].location.lat, 53.7979);
        assert_eq!(
            pipeline.geocoder.lookups().last().map(String::as_str),
            Some(ADVISER_LEEDS)
        );
    }
}

#[tokio::test]
async fn test_adviser_location_is_cleared_before_regeocoding() {
    let pipeline = Pipeline::new(IndexPolicy::Always);
    pipeline.onboard_firm(1, "120 Holborn", "London", "EC1N 2TD").await;
    pipeline.run_pending().await;
    pipeline.save_adviser(adviser(1, "EC1N 2TD")).await;

    // Reindex straight after the save, before the geocode task has run
    pipeline.store.save_adviser(adviser(1, "LS1 5HN")).await;
    pipeline.runner.run(&Task::index_firm(FirmId(1))).await.unwrap();

    let document = pipeline.index.document(FirmId(1)).await.unwrap();
    assert!(document.advisers.is_empty());
}

#[tokio::test]
async fn test_firm_edit_is_reindexed_without_new_lookup() {
    let pipeline = Pipeline::new(IndexPolicy::OnGeocodeSuccess);
    pipeline.onboard_firm(1, "120 Holborn", "London", "EC1N 2TD").await;
    pipeline.run_pending().await;

    let mut renamed = valid_firm(1);
    renamed.registered_name = "Acme Wealth Ltd".to_string();
    let mut scope = pipeline.notifier.begin();
    scope.record(&pipeline.store.save_firm(renamed).await);
    scope.mark_committed();
    let ran = pipeline.run_pending().await;

    assert_eq!(
        ran,
        vec![
            Task::geocode_firm(FirmId(1), false),
            Task::index_firm(FirmId(1)),
        ]
    );
    assert_eq!(pipeline.geocoder.lookup_count(), 1);
    let document = pipeline.index.document(FirmId(1)).await.unwrap();
    assert_eq!(document.registered_name, "Acme Wealth Ltd");
    assert!(pipeline.store.firm(FirmId(1)).await.unwrap().coordinates.is_some());
}

#[tokio::test]
async fn test_adviser_change_after_firm_destroyed_is_harmless() {
    let pipeline = Pipeline::new(IndexPolicy::Always);
    pipeline.onboard_firm(1, "120 Holborn", "London", "EC1N 2TD").await;
    pipeline.run_pending().await;

    let mut scope = pipeline.notifier.begin();
    scope.record(&pipeline.store.destroy_firm(FirmId(1)).await.unwrap());
    // The cascade also removed the firm's advisers
    scope.record(&EntityChange::adviser_destroyed(&adviser(1, "EC1N 2TD")));
    scope.mark_committed();
    let ran = pipeline.run_pending().await;

    assert_eq!(ran, vec![Task::index_firm(FirmId(1))]);
    assert!(pipeline.index.is_empty().await);
}
