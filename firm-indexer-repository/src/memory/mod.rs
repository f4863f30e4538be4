//! In-memory implementations of the consumed stores.
//!
//! Used by the integration tests and by local runs with `TASK_QUEUE=memory`.

mod entity_store;
mod index;

pub use entity_store::InMemoryEntityStore;
pub use index::{InMemoryIndex, IndexCall};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::{EntityStore, IndexRepository};
    use chrono::{Duration, Utc};
    use firm_indexer_shared::{
        Adviser, AdviserId, CoordinateTarget, Coordinates, EntityChange, Firm, FirmId, Office,
        OfficeId,
    };

    fn office(id: i64, age_days: i64) -> Office {
        Office::new(
            OfficeId(id),
            FirmId(1),
            "120 Holborn",
            "London",
            "EC1N 2TD",
            Utc::now() - Duration::days(age_days),
        )
    }

    #[tokio::test]
    async fn test_office_changes_track_main_office() {
        let store = InMemoryEntityStore::new();
        store.save_firm(Firm::new(FirmId(1), "Acme", Utc::now())).await;

        let first = store.save_office(office(1, 5)).await;
        assert!(matches!(
            first,
            EntityChange::OfficeSaved {
                is_main_office: true,
                was_main_office: false,
                address_changed: true,
                ..
            }
        ));

        let second = store.save_office(office(2, 1)).await;
        assert!(matches!(
            second,
            EntityChange::OfficeSaved {
                is_main_office: false,
                was_main_office: false,
                ..
            }
        ));

        let destroyed = store.destroy_office(OfficeId(1)).await.unwrap();
        assert_eq!(
            destroyed,
            EntityChange::OfficeDestroyed {
                office_id: OfficeId(1),
                firm_id: FirmId(1),
                was_main_office: true,
            }
        );

        let graph = store.load_firm(FirmId(1)).await.unwrap().unwrap();
        assert_eq!(graph.main_office().map(|o| o.id), Some(OfficeId(2)));
    }

    #[tokio::test]
    async fn test_update_coordinates_produces_no_change_and_survives_saves() {
        let store = InMemoryEntityStore::new();
        let adviser = Adviser::new(AdviserId(4), FirmId(1), "ABC12345", "Ada", "EC1N 2TD", 25);
        store.save_adviser(adviser.clone()).await;

        store
            .update_coordinates(
                CoordinateTarget::Adviser(AdviserId(4)),
                Some(Coordinates::new(51.5180697, -0.1085203)),
            )
            .await
            .unwrap();
        assert_eq!(store.coordinate_writes(), 1);

        let change = store.save_adviser(adviser).await;
        assert!(matches!(
            change,
            EntityChange::AdviserSaved {
                address_changed: false,
                ..
            }
        ));

        let loaded = store.load_adviser(AdviserId(4)).await.unwrap().unwrap();
        assert_eq!(loaded.coordinates, Some(Coordinates::new(51.51807, -0.10852)));
    }

    #[tokio::test]
    async fn test_new_postcode_clears_adviser_coordinates() {
        let store = InMemoryEntityStore::new();
        let adviser = Adviser::new(AdviserId(4), FirmId(1), "ABC12345", "Ada", "EC1N 2TD", 25);
        store.save_adviser(adviser.clone()).await;
        store
            .update_coordinates(
                CoordinateTarget::Adviser(AdviserId(4)),
                Some(Coordinates::new(51.518, -0.108)),
            )
            .await
            .unwrap();

        let mut moved = adviser;
        moved.postcode = "zz9 9zz".to_string();
        let change = store.save_adviser(moved).await;

        assert!(matches!(
            change,
            EntityChange::AdviserSaved {
                address_changed: true,
                was_geocoded: true,
                ..
            }
        ));
        let loaded = store.load_adviser(AdviserId(4)).await.unwrap().unwrap();
        assert_eq!(loaded.postcode, "ZZ9 9ZZ");
        assert_eq!(loaded.coordinates, None);
    }

    #[tokio::test]
    async fn test_moving_main_office_clears_firm_coordinates() {
        let store = InMemoryEntityStore::new();
        store.save_firm(Firm::new(FirmId(1), "Acme", Utc::now())).await;
        store.save_office(office(1, 1)).await;
        store
            .update_coordinates(CoordinateTarget::Firm(FirmId(1)), Some(Coordinates::new(51.5, -0.1)))
            .await
            .unwrap();

        let mut moved = office(1, 1);
        moved.address_postcode = "LS1 5HN".to_string();
        store.save_office(moved).await;

        assert_eq!(store.firm(FirmId(1)).await.unwrap().coordinates, None);
    }

    #[tokio::test]
    async fn test_update_coordinates_on_missing_row() {
        let store = InMemoryEntityStore::new();
        let result = store
            .update_coordinates(CoordinateTarget::Firm(FirmId(9)), None)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_destroy_firm_cascades() {
        let store = InMemoryEntityStore::new();
        store.save_firm(Firm::new(FirmId(1), "Acme", Utc::now())).await;
        store.save_office(office(1, 1)).await;

        assert_eq!(
            store.destroy_firm(FirmId(1)).await,
            Some(EntityChange::FirmDestroyed { firm_id: FirmId(1) })
        );
        assert!(store.load_firm(FirmId(1)).await.unwrap().is_none());
        assert!(store.destroy_firm(FirmId(1)).await.is_none());
        assert!(store.firm_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_index_records_calls_and_fails_on_demand() {
        let index = InMemoryIndex::new();
        index.delete(FirmId(1)).await.unwrap();
        assert_eq!(index.calls().await, vec![IndexCall::Delete(FirmId(1))]);

        index.set_failing(true);
        assert!(index.delete(FirmId(1)).await.is_err());
        assert_eq!(index.calls().await.len(), 1);
    }
}
