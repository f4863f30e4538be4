//! PostgreSQL implementation of the entity store.
//!
//! Reads the `firms`, `offices` and `advisers` tables and the join tables
//! linking firms and advisers to their reference data. The only write is the
//! coordinate update, which touches the `latitude` and `longitude` columns of
//! a single row.
//!
//! Schema management belongs to the application that owns these tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use firm_indexer_shared::{
    AdviceTypes, Adviser, AdviserId, CoordinateTarget, Coordinates, Firm, FirmGraph, FirmId,
    Office, OfficeId, ReferenceData,
};
use sqlx::PgPool;
use tracing::debug;

use crate::errors::EntityStoreError;
use crate::interfaces::EntityStore;

#[derive(Debug, sqlx::FromRow)]
struct FirmRow {
    id: i64,
    registered_name: String,
    email_address: Option<String>,
    telephone_number: Option<String>,
    website_address: Option<String>,
    free_initial_meeting: Option<bool>,
    minimum_fixed_fee: Option<i64>,
    retirement_income_products_flag: bool,
    pension_transfer_flag: bool,
    long_term_care_flag: bool,
    equity_release_flag: bool,
    inheritance_tax_and_estate_planning_flag: bool,
    wills_and_probate_flag: bool,
    ethical_investing_flag: bool,
    sharia_investing_flag: bool,
    languages: Vec<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    created_at: DateTime<Utc>,
}

impl From<FirmRow> for Firm {
    fn from(row: FirmRow) -> Self {
        Firm {
            id: FirmId(row.id),
            registered_name: row.registered_name,
            email_address: row.email_address,
            telephone_number: row.telephone_number,
            website_address: row.website_address,
            free_initial_meeting: row.free_initial_meeting,
            minimum_fixed_fee: row.minimum_fixed_fee,
            advice_types: AdviceTypes {
                retirement_income_products: row.retirement_income_products_flag,
                pension_transfer: row.pension_transfer_flag,
                long_term_care: row.long_term_care_flag,
                equity_release: row.equity_release_flag,
                inheritance_tax_and_estate_planning: row.inheritance_tax_and_estate_planning_flag,
                wills_and_probate: row.wills_and_probate_flag,
            },
            ethical_investing: row.ethical_investing_flag,
            sharia_investing: row.sharia_investing_flag,
            languages: row.languages,
            coordinates: Coordinates::from_columns(row.latitude, row.longitude),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OfficeRow {
    id: i64,
    firm_id: i64,
    address_line_one: String,
    address_line_two: Option<String>,
    address_town: String,
    address_county: Option<String>,
    address_postcode: String,
    email_address: Option<String>,
    telephone_number: Option<String>,
    website: Option<String>,
    disabled_access: bool,
    created_at: DateTime<Utc>,
}

impl From<OfficeRow> for Office {
    fn from(row: OfficeRow) -> Self {
        Office {
            id: OfficeId(row.id),
            firm_id: FirmId(row.firm_id),
            address_line_one: row.address_line_one,
            address_line_two: row.address_line_two,
            address_town: row.address_town,
            address_county: row.address_county,
            address_postcode: row.address_postcode,
            email_address: row.email_address,
            telephone_number: row.telephone_number,
            website: row.website,
            disabled_access: row.disabled_access,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AdviserRow {
    id: i64,
    firm_id: i64,
    reference_number: String,
    name: String,
    postcode: String,
    travel_distance: i32,
    latitude: Option<f64>,
    longitude: Option<f64>,
    qualification_ids: Vec<i64>,
    accreditation_ids: Vec<i64>,
}

impl From<AdviserRow> for Adviser {
    fn from(row: AdviserRow) -> Self {
        Adviser {
            id: AdviserId(row.id),
            firm_id: FirmId(row.firm_id),
            reference_number: row.reference_number,
            name: row.name,
            postcode: row.postcode,
            travel_distance: u32::try_from(row.travel_distance).unwrap_or_default(),
            coordinates: Coordinates::from_columns(row.latitude, row.longitude),
            qualification_ids: row.qualification_ids,
            accreditation_ids: row.accreditation_ids,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReferenceRow {
    in_person_advice_methods: Vec<i64>,
    other_advice_methods: Vec<i64>,
    investment_sizes: Vec<i64>,
    initial_advice_fee_structures: Vec<i64>,
    ongoing_advice_fee_structures: Vec<i64>,
    allowed_payment_methods: Vec<i64>,
}

impl From<ReferenceRow> for ReferenceData {
    fn from(row: ReferenceRow) -> Self {
        ReferenceData {
            in_person_advice_methods: row.in_person_advice_methods,
            other_advice_methods: row.other_advice_methods,
            investment_sizes: row.investment_sizes,
            initial_advice_fee_structures: row.initial_advice_fee_structures,
            ongoing_advice_fee_structures: row.ongoing_advice_fee_structures,
            allowed_payment_methods: row.allowed_payment_methods,
        }
    }
}

const SELECT_FIRM: &str = r#"
    SELECT id::bigint, registered_name, email_address, telephone_number, website_address,
           free_initial_meeting, minimum_fixed_fee::bigint,
           retirement_income_products_flag, pension_transfer_flag, long_term_care_flag,
           equity_release_flag, inheritance_tax_and_estate_planning_flag, wills_and_probate_flag,
           ethical_investing_flag, sharia_investing_flag, languages,
           latitude, longitude, created_at
    FROM firms
    WHERE id = $1
"#;

const SELECT_OFFICES: &str = r#"
    SELECT id::bigint, firm_id::bigint, address_line_one, address_line_two, address_town,
           address_county, address_postcode, email_address, telephone_number, website,
           disabled_access, created_at
    FROM offices
    WHERE firm_id = $1
    ORDER BY created_at ASC, id ASC
"#;

const SELECT_ADVISERS: &str = r#"
    SELECT a.id::bigint, a.firm_id::bigint, a.reference_number, a.name, a.postcode,
           a.travel_distance, a.latitude, a.longitude,
           ARRAY(SELECT q.qualification_id::bigint FROM advisers_qualifications q
                 WHERE q.adviser_id = a.id ORDER BY 1) AS qualification_ids,
           ARRAY(SELECT c.accreditation_id::bigint FROM accreditations_advisers c
                 WHERE c.adviser_id = a.id ORDER BY 1) AS accreditation_ids
    FROM advisers a
"#;

const SELECT_REFERENCE: &str = r#"
    SELECT
        ARRAY(SELECT in_person_advice_method_id::bigint FROM firms_in_person_advice_methods
              WHERE firm_id = $1 ORDER BY 1) AS in_person_advice_methods,
        ARRAY(SELECT other_advice_method_id::bigint FROM firms_other_advice_methods
              WHERE firm_id = $1 ORDER BY 1) AS other_advice_methods,
        ARRAY(SELECT investment_size_id::bigint FROM firms_investment_sizes
              WHERE firm_id = $1 ORDER BY 1) AS investment_sizes,
        ARRAY(SELECT initial_advice_fee_structure_id::bigint FROM firms_initial_advice_fee_structures
              WHERE firm_id = $1 ORDER BY 1) AS initial_advice_fee_structures,
        ARRAY(SELECT ongoing_advice_fee_structure_id::bigint FROM firms_ongoing_advice_fee_structures
              WHERE firm_id = $1 ORDER BY 1) AS ongoing_advice_fee_structures,
        ARRAY(SELECT allowed_payment_method_id::bigint FROM allowed_payment_methods_firms
              WHERE firm_id = $1 ORDER BY 1) AS allowed_payment_methods
"#;

/// Entity store over a PostgreSQL connection pool.
pub struct PostgresEntityStore {
    pool: PgPool,
}

impl PostgresEntityStore {
    pub async fn new(pool: PgPool) -> Result<Self, EntityStoreError> {
        Ok(Self { pool })
    }
}

#[async_trait]
impl EntityStore for PostgresEntityStore {
    async fn load_firm(&self, id: FirmId) -> Result<Option<FirmGraph>, EntityStoreError> {
        let Some(firm) = sqlx::query_as::<_, FirmRow>(SELECT_FIRM)
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let offices = sqlx::query_as::<_, OfficeRow>(SELECT_OFFICES)
            .bind(id.get())
            .fetch_all(&self.pool)
            .await?;

        let advisers =
            sqlx::query_as::<_, AdviserRow>(&format!("{SELECT_ADVISERS} WHERE a.firm_id = $1"))
                .bind(id.get())
                .fetch_all(&self.pool)
                .await?;

        let reference = sqlx::query_as::<_, ReferenceRow>(SELECT_REFERENCE)
            .bind(id.get())
            .fetch_one(&self.pool)
            .await?;

        debug!(
            firm_id = %id,
            offices = offices.len(),
            advisers = advisers.len(),
            "Loaded firm graph"
        );

        Ok(Some(FirmGraph::new(
            firm.into(),
            offices.into_iter().map(Office::from).collect(),
            advisers.into_iter().map(Adviser::from).collect(),
            reference.into(),
        )))
    }

    async fn load_adviser(&self, id: AdviserId) -> Result<Option<Adviser>, EntityStoreError> {
        let row = sqlx::query_as::<_, AdviserRow>(&format!("{SELECT_ADVISERS} WHERE a.id = $1"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Adviser::from))
    }

    async fn firm_ids(&self) -> Result<Vec<FirmId>, EntityStoreError> {
        let ids: Vec<i64> = sqlx::query_scalar("SELECT id::bigint FROM firms ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(ids.into_iter().map(FirmId).collect())
    }

    async fn update_coordinates(
        &self,
        target: CoordinateTarget,
        coordinates: Option<Coordinates>,
    ) -> Result<(), EntityStoreError> {
        let (table, id) = match target {
            CoordinateTarget::Firm(id) => ("firms", id.get()),
            CoordinateTarget::Adviser(id) => ("advisers", id.get()),
        };
        let (latitude, longitude) = Coordinates::into_columns(coordinates);

        let result = sqlx::query(&format!(
            "UPDATE {table} SET latitude = $1, longitude = $2 WHERE id = $3"
        ))
        .bind(latitude)
        .bind(longitude)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(EntityStoreError::not_found(target.to_string()));
        }

        debug!(target = %target, ?coordinates, "Updated coordinates");
        Ok(())
    }
}
