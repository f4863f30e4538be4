//! Builds the search document for a firm.
//!
//! Transforms a loaded [`FirmGraph`] into the [`FirmDocument`] stored in the
//! index. The projection is pure: it reads nothing beyond the graph and
//! writes nothing.

use std::collections::BTreeSet;

use firm_indexer_shared::{
    advice_percentage, Adviser, AdviserSummary, FirmDocument, FirmGraph, Location, Office,
    OfficeSummary,
};

/// Build the index document for a firm.
///
/// The address comes from the main office; a firm without one gets `null`
/// address fields. Only geocoded advisers are listed.
pub fn build_document(graph: &FirmGraph) -> FirmDocument {
    let firm = &graph.firm;
    let main_office = graph.main_office();
    let advice = &firm.advice_types;

    FirmDocument {
        id: firm.id,
        registered_name: firm.registered_name.clone(),
        postcode_searchable: graph.in_person_advice(),
        address_line_one: main_office.map(|o| o.address_line_one.clone()),
        address_line_two: main_office.and_then(|o| o.address_line_two.clone()),
        address_town: main_office.map(|o| o.address_town.clone()),
        address_county: main_office.and_then(|o| o.address_county.clone()),
        address_postcode: main_office.map(|o| o.address_postcode.clone()),
        telephone_number: firm.normalized_telephone(),
        website_address: firm.website_address.clone(),
        email_address: firm.email_address.clone(),
        free_initial_meeting: firm.free_initial_meeting,
        minimum_fixed_fee: firm.minimum_fixed_fee,
        retirement_income_products: advice_percentage(advice.retirement_income_products),
        pension_transfer: advice_percentage(advice.pension_transfer),
        options_when_paying_for_care: advice_percentage(advice.long_term_care),
        equity_release: advice_percentage(advice.equity_release),
        inheritance_tax_planning: advice_percentage(advice.inheritance_tax_and_estate_planning),
        wills_and_probate: advice_percentage(advice.wills_and_probate),
        ethical_investing: firm.ethical_investing,
        sharia_investing: firm.sharia_investing,
        languages: firm.languages.clone(),
        in_person_advice_methods: graph.reference.in_person_advice_methods.clone(),
        other_advice_methods: graph.reference.other_advice_methods.clone(),
        investment_sizes: graph.reference.investment_sizes.clone(),
        initial_advice_fee_structures: graph.reference.initial_advice_fee_structures.clone(),
        ongoing_advice_fee_structures: graph.reference.ongoing_advice_fee_structures.clone(),
        allowed_payment_methods: graph.reference.allowed_payment_methods.clone(),
        adviser_qualification_ids: union_ids(&graph.advisers, |a| &a.qualification_ids),
        adviser_accreditation_ids: union_ids(&graph.advisers, |a| &a.accreditation_ids),
        offices: graph.offices().iter().map(office_summary).collect(),
        advisers: graph.geocoded_advisers().filter_map(adviser_summary).collect(),
    }
}

/// Sorted, de-duplicated ids across every adviser of the firm.
fn union_ids(advisers: &[Adviser], ids: impl Fn(&Adviser) -> &Vec<i64>) -> Vec<i64> {
    advisers
        .iter()
        .flat_map(|adviser| ids(adviser).iter().copied())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn office_summary(office: &Office) -> OfficeSummary {
    OfficeSummary {
        id: office.id,
        address_line_one: office.address_line_one.clone(),
        address_line_two: office.address_line_two.clone(),
        address_town: office.address_town.clone(),
        address_county: office.address_county.clone(),
        address_postcode: office.address_postcode.clone(),
        email_address: office.email_address.clone(),
        telephone_number: office.telephone_without_spaces(),
        website: office.website.clone(),
        disabled_access: office.disabled_access,
    }
}

fn adviser_summary(adviser: &Adviser) -> Option<AdviserSummary> {
    let coordinates = adviser.coordinates?;
    Some(AdviserSummary {
        id: adviser.id,
        name: adviser.name.clone(),
        range: adviser.travel_distance,
        location: Location {
            lat: coordinates.latitude,
            lon: coordinates.longitude,
        },
    })
}
