use crate::common::dates::registry_date_to_iso;
use crate::constants::{
    DEFAULT_COUNTRY_CODE, MAIN_NAME_CODE, MAIN_PHYSICAL_ADDRESS, MAIN_POSTAL_ADDRESS,
    OTHER_NAME_CODE, TRADING_NAME_CODE,
};
use crate::error::Result;
use crate::pipeline::processing::parser::extract::list_of;
use crate::pipeline::processing::parser::XmlValue;
use crate::types::{AddressType, RawAddress, RawBusinessName, RawEntityRecord};
use tracing::trace;

/// Maps one `<ABR>` entity node onto a [`RawEntityRecord`].
///
/// Returns `Ok(None)` for nodes without an identifier or entity name: those are
/// noise in the extract rather than broken entities. `Err` is reserved for nodes
/// that are not element records at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordMapper;

impl RecordMapper {
    pub fn new() -> Self {
        Self
    }

    pub fn map(&self, entity: &XmlValue) -> Result<Option<RawEntityRecord>> {
        entity.as_node()?;

        let abn = extract_abn(entity);
        let entity_name = extract_entity_name(entity);
        if abn.is_empty() || entity_name.is_empty() {
            trace!("Entity node without identifier or name, skipping");
            return Ok(None);
        }

        let registration_date = registry_date_to_iso(&entity.string_at(&["ABN", "ABNStatusFromDate"]));

        Ok(Some(RawEntityRecord {
            abn,
            abn_status: extract_abn_status(entity),
            entity_type: entity.string_at(&["EntityType", "EntityTypeInd"]),
            trading_name: extract_trading_name(entity),
            gst_status: extract_gst_status(entity),
            gst_registration_date: registry_date_to_iso(
                &entity.string_at(&["GST", "GSTStatusFromDate"]),
            ),
            last_updated_date: registry_date_to_iso(&entity.string_at(&["recordLastUpdatedDate"])),
            business_names: extract_business_names(entity, &entity_name, &registration_date),
            address: extract_address(entity, &registration_date),
            registration_date,
            entity_name,
        }))
    }
}

/// Companies carry `MainEntity`; sole traders carry `LegalEntity`.
fn primary_entity(entity: &XmlValue) -> Option<&XmlValue> {
    entity.get("MainEntity").or_else(|| entity.get("LegalEntity"))
}

fn extract_abn(entity: &XmlValue) -> String {
    entity.string_at(&["ABN"])
}

/// `ACT`/`CAN` collapse to `A`/`C`; any other code is passed through for the normalizer.
fn extract_abn_status(entity: &XmlValue) -> String {
    let status = entity.string_at(&["ABN", "status"]);
    match status.to_uppercase().as_str() {
        "ACT" => "A".to_string(),
        "CAN" => "C".to_string(),
        _ => status,
    }
}

fn extract_gst_status(entity: &XmlValue) -> String {
    let status = entity.string_at(&["GST", "status"]);
    match status.to_uppercase().as_str() {
        "ACT" => "ACTIVE".to_string(),
        "CAN" | "NON" => "INACTIVE".to_string(),
        _ => status,
    }
}

/// Organisation name text, falling back to an individual's given and family names.
fn extract_entity_name(entity: &XmlValue) -> String {
    let Some(primary) = primary_entity(entity) else {
        return String::new();
    };

    if let Some(name) = organisation_name(primary.get("NonIndividualName")) {
        return name.to_string();
    }

    primary
        .get("IndividualName")
        .map(individual_name)
        .unwrap_or_default()
}

/// `<NonIndividualName><NonIndividualNameText>..` or a bare text node.
fn organisation_name(name: Option<&XmlValue>) -> Option<&str> {
    let name = name?;
    name.text_at(&["NonIndividualNameText"]).or_else(|| name.text())
}

fn individual_name(name: &XmlValue) -> String {
    let mut parts: Vec<&str> = list_of(name.get("GivenName"))
        .into_iter()
        .filter_map(XmlValue::text)
        .collect();
    if let Some(family) = name.text_at(&["FamilyName"]) {
        parts.push(family);
    }
    parts.join(" ")
}

fn other_entity_names(entity: &XmlValue) -> impl Iterator<Item = &XmlValue> {
    list_of(entity.get("OtherEntity"))
        .into_iter()
        .filter_map(|other| other.get("NonIndividualName"))
}

fn extract_trading_name(entity: &XmlValue) -> Option<String> {
    other_entity_names(entity)
        .find(|name| name.text_at(&["type"]) == Some(TRADING_NAME_CODE))
        .and_then(|name| organisation_name(Some(name)))
        .map(str::to_string)
}

/// Primary name first, then every other-entity name in document order.
fn extract_business_names(
    entity: &XmlValue,
    entity_name: &str,
    effective_from: &str,
) -> Vec<RawBusinessName> {
    let mut names = vec![RawBusinessName {
        name_type: MAIN_NAME_CODE.to_string(),
        organisation_name: entity_name.to_string(),
        effective_from: effective_from.to_string(),
        effective_to: None,
    }];

    for name in other_entity_names(entity) {
        let Some(text) = organisation_name(Some(name)) else {
            continue;
        };
        names.push(RawBusinessName {
            name_type: name.text_at(&["type"]).unwrap_or(OTHER_NAME_CODE).to_string(),
            organisation_name: text.to_string(),
            effective_from: effective_from.to_string(),
            effective_to: None,
        });
    }

    names
}

fn address_from(details: &XmlValue, label: &str, effective_from: &str) -> RawAddress {
    RawAddress {
        address_type: label.to_string(),
        state_code: details.text_at(&["State"]).map(str::to_string),
        postcode: details.text_at(&["Postcode"]).map(str::to_string),
        country_code: Some(DEFAULT_COUNTRY_CODE.to_string()),
        effective_from: effective_from.to_string(),
        effective_to: None,
    }
}

/// Collects business/postal address candidates and keeps the representative one.
fn extract_address(entity: &XmlValue, effective_from: &str) -> Option<RawAddress> {
    let primary = primary_entity(entity)?;
    let business = primary.path(&["BusinessAddress", "AddressDetails"]);
    let postal = primary.path(&["PostalAddress", "AddressDetails"]);

    let mut candidates = Vec::new();
    if let Some(details) = business {
        candidates.push(address_from(details, MAIN_PHYSICAL_ADDRESS, effective_from));
    }
    if let Some(details) = postal {
        if business != Some(details) {
            candidates.push(address_from(details, MAIN_POSTAL_ADDRESS, effective_from));
        }
    }

    select_representative_address(&candidates).cloned()
}

/// Main physical, then main postal, then whatever comes first.
pub fn select_representative_address(addresses: &[RawAddress]) -> Option<&RawAddress> {
    let of_type = |wanted: AddressType| {
        addresses
            .iter()
            .find(|a| AddressType::from_label(&a.address_type) == wanted)
    };
    of_type(AddressType::MainPhysical)
        .or_else(|| of_type(AddressType::MainPostal))
        .or_else(|| addresses.first())
}
