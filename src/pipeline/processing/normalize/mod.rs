//! Raw registry records into storage-ready rows.
//!
//! Normalization is pure and never fails: anything that cannot be cleaned becomes a
//! fallback value (`Unknown`, `Other`, `None`) and is judged later by the quality gate.

pub mod abn;
pub mod fields;

use chrono::Utc;
use tracing::trace;

use crate::constants::DEFAULT_COUNTRY_CODE;
use crate::pipeline::processing::mapper::select_representative_address;
use crate::types::{
    AddressType, BusinessLocation, BusinessNameType, NormalizedAddress, NormalizedBusinessName,
    NormalizedCompany, NormalizedEntity, RawAddress, RawBusinessName, RawEntityRecord,
};

use self::abn::clean_abn;
use self::fields::{
    clean_text, normalize_abn_status, normalize_entity_type, normalize_gst_status,
    normalize_postcode, normalize_state_code, parse_date,
};

/// Trait for normalizing mapped records into canonical rows
pub trait Normalizer: Send + Sync {
    fn normalize(&self, record: &RawEntityRecord) -> NormalizedEntity;
}

/// Default normalizer for the ABR bulk extract
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultNormalizer;

impl DefaultNormalizer {
    pub fn new() -> Self {
        Self
    }

    fn normalize_company(&self, record: &RawEntityRecord) -> NormalizedCompany {
        let now = Utc::now();
        let trading_name = record
            .trading_name
            .as_deref()
            .map(clean_text)
            .filter(|name| !name.is_empty());

        NormalizedCompany {
            abn: clean_abn(&record.abn),
            abn_status: normalize_abn_status(&record.abn_status),
            entity_type: normalize_entity_type(&record.entity_type),
            entity_name: clean_text(&record.entity_name),
            trading_name,
            registration_date: parse_date(&record.registration_date),
            gst_registration_date: parse_date(&record.gst_registration_date),
            last_updated_date: parse_date(&record.last_updated_date),
            gst_status: normalize_gst_status(&record.gst_status),
            main_business_location: self.business_location(record.address.as_ref()),
            created_at: now,
            updated_at: now,
        }
    }

    /// The representative address, if the record carries one.
    fn business_location(&self, address: Option<&RawAddress>) -> Option<BusinessLocation> {
        let chosen = select_representative_address(std::slice::from_ref(address?))?;
        Some(BusinessLocation {
            state: normalize_state_code(chosen.state_code.as_deref()),
            postcode: normalize_postcode(chosen.postcode.as_deref()),
            country: country_or_default(chosen.country_code.as_deref()),
            address_type: AddressType::from_label(&chosen.address_type).code().to_string(),
        })
    }

    fn normalize_business_name(&self, abn: &str, name: &RawBusinessName) -> Option<NormalizedBusinessName> {
        let organisation_name = clean_text(&name.organisation_name);
        if organisation_name.is_empty() {
            trace!("dropping business name with no text for {}", abn);
            return None;
        }
        Some(NormalizedBusinessName {
            company_abn: abn.to_string(),
            name_type: BusinessNameType::from_raw(&name.name_type),
            organisation_name,
            effective_from: parse_date(&name.effective_from),
            effective_to: name.effective_to.as_deref().and_then(parse_date),
            created_at: Utc::now(),
        })
    }

    fn normalize_address(&self, abn: &str, address: &RawAddress) -> Option<NormalizedAddress> {
        if address.address_type.trim().is_empty() {
            trace!("dropping address with no type label for {}", abn);
            return None;
        }
        Some(NormalizedAddress {
            company_abn: abn.to_string(),
            address_type: AddressType::from_label(address.address_type.trim()),
            state_code: normalize_state_code(address.state_code.as_deref()),
            postcode: normalize_postcode(address.postcode.as_deref()),
            country_code: country_or_default(address.country_code.as_deref()),
            effective_from: parse_date(&address.effective_from),
            effective_to: address.effective_to.as_deref().and_then(parse_date),
            created_at: Utc::now(),
        })
    }
}

impl Normalizer for DefaultNormalizer {
    fn normalize(&self, record: &RawEntityRecord) -> NormalizedEntity {
        let company = self.normalize_company(record);
        let abn = company.abn.clone();

        let business_names = record
            .business_names
            .iter()
            .filter_map(|name| self.normalize_business_name(&abn, name))
            .collect();
        let addresses = record
            .address
            .iter()
            .filter_map(|address| self.normalize_address(&abn, address))
            .collect();

        NormalizedEntity {
            company,
            business_names,
            addresses,
        }
    }
}

fn country_or_default(country: Option<&str>) -> String {
    country
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_COUNTRY_CODE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AbnStatus, EntityType, GstStatus};
    use chrono::NaiveDate;

    fn raw_record() -> RawEntityRecord {
        RawEntityRecord {
            abn: "51 824 753 556".into(),
            abn_status: "A".into(),
            entity_type: "PRV".into(),
            entity_name: "  ACME   WIDGETS PTY LTD ".into(),
            trading_name: Some("ACME".into()),
            gst_status: "ACTIVE".into(),
            gst_registration_date: "2000-07-01".into(),
            registration_date: "1999-11-01".into(),
            last_updated_date: "2023-06-15".into(),
            business_names: vec![
                RawBusinessName {
                    name_type: "MN".into(),
                    organisation_name: "ACME WIDGETS PTY LTD".into(),
                    effective_from: "1999-11-01".into(),
                    effective_to: None,
                },
                RawBusinessName {
                    name_type: "TRD".into(),
                    organisation_name: "ACME".into(),
                    effective_from: "".into(),
                    effective_to: None,
                },
                RawBusinessName {
                    name_type: "DGR".into(),
                    organisation_name: "   ".into(),
                    effective_from: "".into(),
                    effective_to: None,
                },
            ],
            address: Some(RawAddress {
                address_type: "Main Business Physical Address".into(),
                state_code: Some("new south wales".into()),
                postcode: Some("200".into()),
                country_code: None,
                effective_from: "2001-01-01".into(),
                effective_to: None,
            }),
        }
    }

    #[test]
    fn test_normalize_company_fields() {
        let entity = DefaultNormalizer::new().normalize(&raw_record());
        let company = &entity.company;
        assert_eq!(company.abn, "51824753556");
        assert_eq!(company.abn_status, AbnStatus::Active);
        assert_eq!(company.entity_type, EntityType::PrivateCompany);
        assert_eq!(company.entity_name, "ACME WIDGETS PTY LTD");
        assert_eq!(company.trading_name.as_deref(), Some("ACME"));
        assert_eq!(company.gst_status, GstStatus::Active);
        assert_eq!(company.registration_date, NaiveDate::from_ymd_opt(1999, 11, 1));
        assert_eq!(company.gst_registration_date, NaiveDate::from_ymd_opt(2000, 7, 1));
        assert_eq!(company.last_updated_date, NaiveDate::from_ymd_opt(2023, 6, 15));
    }

    #[test]
    fn test_normalize_location() {
        let entity = DefaultNormalizer::new().normalize(&raw_record());
        let location = entity.company.main_business_location.unwrap();
        assert_eq!(location.state.as_deref(), Some("NSW"));
        assert_eq!(location.postcode.as_deref(), Some("0200"));
        assert_eq!(location.country, "AU");
        assert_eq!(location.address_type, "MAIN_PHYSICAL");
    }

    #[test]
    fn test_children_reference_parent_and_drop_empty_names() {
        let entity = DefaultNormalizer::new().normalize(&raw_record());
        assert_eq!(entity.business_names.len(), 2);
        assert!(entity.business_names.iter().all(|n| n.company_abn == "51824753556"));
        assert_eq!(entity.business_names[0].name_type, BusinessNameType::MainName);
        assert_eq!(entity.business_names[1].name_type, BusinessNameType::TradingName);

        assert_eq!(entity.addresses.len(), 1);
        assert_eq!(entity.addresses[0].address_type, AddressType::MainPhysical);
        assert_eq!(entity.addresses[0].company_abn, "51824753556");
    }

    #[test]
    fn test_unknown_codes_fall_back() {
        let mut raw = raw_record();
        raw.abn_status = "SUSPENDED".into();
        raw.entity_type = "XYZ".into();
        raw.gst_status = String::new();
        raw.business_names[1].name_type = "Something Else".into();
        if let Some(address) = raw.address.as_mut() {
            address.address_type = "Registered Office".into();
        }

        let entity = DefaultNormalizer::new().normalize(&raw);
        assert_eq!(entity.company.abn_status, AbnStatus::Unknown);
        assert_eq!(entity.company.entity_type, EntityType::Other);
        assert_eq!(entity.company.gst_status, GstStatus::Unknown);
        assert_eq!(entity.business_names[1].name_type, BusinessNameType::OtherName);
        assert_eq!(entity.addresses[0].address_type, AddressType::Other);
    }

    #[test]
    fn test_no_address_is_never_fabricated() {
        let mut raw = raw_record();
        raw.address = None;
        let entity = DefaultNormalizer::new().normalize(&raw);
        assert!(entity.company.main_business_location.is_none());
        assert!(entity.addresses.is_empty());
    }

    #[test]
    fn test_blank_trading_name_becomes_none() {
        let mut raw = raw_record();
        raw.trading_name = Some("   ".into());
        let entity = DefaultNormalizer::new().normalize(&raw);
        assert!(entity.company.trading_name.is_none());
    }
}
