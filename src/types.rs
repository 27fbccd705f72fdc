use crate::error::ErrorKind;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// RAW SHAPES (output of the record mapper, discarded after normalization)
// ============================================================================

/// One business entity as pulled out of the registry extract.
/// Date fields hold `YYYY-MM-DD` strings (or empty) produced by the shared date utility.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEntityRecord {
    pub abn: String,
    pub abn_status: String,
    pub entity_type: String,
    pub entity_name: String,
    pub trading_name: Option<String>,
    pub gst_status: String,
    pub gst_registration_date: String,
    pub registration_date: String,
    pub last_updated_date: String,
    pub business_names: Vec<RawBusinessName>,
    pub address: Option<RawAddress>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBusinessName {
    pub name_type: String,
    pub organisation_name: String,
    pub effective_from: String,
    pub effective_to: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawAddress {
    pub address_type: String,
    pub state_code: Option<String>,
    pub postcode: Option<String>,
    pub country_code: Option<String>,
    pub effective_from: String,
    pub effective_to: Option<String>,
}

// ============================================================================
// CLOSED ENUMS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbnStatus {
    Active,
    Cancelled,
    Unknown,
}

impl AbnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbnStatus::Active => "Active",
            AbnStatus::Cancelled => "Cancelled",
            AbnStatus::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GstStatus {
    Active,
    Inactive,
    Unknown,
}

impl GstStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GstStatus::Active => "Active",
            GstStatus::Inactive => "Inactive",
            GstStatus::Unknown => "Unknown",
        }
    }
}

/// Legal structure of the entity. Unrecognised registry codes land in `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Individual,
    #[serde(rename = "Private Company")]
    PrivateCompany,
    #[serde(rename = "Public Company")]
    PublicCompany,
    Partnership,
    Trust,
    #[serde(rename = "Superannuation Fund")]
    SuperannuationFund,
    Other,
}

impl EntityType {
    /// Registry abbreviation lookup. The table is closed.
    pub fn from_code(code: &str) -> Self {
        match code {
            "IND" => EntityType::Individual,
            "PRV" => EntityType::PrivateCompany,
            "PUB" => EntityType::PublicCompany,
            "PTR" => EntityType::Partnership,
            "TRT" => EntityType::Trust,
            "SUP" => EntityType::SuperannuationFund,
            "GOV" | "NPF" | "OTH" => EntityType::Other,
            _ => EntityType::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntityType::Individual => "Individual",
            EntityType::PrivateCompany => "Private Company",
            EntityType::PublicCompany => "Public Company",
            EntityType::Partnership => "Partnership",
            EntityType::Trust => "Trust",
            EntityType::SuperannuationFund => "Superannuation Fund",
            EntityType::Other => "Other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BusinessNameType {
    #[serde(rename = "MN")]
    MainName,
    #[serde(rename = "TRD")]
    TradingName,
    #[serde(rename = "BN")]
    BusinessName,
    #[serde(rename = "OTN")]
    OtherName,
}

impl BusinessNameType {
    /// Anything unrecognised is bucketed as `OTN`, never dropped.
    pub fn from_raw(value: &str) -> Self {
        match value.trim() {
            "MN" | "Main Name" => BusinessNameType::MainName,
            "TRD" | "Trading Name" => BusinessNameType::TradingName,
            "BN" | "Business Name" => BusinessNameType::BusinessName,
            _ => BusinessNameType::OtherName,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            BusinessNameType::MainName => "MN",
            BusinessNameType::TradingName => "TRD",
            BusinessNameType::BusinessName => "BN",
            BusinessNameType::OtherName => "OTN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddressType {
    MainPhysical,
    MainPostal,
    Other,
}

impl AddressType {
    pub fn from_label(label: &str) -> Self {
        match label {
            "Main Business Physical Address" | "Physical Address" => AddressType::MainPhysical,
            "Main Business Postal Address" | "Postal Address" => AddressType::MainPostal,
            _ => AddressType::Other,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AddressType::MainPhysical => "MAIN_PHYSICAL",
            AddressType::MainPostal => "MAIN_POSTAL",
            AddressType::Other => "OTHER",
        }
    }
}

// ============================================================================
// NORMALIZED SHAPES (persisted)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessLocation {
    pub state: Option<String>,
    pub postcode: Option<String>,
    pub country: String,
    pub address_type: String,
}

/// The persisted unit, keyed by `abn`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedCompany {
    pub abn: String,
    pub abn_status: AbnStatus,
    pub entity_type: EntityType,
    pub entity_name: String,
    pub trading_name: Option<String>,
    pub registration_date: Option<NaiveDate>,
    pub gst_registration_date: Option<NaiveDate>,
    pub last_updated_date: Option<NaiveDate>,
    pub gst_status: GstStatus,
    pub main_business_location: Option<BusinessLocation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBusinessName {
    /// Back-reference to the parent company
    pub company_abn: String,
    pub name_type: BusinessNameType,
    pub organisation_name: String,
    pub effective_from: Option<NaiveDate>,
    pub effective_to: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedAddress {
    /// Back-reference to the parent company
    pub company_abn: String,
    pub address_type: AddressType,
    pub state_code: Option<String>,
    pub postcode: Option<String>,
    pub country_code: String,
    pub effective_from: Option<NaiveDate>,
    pub effective_to: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

/// A company together with its child rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEntity {
    pub company: NormalizedCompany,
    pub business_names: Vec<NormalizedBusinessName>,
    pub addresses: Vec<NormalizedAddress>,
}

// ============================================================================
// OUTCOMES
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// One record- or file-level failure, kept for the run report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingError {
    pub kind: ErrorKind,
    pub message: String,
    /// Best-effort excerpt of the offending source fragment
    pub fragment: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ProcessingError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            fragment: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_type_table() {
        assert_eq!(EntityType::from_code("IND"), EntityType::Individual);
        assert_eq!(EntityType::from_code("PRV"), EntityType::PrivateCompany);
        assert_eq!(EntityType::from_code("PUB"), EntityType::PublicCompany);
        assert_eq!(EntityType::from_code("PTR"), EntityType::Partnership);
        assert_eq!(EntityType::from_code("TRT"), EntityType::Trust);
        assert_eq!(EntityType::from_code("SUP"), EntityType::SuperannuationFund);
        for code in ["GOV", "NPF", "OTH", "DIT", ""] {
            assert_eq!(EntityType::from_code(code), EntityType::Other);
        }
    }

    #[test]
    fn test_unknown_name_and_address_types_are_bucketed() {
        assert_eq!(BusinessNameType::from_raw("TRD"), BusinessNameType::TradingName);
        assert_eq!(BusinessNameType::from_raw("DGR"), BusinessNameType::OtherName);
        assert_eq!(AddressType::from_label("Postal Address"), AddressType::MainPostal);
        assert_eq!(AddressType::from_label("Registered Office"), AddressType::Other);
    }

    #[test]
    fn test_enum_serialization_uses_storage_labels() {
        let json = serde_json::to_string(&EntityType::PrivateCompany).unwrap();
        assert_eq!(json, "\"Private Company\"");
        let json = serde_json::to_string(&AddressType::MainPhysical).unwrap();
        assert_eq!(json, "\"MAIN_PHYSICAL\"");
        let json = serde_json::to_string(&BusinessNameType::OtherName).unwrap();
        assert_eq!(json, "\"OTN\"");
    }
}
