use crate::constants::{ABN_LENGTH, MAX_TEXT_LENGTH};
use crate::pipeline::processing::normalize::abn::is_valid_abn;
use crate::types::{NormalizedCompany, ValidationResult};

/// Trait for judging whether a normalized company may be persisted
pub trait QualityGate: Send + Sync {
    fn validate(&self, company: &NormalizedCompany) -> ValidationResult;
}

/// Blocking rules: well-formed, checksum-valid ABN and a non-empty entity name.
/// Over-long names only warn since cleaning has already truncated them.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultQualityGate;

impl DefaultQualityGate {
    pub fn new() -> Self {
        Self
    }

    fn check_abn(&self, abn: &str, errors: &mut Vec<String>) {
        if abn.len() != ABN_LENGTH || !abn.bytes().all(|b| b.is_ascii_digit()) {
            errors.push("Invalid ABN: must be 11 digits".to_string());
        } else if !is_valid_abn(abn) {
            errors.push("ABN fails checksum validation".to_string());
        }
    }

    fn check_lengths(&self, company: &NormalizedCompany, warnings: &mut Vec<String>) {
        if company.entity_name.chars().count() > MAX_TEXT_LENGTH {
            warnings.push(format!("Entity name exceeds {} characters", MAX_TEXT_LENGTH));
        }
        if let Some(trading) = &company.trading_name {
            if trading.chars().count() > MAX_TEXT_LENGTH {
                warnings.push(format!("Trading name exceeds {} characters", MAX_TEXT_LENGTH));
            }
        }
    }
}

impl QualityGate for DefaultQualityGate {
    fn validate(&self, company: &NormalizedCompany) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        self.check_abn(&company.abn, &mut errors);
        if company.entity_name.trim().is_empty() {
            errors.push("Entity name is required".to_string());
        }
        // entity_type is non-optional; unknown codes already resolved to Other
        self.check_lengths(company, &mut warnings);

        ValidationResult {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AbnStatus, EntityType, GstStatus};
    use chrono::Utc;

    fn company(abn: &str, name: &str) -> NormalizedCompany {
        NormalizedCompany {
            abn: abn.to_string(),
            abn_status: AbnStatus::Active,
            entity_type: EntityType::PrivateCompany,
            entity_name: name.to_string(),
            trading_name: None,
            registration_date: None,
            gst_registration_date: None,
            last_updated_date: None,
            gst_status: GstStatus::Unknown,
            main_business_location: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_valid_company_passes() {
        let result = DefaultQualityGate::new().validate(&company("51824753556", "ACME PTY LTD"));
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_checksum_failure_blocks() {
        let result = DefaultQualityGate::new().validate(&company("51824753557", "ACME PTY LTD"));
        assert!(!result.is_valid);
        assert_eq!(result.errors, vec!["ABN fails checksum validation".to_string()]);
    }

    #[test]
    fn test_short_abn_and_missing_name_both_reported() {
        let result = DefaultQualityGate::new().validate(&company("1234", ""));
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].contains("11 digits"));
        assert_eq!(result.errors[1], "Entity name is required");
    }

    #[test]
    fn test_long_names_only_warn() {
        let mut c = company("51824753556", &"N".repeat(201));
        c.trading_name = Some("T".repeat(250));
        let result = DefaultQualityGate::new().validate(&c);
        assert!(result.is_valid);
        assert_eq!(result.warnings.len(), 2);
    }
}
