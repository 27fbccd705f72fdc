use super::traits::Storage;
use crate::error::{IngestError, Result};
use crate::types::{
    AddressType, BusinessNameType, NormalizedAddress, NormalizedBusinessName, NormalizedCompany,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

type NameKey = (String, BusinessNameType, String);
type AddressKey = (String, AddressType);

/// In-memory storage for dry runs and tests.
///
/// Besides the upserted rows it remembers the ABNs of every company batch it was
/// handed, so callers can check batch sizes and ordering.
pub struct InMemoryStorage {
    companies: Arc<Mutex<HashMap<String, NormalizedCompany>>>,
    business_names: Arc<Mutex<HashMap<NameKey, NormalizedBusinessName>>>,
    addresses: Arc<Mutex<HashMap<AddressKey, NormalizedAddress>>>,
    company_batches: Arc<Mutex<Vec<Vec<String>>>>,
    reject_batch: Option<usize>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            companies: Arc::new(Mutex::new(HashMap::new())),
            business_names: Arc::new(Mutex::new(HashMap::new())),
            addresses: Arc::new(Mutex::new(HashMap::new())),
            company_batches: Arc::new(Mutex::new(Vec::new())),
            reject_batch: None,
        }
    }

    /// Storage that accepts company batches until the zero-based `batch`, which it rejects.
    pub fn rejecting_batch(batch: usize) -> Self {
        Self {
            reject_batch: Some(batch),
            ..Self::new()
        }
    }

    pub fn company(&self, abn: &str) -> Option<NormalizedCompany> {
        lock(&self.companies).ok()?.get(abn).cloned()
    }

    pub fn company_count(&self) -> usize {
        lock(&self.companies).map(|c| c.len()).unwrap_or(0)
    }

    pub fn business_name_count(&self) -> usize {
        lock(&self.business_names).map(|n| n.len()).unwrap_or(0)
    }

    pub fn address_count(&self) -> usize {
        lock(&self.addresses).map(|a| a.len()).unwrap_or(0)
    }

    /// ABNs of each accepted company batch, in upload order.
    pub fn company_batches(&self) -> Vec<Vec<String>> {
        lock(&self.company_batches).map(|b| b.clone()).unwrap_or_default()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.company_batches().iter().map(Vec::len).collect()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|e| IngestError::Persistence {
        batch: 0,
        message: format!("in-memory store poisoned: {}", e),
    })
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn upsert_companies(&self, companies: &[NormalizedCompany]) -> Result<()> {
        let mut batches = lock(&self.company_batches)?;
        let batch = batches.len();
        if self.reject_batch == Some(batch) {
            return Err(IngestError::Persistence {
                batch,
                message: "batch rejected by storage".to_string(),
            });
        }

        let mut stored = lock(&self.companies)?;
        for company in companies {
            let mut row = company.clone();
            if let Some(existing) = stored.get(&company.abn) {
                row.created_at = existing.created_at;
            }
            stored.insert(row.abn.clone(), row);
        }
        batches.push(companies.iter().map(|c| c.abn.clone()).collect());

        debug!("Upserted {} companies (batch {})", companies.len(), batch);
        Ok(())
    }

    async fn upsert_business_names(&self, names: &[NormalizedBusinessName]) -> Result<()> {
        let mut stored = lock(&self.business_names)?;
        for name in names {
            let key = (
                name.company_abn.clone(),
                name.name_type,
                name.organisation_name.clone(),
            );
            stored.insert(key, name.clone());
        }
        debug!("Upserted {} business names", names.len());
        Ok(())
    }

    async fn upsert_addresses(&self, addresses: &[NormalizedAddress]) -> Result<()> {
        let mut stored = lock(&self.addresses)?;
        for address in addresses {
            stored.insert((address.company_abn.clone(), address.address_type), address.clone());
        }
        debug!("Upserted {} addresses", addresses.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AbnStatus, EntityType, GstStatus};
    use chrono::{Duration, Utc};

    fn company(abn: &str) -> NormalizedCompany {
        NormalizedCompany {
            abn: abn.to_string(),
            abn_status: AbnStatus::Active,
            entity_type: EntityType::Trust,
            entity_name: "THE SMITH FAMILY TRUST".to_string(),
            trading_name: None,
            registration_date: None,
            gst_registration_date: None,
            last_updated_date: None,
            gst_status: GstStatus::Inactive,
            main_business_location: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_reupsert_keeps_created_at_and_refreshes_updated_at() {
        let storage = InMemoryStorage::new();
        let first = company("51824753556");
        storage.upsert_companies(&[first.clone()]).await.unwrap();

        let mut second = company("51824753556");
        second.created_at = first.created_at + Duration::seconds(60);
        second.updated_at = first.updated_at + Duration::seconds(60);
        storage.upsert_companies(&[second.clone()]).await.unwrap();

        assert_eq!(storage.company_count(), 1);
        let stored = storage.company("51824753556").unwrap();
        assert_eq!(stored.created_at, first.created_at);
        assert_eq!(stored.updated_at, second.updated_at);
        assert_eq!(storage.batch_sizes(), vec![1, 1]);
    }

    #[tokio::test]
    async fn test_names_keyed_by_type_and_text() {
        let storage = InMemoryStorage::new();
        let name = |name_type, text: &str| NormalizedBusinessName {
            company_abn: "51824753556".to_string(),
            name_type,
            organisation_name: text.to_string(),
            effective_from: None,
            effective_to: None,
            created_at: Utc::now(),
        };
        let names = vec![
            name(BusinessNameType::MainName, "ACME"),
            name(BusinessNameType::TradingName, "ACME"),
            name(BusinessNameType::TradingName, "ACME"),
        ];
        storage.upsert_business_names(&names).await.unwrap();
        assert_eq!(storage.business_name_count(), 2);
    }

    #[tokio::test]
    async fn test_rejecting_batch() {
        let storage = InMemoryStorage::rejecting_batch(1);
        storage.upsert_companies(&[company("51824753556")]).await.unwrap();
        let err = storage.upsert_companies(&[company("51824753556")]).await.unwrap_err();
        assert!(matches!(err, IngestError::Persistence { batch: 1, .. }));
    }
}
