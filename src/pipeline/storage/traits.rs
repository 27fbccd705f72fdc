use crate::error::Result;
use crate::types::{NormalizedAddress, NormalizedBusinessName, NormalizedCompany};
use async_trait::async_trait;

/// Storage collaborator for normalized registry rows.
///
/// Every operation is an idempotent upsert: replaying the same batch refreshes
/// timestamps but never creates duplicates.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Keyed by `abn`. A re-upsert keeps the first `created_at` and refreshes `updated_at`.
    async fn upsert_companies(&self, companies: &[NormalizedCompany]) -> Result<()>;

    /// Keyed by (`company_abn`, `name_type`, `organisation_name`).
    async fn upsert_business_names(&self, names: &[NormalizedBusinessName]) -> Result<()>;

    /// Keyed by (`company_abn`, `address_type`).
    async fn upsert_addresses(&self, addresses: &[NormalizedAddress]) -> Result<()>;
}
