use super::traits::Storage;
use crate::constants::{ADDRESSES_TABLE, BUSINESS_NAMES_TABLE, COMPANIES_TABLE};
use crate::error::{IngestError, Result};
use crate::types::{NormalizedAddress, NormalizedBusinessName, NormalizedCompany};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Upserts rows through a PostgREST endpoint (e.g. a Supabase project).
///
/// Conflicts on the natural key are merged server side via
/// `Prefer: resolution=merge-duplicates`, which keeps re-ingestion idempotent.
pub struct RestStorage {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    batches: AtomicUsize,
}

impl RestStorage {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            batches: AtomicUsize::new(0),
        }
    }

    pub fn endpoint(&self, table: &str, on_conflict: &str) -> String {
        format!("{}/rest/v1/{}?on_conflict={}", self.base_url, table, on_conflict)
    }

    async fn post_rows<T: Serialize + Sync>(
        &self,
        table: &str,
        on_conflict: &str,
        rows: &[T],
        batch: usize,
    ) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let endpoint = self.endpoint(table, on_conflict);
        let resp = self
            .client
            .post(&endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("apikey", self.api_key.clone())
            .header("Prefer", "resolution=merge-duplicates")
            .json(rows)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("REST upsert into {} failed: {} - {}", table, status, body);
            return Err(IngestError::Persistence {
                batch,
                message: format!("{} upsert failed: {} - {}", table, status, body),
            });
        }
        debug!("REST: upserted {} rows into {}", rows.len(), table);
        Ok(())
    }
}

/// One row per conflict key, the last occurrence winning, in first-seen order.
/// PostgREST rejects a merge-duplicates payload that repeats a key.
fn dedupe_by_key<T, K, F>(rows: &[T], key: F) -> Vec<&T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut slots: HashMap<K, usize> = HashMap::with_capacity(rows.len());
    let mut kept: Vec<&T> = Vec::with_capacity(rows.len());
    for row in rows {
        match slots.entry(key(row)) {
            Entry::Occupied(slot) => kept[*slot.get()] = row,
            Entry::Vacant(slot) => {
                slot.insert(kept.len());
                kept.push(row);
            }
        }
    }
    if kept.len() < rows.len() {
        debug!("REST: collapsed {} duplicate rows", rows.len() - kept.len());
    }
    kept
}

/// Flattens the company into the column layout of the companies table.
/// `created_at` is omitted so the server keeps the first-seen value on merge.
fn company_row(c: &NormalizedCompany) -> Value {
    let location = c.main_business_location.as_ref();
    json!({
        "abn": c.abn,
        "abn_status": c.abn_status.as_str(),
        "entity_type": c.entity_type.label(),
        "entity_name": c.entity_name,
        "trading_name": c.trading_name,
        "registration_date": c.registration_date,
        "gst_registration_date": c.gst_registration_date,
        "last_updated_date": c.last_updated_date,
        "gst_status": c.gst_status.as_str(),
        "state": location.and_then(|l| l.state.clone()),
        "postcode": location.and_then(|l| l.postcode.clone()),
        "country": location.map(|l| l.country.clone()),
        "address_type": location.map(|l| l.address_type.clone()),
        "updated_at": c.updated_at,
    })
}

#[async_trait]
impl Storage for RestStorage {
    async fn upsert_companies(&self, companies: &[NormalizedCompany]) -> Result<()> {
        let batch = self.batches.fetch_add(1, Ordering::SeqCst);
        let rows: Vec<Value> = dedupe_by_key(companies, |c| c.abn.clone())
            .into_iter()
            .map(company_row)
            .collect();
        self.post_rows(COMPANIES_TABLE, "abn", &rows, batch).await
    }

    async fn upsert_business_names(&self, names: &[NormalizedBusinessName]) -> Result<()> {
        let batch = self.batches.load(Ordering::SeqCst).saturating_sub(1);
        let rows = dedupe_by_key(names, |n| {
            (n.company_abn.clone(), n.name_type, n.organisation_name.clone())
        });
        self.post_rows(
            BUSINESS_NAMES_TABLE,
            "company_abn,name_type,organisation_name",
            &rows,
            batch,
        )
        .await
    }

    async fn upsert_addresses(&self, addresses: &[NormalizedAddress]) -> Result<()> {
        let batch = self.batches.load(Ordering::SeqCst).saturating_sub(1);
        let rows = dedupe_by_key(addresses, |a| (a.company_abn.clone(), a.address_type));
        self.post_rows(ADDRESSES_TABLE, "company_abn,address_type", &rows, batch)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AbnStatus, EntityType, GstStatus};
    use chrono::{NaiveDate, Utc};

    #[test]
    fn test_endpoint_shape() {
        let storage = RestStorage::new("https://example.supabase.co/", "key");
        assert_eq!(
            storage.endpoint("companies", "abn"),
            "https://example.supabase.co/rest/v1/companies?on_conflict=abn"
        );
    }

    #[test]
    fn test_company_row_omits_created_at() {
        let company = NormalizedCompany {
            abn: "51824753556".to_string(),
            abn_status: AbnStatus::Cancelled,
            entity_type: EntityType::SuperannuationFund,
            entity_name: "SMITH SUPER FUND".to_string(),
            trading_name: None,
            registration_date: NaiveDate::from_ymd_opt(2001, 2, 3),
            gst_registration_date: None,
            last_updated_date: None,
            gst_status: GstStatus::Unknown,
            main_business_location: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let row = company_row(&company);
        assert_eq!(row["abn"], "51824753556");
        assert_eq!(row["abn_status"], "Cancelled");
        assert_eq!(row["entity_type"], "Superannuation Fund");
        assert_eq!(row["registration_date"], "2001-02-03");
        assert!(row.get("created_at").is_none());
        assert!(row["state"].is_null());
    }

    fn trading_name(abn: &str, name: &str, effective_from: Option<NaiveDate>) -> NormalizedBusinessName {
        NormalizedBusinessName {
            company_abn: abn.to_string(),
            name_type: crate::types::BusinessNameType::TradingName,
            organisation_name: name.to_string(),
            effective_from,
            effective_to: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_duplicate_conflict_keys_are_collapsed() {
        let later = NaiveDate::from_ymd_opt(2020, 1, 1);
        let names = vec![
            trading_name("51824753556", "SMITH BAKERY", None),
            trading_name("51824753556", "SMITH CAFE", None),
            trading_name("51824753556", "SMITH BAKERY", later),
        ];
        let rows = dedupe_by_key(&names, |n| {
            (n.company_abn.clone(), n.name_type, n.organisation_name.clone())
        });
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].organisation_name, "SMITH BAKERY");
        assert_eq!(rows[0].effective_from, later);
        assert_eq!(rows[1].organisation_name, "SMITH CAFE");

        let abns = ["1", "2", "1"];
        let kept = dedupe_by_key(&abns[..], |a| *a);
        assert_eq!(kept, vec![&"1", &"2"]);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let storage = RestStorage::new("http://127.0.0.1:9", "key");
        let err = storage
            .upsert_addresses(&[NormalizedAddress {
                company_abn: "51824753556".to_string(),
                address_type: crate::types::AddressType::MainPhysical,
                state_code: None,
                postcode: None,
                country_code: "AU".to_string(),
                effective_from: None,
                effective_to: None,
                created_at: Utc::now(),
            }])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::TransportError);
    }
}
