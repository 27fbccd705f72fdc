use super::traits::Storage;
use crate::constants::{ADDRESSES_TABLE, BUSINESS_NAMES_TABLE, COMPANIES_TABLE};
use crate::error::{IngestError, Result};
use crate::types::{NormalizedAddress, NormalizedBusinessName, NormalizedCompany};
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// Local SQLite database with one table per normalized shape.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
    batches: AtomicUsize,
}

impl SqliteStorage {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| persistence(0, e))?;
        info!("Opened SQLite storage at {}", path.display());
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| persistence(0, e))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(&format!(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS {companies} (
                abn                   TEXT PRIMARY KEY,
                abn_status            TEXT NOT NULL,
                entity_type           TEXT NOT NULL,
                entity_name           TEXT NOT NULL,
                trading_name          TEXT,
                registration_date     TEXT,
                gst_registration_date TEXT,
                last_updated_date     TEXT,
                gst_status            TEXT NOT NULL,
                state                 TEXT,
                postcode              TEXT,
                country               TEXT,
                address_type          TEXT,
                created_at            TEXT NOT NULL,
                updated_at            TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS {names} (
                company_abn       TEXT NOT NULL,
                name_type         TEXT NOT NULL,
                organisation_name TEXT NOT NULL,
                effective_from    TEXT,
                effective_to      TEXT,
                created_at        TEXT NOT NULL,
                PRIMARY KEY (company_abn, name_type, organisation_name)
            );
            CREATE TABLE IF NOT EXISTS {addresses} (
                company_abn    TEXT NOT NULL,
                address_type   TEXT NOT NULL,
                state_code     TEXT,
                postcode       TEXT,
                country_code   TEXT NOT NULL,
                effective_from TEXT,
                effective_to   TEXT,
                created_at     TEXT NOT NULL,
                PRIMARY KEY (company_abn, address_type)
            );
            "#,
            companies = COMPANIES_TABLE,
            names = BUSINESS_NAMES_TABLE,
            addresses = ADDRESSES_TABLE,
        ))
        .map_err(|e| persistence(0, e))?;

        Ok(Self {
            conn: Mutex::new(conn),
            batches: AtomicUsize::new(0),
        })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| persistence(self.batches.load(Ordering::SeqCst), e))
    }

    /// Row count of one of the storage tables.
    pub fn count(&self, table: &str) -> Result<usize> {
        let conn = self.connection()?;
        let n: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .map_err(|e| persistence(0, e))?;
        Ok(n as usize)
    }

    /// `(created_at, updated_at)` as stored for one company.
    pub fn company_timestamps(&self, abn: &str) -> Result<Option<(String, String)>> {
        let conn = self.connection()?;
        conn.query_row(
            &format!("SELECT created_at, updated_at FROM {} WHERE abn = ?1", COMPANIES_TABLE),
            params![abn],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(|e| persistence(0, e))
    }
}

fn persistence(batch: usize, e: impl std::fmt::Display) -> IngestError {
    IngestError::Persistence {
        batch,
        message: e.to_string(),
    }
}

fn date(d: Option<NaiveDate>) -> Option<String> {
    d.map(|d| d.format("%Y-%m-%d").to_string())
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn upsert_companies(&self, companies: &[NormalizedCompany]) -> Result<()> {
        let batch = self.batches.fetch_add(1, Ordering::SeqCst);
        let mut conn = self.connection()?;
        let tx = conn.transaction().map_err(|e| persistence(batch, e))?;
        {
            let mut stmt = tx
                .prepare_cached(&format!(
                    "INSERT INTO {} (abn, abn_status, entity_type, entity_name, trading_name,
                        registration_date, gst_registration_date, last_updated_date, gst_status,
                        state, postcode, country, address_type, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                     ON CONFLICT(abn) DO UPDATE SET
                        abn_status=excluded.abn_status,
                        entity_type=excluded.entity_type,
                        entity_name=excluded.entity_name,
                        trading_name=excluded.trading_name,
                        registration_date=excluded.registration_date,
                        gst_registration_date=excluded.gst_registration_date,
                        last_updated_date=excluded.last_updated_date,
                        gst_status=excluded.gst_status,
                        state=excluded.state,
                        postcode=excluded.postcode,
                        country=excluded.country,
                        address_type=excluded.address_type,
                        updated_at=excluded.updated_at",
                    COMPANIES_TABLE
                ))
                .map_err(|e| persistence(batch, e))?;

            for c in companies {
                let location = c.main_business_location.as_ref();
                stmt.execute(params![
                    c.abn,
                    c.abn_status.as_str(),
                    c.entity_type.label(),
                    c.entity_name,
                    c.trading_name,
                    date(c.registration_date),
                    date(c.gst_registration_date),
                    date(c.last_updated_date),
                    c.gst_status.as_str(),
                    location.and_then(|l| l.state.clone()),
                    location.and_then(|l| l.postcode.clone()),
                    location.map(|l| l.country.clone()),
                    location.map(|l| l.address_type.clone()),
                    c.created_at.to_rfc3339(),
                    c.updated_at.to_rfc3339(),
                ])
                .map_err(|e| persistence(batch, format!("{}: {}", c.abn, e)))?;
            }
        }
        tx.commit().map_err(|e| persistence(batch, e))?;
        debug!("SQLite: upserted {} companies (batch {})", companies.len(), batch);
        Ok(())
    }

    async fn upsert_business_names(&self, names: &[NormalizedBusinessName]) -> Result<()> {
        let batch = self.batches.load(Ordering::SeqCst).saturating_sub(1);
        let mut conn = self.connection()?;
        let tx = conn.transaction().map_err(|e| persistence(batch, e))?;
        {
            let mut stmt = tx
                .prepare_cached(&format!(
                    "INSERT INTO {} (company_abn, name_type, organisation_name, effective_from, effective_to, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(company_abn, name_type, organisation_name) DO UPDATE SET
                        effective_from=excluded.effective_from,
                        effective_to=excluded.effective_to",
                    BUSINESS_NAMES_TABLE
                ))
                .map_err(|e| persistence(batch, e))?;
            for n in names {
                stmt.execute(params![
                    n.company_abn,
                    n.name_type.code(),
                    n.organisation_name,
                    date(n.effective_from),
                    date(n.effective_to),
                    n.created_at.to_rfc3339(),
                ])
                .map_err(|e| persistence(batch, e))?;
            }
        }
        tx.commit().map_err(|e| persistence(batch, e))?;
        debug!("SQLite: upserted {} business names", names.len());
        Ok(())
    }

    async fn upsert_addresses(&self, addresses: &[NormalizedAddress]) -> Result<()> {
        let batch = self.batches.load(Ordering::SeqCst).saturating_sub(1);
        let mut conn = self.connection()?;
        let tx = conn.transaction().map_err(|e| persistence(batch, e))?;
        {
            let mut stmt = tx
                .prepare_cached(&format!(
                    "INSERT INTO {} (company_abn, address_type, state_code, postcode, country_code,
                        effective_from, effective_to, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT(company_abn, address_type) DO UPDATE SET
                        state_code=excluded.state_code,
                        postcode=excluded.postcode,
                        country_code=excluded.country_code,
                        effective_from=excluded.effective_from,
                        effective_to=excluded.effective_to",
                    ADDRESSES_TABLE
                ))
                .map_err(|e| persistence(batch, e))?;
            for a in addresses {
                stmt.execute(params![
                    a.company_abn,
                    a.address_type.code(),
                    a.state_code,
                    a.postcode,
                    a.country_code,
                    date(a.effective_from),
                    date(a.effective_to),
                    a.created_at.to_rfc3339(),
                ])
                .map_err(|e| persistence(batch, e))?;
            }
        }
        tx.commit().map_err(|e| persistence(batch, e))?;
        debug!("SQLite: upserted {} addresses", addresses.len());
        Ok(())
    }
}
