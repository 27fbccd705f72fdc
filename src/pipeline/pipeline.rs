//! Batch pipeline controller.
//!
//! Drives one registry extract through parse, map, normalize and validate, isolates
//! per-record failures and hands valid rows to storage in fixed-size batches.
//!
//! State machine: `Idle -> SizeCheck -> {WholeFileParse | ChunkedParse}
//! -> PerRecordProcessing -> Completed | Failed`.

use crate::config::PipelineConfig;
use crate::constants::FRAGMENT_MAX_CHARS;
use crate::error::{ErrorKind, IngestError, Result};
use crate::metrics::PipelineMetrics;
use crate::pipeline::processing::mapper::RecordMapper;
use crate::pipeline::processing::normalize::{DefaultNormalizer, Normalizer};
use crate::pipeline::processing::parser::{DocumentParser, XmlTreeParser, XmlValue};
use crate::pipeline::processing::quality_gate::{DefaultQualityGate, QualityGate};
use crate::pipeline::storage::Storage;
use crate::types::{
    NormalizedAddress, NormalizedBusinessName, NormalizedCompany, NormalizedEntity, ProcessingError,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    SizeCheck,
    WholeFileParse,
    ChunkedParse,
    PerRecordProcessing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStrategy {
    /// Records processed in one pass
    WholeFile,
    /// Records processed in `batch_size` slices, each released before the next
    Chunked,
}

/// Mutable state of a single run. Owned by that run, never shared.
#[derive(Debug)]
pub struct RunContext {
    run_id: Uuid,
    source: String,
    source_sha256: Option<String>,
    strategy: Option<ProcessingStrategy>,
    state: PipelineState,
    log_errors: bool,
    total_records: usize,
    normalized_count: usize,
    skipped_count: usize,
    business_name_count: usize,
    address_count: usize,
    batches_uploaded: usize,
    errors: Vec<ProcessingError>,
    started_at: DateTime<Utc>,
    timer: Instant,
}

impl RunContext {
    fn new(source: impl Into<String>, log_errors: bool) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            source: source.into(),
            source_sha256: None,
            strategy: None,
            state: PipelineState::Idle,
            log_errors,
            total_records: 0,
            normalized_count: 0,
            skipped_count: 0,
            business_name_count: 0,
            address_count: 0,
            batches_uploaded: 0,
            errors: Vec::new(),
            started_at: Utc::now(),
            timer: Instant::now(),
        }
    }

    fn transition(&mut self, next: PipelineState) {
        debug!("run {}: {:?} -> {:?}", self.run_id, self.state, next);
        self.state = next;
    }

    fn record_error(&mut self, err: ProcessingError) {
        self.skipped_count += 1;
        PipelineMetrics::record_skip(err.kind);
        if self.log_errors {
            self.errors.push(err);
        }
    }

    fn fail(&mut self, err: IngestError) -> IngestError {
        self.transition(PipelineState::Failed);
        error!("run {} failed in {:?}: {}", self.run_id, self.source, err);
        err
    }

    fn into_report(self) -> RunReport {
        RunReport {
            run_id: self.run_id,
            source: self.source,
            source_sha256: self.source_sha256,
            strategy: self.strategy,
            final_state: self.state,
            total_records: self.total_records,
            normalized_count: self.normalized_count,
            skipped_count: self.skipped_count,
            business_name_count: self.business_name_count,
            address_count: self.address_count,
            batches_uploaded: self.batches_uploaded,
            errors: self.errors,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub source: String,
    pub source_sha256: Option<String>,
    pub strategy: Option<ProcessingStrategy>,
    pub final_state: PipelineState,
    pub total_records: usize,
    pub normalized_count: usize,
    pub skipped_count: usize,
    pub business_name_count: usize,
    pub address_count: usize,
    pub batches_uploaded: usize,
    pub errors: Vec<ProcessingError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Valid rows waiting for the next upload.
#[derive(Default)]
struct PendingBatch {
    companies: Vec<NormalizedCompany>,
    business_names: Vec<NormalizedBusinessName>,
    addresses: Vec<NormalizedAddress>,
}

impl PendingBatch {
    fn push(&mut self, entity: NormalizedEntity) {
        self.companies.push(entity.company);
        self.business_names.extend(entity.business_names);
        self.addresses.extend(entity.addresses);
    }

    fn len(&self) -> usize {
        self.companies.len()
    }

    fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }
}

pub struct Pipeline {
    config: PipelineConfig,
    storage: Arc<dyn Storage>,
    parser: Box<dyn DocumentParser>,
    mapper: RecordMapper,
    normalizer: Box<dyn Normalizer>,
    gate: Box<dyn QualityGate>,
}

impl Pipeline {
    pub fn new(mut config: PipelineConfig, storage: Arc<dyn Storage>) -> Self {
        if config.batch_size == 0 || config.progress_interval == 0 {
            warn!(
                "Pipeline: batch_size={} progress_interval={} raised to at least 1",
                config.batch_size, config.progress_interval
            );
            config.batch_size = config.batch_size.max(1);
            config.progress_interval = config.progress_interval.max(1);
        }
        Self {
            config,
            storage,
            parser: Box::new(XmlTreeParser),
            mapper: RecordMapper::new(),
            normalizer: Box::new(DefaultNormalizer::new()),
            gate: Box::new(DefaultQualityGate::new()),
        }
    }

    pub fn with_quality_gate(mut self, gate: Box<dyn QualityGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Files at or above the threshold are processed in slices.
    pub fn select_strategy(&self, size_bytes: u64) -> ProcessingStrategy {
        if size_bytes >= self.config.chunk_threshold_bytes {
            ProcessingStrategy::Chunked
        } else {
            ProcessingStrategy::WholeFile
        }
    }

    /// Runs the pipeline over an extract on disk.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub async fn run_file<P: AsRef<Path>>(&self, path: P) -> Result<RunReport> {
        let path = path.as_ref();
        let mut ctx = RunContext::new(path.display().to_string(), self.config.log_errors);
        PipelineMetrics::record_run_started();
        info!("Starting ingestion run {} for {}", ctx.run_id, path.display());

        ctx.transition(PipelineState::SizeCheck);
        let size = match tokio::fs::metadata(path).await {
            Ok(meta) => meta.len(),
            Err(e) => return Err(ctx.fail(IngestError::Parse(format!("cannot read {}: {}", path.display(), e)))),
        };
        let strategy = self.select_strategy(size);
        info!("{} is {} bytes, using {:?} processing", path.display(), size, strategy);

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => return Err(ctx.fail(IngestError::Parse(format!("cannot read {}: {}", path.display(), e)))),
        };
        self.execute(&bytes, strategy, ctx).await
    }

    /// Runs the pipeline over an in-memory document with an explicit strategy.
    pub async fn run_document(&self, xml: &str, strategy: ProcessingStrategy) -> Result<RunReport> {
        let mut ctx = RunContext::new("<memory>", self.config.log_errors);
        PipelineMetrics::record_run_started();
        ctx.transition(PipelineState::SizeCheck);
        self.execute(xml.as_bytes(), strategy, ctx).await
    }

    async fn execute(
        &self,
        bytes: &[u8],
        strategy: ProcessingStrategy,
        mut ctx: RunContext,
    ) -> Result<RunReport> {
        ctx.source_sha256 = Some(hex::encode(Sha256::digest(bytes)));
        ctx.strategy = Some(strategy);
        ctx.transition(match strategy {
            ProcessingStrategy::WholeFile => PipelineState::WholeFileParse,
            ProcessingStrategy::Chunked => PipelineState::ChunkedParse,
        });

        // Both strategies need the full tree; chunking only bounds processing memory.
        let document = match self.parser.parse(bytes) {
            Ok(document) => document,
            Err(IngestError::Parse(msg)) => return Err(ctx.fail(IngestError::Parse(msg))),
            Err(other) => return Err(ctx.fail(IngestError::Parse(other.to_string()))),
        };
        let records = document.records(&self.config.record_element);
        ctx.total_records = records.len();
        info!(
            "Parsed <{}> with {} <{}> records",
            document.root_name,
            records.len(),
            self.config.record_element
        );

        ctx.transition(PipelineState::PerRecordProcessing);
        let mut pending = PendingBatch::default();
        match strategy {
            ProcessingStrategy::WholeFile => {
                self.process_slice(&records, 0, &mut pending, &mut ctx).await?;
            }
            ProcessingStrategy::Chunked => {
                for (chunk, slice) in records.chunks(self.config.batch_size).enumerate() {
                    debug!("Processing chunk {} ({} records)", chunk, slice.len());
                    self.process_slice(slice, chunk * self.config.batch_size, &mut pending, &mut ctx)
                        .await?;
                }
            }
        }
        self.flush(&mut pending, &mut ctx).await?;

        ctx.transition(PipelineState::Completed);
        PipelineMetrics::record_run_finished(
            ctx.total_records,
            ctx.normalized_count,
            ctx.timer.elapsed().as_secs_f64(),
        );
        info!(
            "Run {} completed: {} normalized, {} skipped, {} batches uploaded",
            ctx.run_id, ctx.normalized_count, ctx.skipped_count, ctx.batches_uploaded
        );
        Ok(ctx.into_report())
    }

    async fn process_slice(
        &self,
        slice: &[&XmlValue],
        offset: usize,
        pending: &mut PendingBatch,
        ctx: &mut RunContext,
    ) -> Result<()> {
        for (i, node) in slice.iter().enumerate() {
            let index = offset + i;
            match self.process_record(index, node) {
                Ok(entity) => {
                    ctx.normalized_count += 1;
                    pending.push(entity);
                    if pending.len() >= self.config.batch_size {
                        self.flush(pending, ctx).await?;
                    }
                }
                Err(err) if !self.config.skip_malformed => {
                    return Err(ctx.fail(IngestError::RecordRejected {
                        index,
                        kind: err.kind,
                        message: err.message,
                    }));
                }
                Err(err) => {
                    debug!("Skipping record {}: {}", index, err.message);
                    ctx.record_error(err);
                }
            }

            let processed = index + 1;
            if processed % self.config.progress_interval == 0 {
                info!(
                    "Processed {}/{} records ({} normalized, {} skipped)",
                    processed, ctx.total_records, ctx.normalized_count, ctx.skipped_count
                );
            }
        }
        Ok(())
    }

    /// Map, normalize and validate one entity node.
    fn process_record(
        &self,
        index: usize,
        node: &XmlValue,
    ) -> std::result::Result<NormalizedEntity, ProcessingError> {
        let raw = match self.mapper.map(node) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                return Err(ProcessingError::new(
                    ErrorKind::ParseError,
                    format!("skipped: record {} has no ABN or entity name", index),
                )
                .with_fragment(node.fragment(FRAGMENT_MAX_CHARS)));
            }
            Err(e) => {
                return Err(ProcessingError::new(e.kind(), format!("record {}: {}", index, e))
                    .with_fragment(node.fragment(FRAGMENT_MAX_CHARS)));
            }
        };

        let entity = self.normalizer.normalize(&raw);
        let validation = self.gate.validate(&entity.company);
        for warning in &validation.warnings {
            warn!("record {} ({}): {}", index, entity.company.abn, warning);
        }
        if !validation.is_valid {
            return Err(ProcessingError::new(
                ErrorKind::ValidationError,
                format!(
                    "record {} ({}): {}",
                    index,
                    entity.company.abn,
                    validation.errors.join("; ")
                ),
            )
            .with_fragment(node.fragment(FRAGMENT_MAX_CHARS)));
        }
        Ok(entity)
    }

    /// Uploads the pending rows: companies first, then their children.
    async fn flush(&self, pending: &mut PendingBatch, ctx: &mut RunContext) -> Result<()> {
        if pending.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(pending);
        let started = Instant::now();

        if let Err(e) = self.upload(&batch).await {
            return Err(ctx.fail(e));
        }

        ctx.batches_uploaded += 1;
        ctx.business_name_count += batch.business_names.len();
        ctx.address_count += batch.addresses.len();
        PipelineMetrics::record_batch_uploaded(started.elapsed().as_secs_f64());
        info!(
            "Uploaded batch {} ({} companies, {} names, {} addresses)",
            ctx.batches_uploaded,
            batch.companies.len(),
            batch.business_names.len(),
            batch.addresses.len()
        );
        Ok(())
    }

    async fn upload(&self, batch: &PendingBatch) -> Result<()> {
        self.storage.upsert_companies(&batch.companies).await?;
        for names in batch.business_names.chunks(self.config.batch_size) {
            self.storage.upsert_business_names(names).await?;
        }
        for addresses in batch.addresses.chunks(self.config.batch_size) {
            self.storage.upsert_addresses(addresses).await?;
        }
        Ok(())
    }
}
