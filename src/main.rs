use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};

use abn_ingest::config::{Config, StorageBackend};
use abn_ingest::constants::{DEFAULT_CONFIG_PATH, ENV_METRICS_PORT};
use abn_ingest::pipeline::processing::normalize::abn::{clean_abn, is_valid_abn};
use abn_ingest::pipeline::storage::build_storage;
use abn_ingest::pipeline::{validate_xml_structure, Pipeline, RunReport};
use abn_ingest::{logging, metrics};

#[derive(Parser)]
#[command(name = "abn_ingest")]
#[command(about = "Australian Business Register bulk extract ingestion")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse, normalize, validate and store a registry extract
    Ingest {
        /// Path to the XML extract
        file: PathBuf,
        /// TOML configuration file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,
        /// Records per processing slice and per upload batch
        #[arg(long)]
        batch_size: Option<usize>,
        /// Abort on the first record that fails to map or validate
        #[arg(long)]
        strict: bool,
        /// Storage backend: memory, sqlite or rest
        #[arg(long)]
        backend: Option<StorageBackend>,
        /// SQLite database path
        #[arg(long)]
        db: Option<String>,
        /// Write the run report as JSON to this path
        #[arg(long)]
        report: Option<PathBuf>,
        /// Expose Prometheus metrics on this port
        #[arg(long)]
        metrics_port: Option<u16>,
    },
    /// Run the pre-flight structural check on an extract
    Check {
        /// Path to the XML extract
        file: PathBuf,
    },
    /// Clean and checksum-validate a single ABN
    Abn {
        abn: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest {
            file,
            config,
            batch_size,
            strict,
            backend,
            db,
            report,
            metrics_port,
        } => {
            let mut config = Config::load(&config)
                .with_context(|| format!("loading configuration from {}", config.display()))?;
            if let Some(batch_size) = batch_size {
                config.pipeline.batch_size = batch_size;
            }
            if strict {
                config.pipeline.skip_malformed = false;
            }
            if let Some(backend) = backend {
                config.storage.backend = backend;
            }
            if let Some(db) = db {
                config.storage.sqlite_path = db;
            }
            config.validate()?;

            logging::init_logging(&config.logging);

            let port = metrics_port.or_else(|| {
                std::env::var(ENV_METRICS_PORT)
                    .ok()
                    .and_then(|p| p.parse().ok())
            });
            if let Some(port) = port {
                metrics::init_metrics(port);
            }

            let check = validate_xml_structure(&file);
            if !check.is_valid {
                for reason in &check.errors {
                    warn!("Pre-flight: {}", reason);
                }
            }

            let storage = build_storage(&config.storage)?;
            let pipeline = Pipeline::new(config.pipeline.clone(), storage);
            let result = pipeline.run_file(&file).await;
            let run = match result {
                Ok(run) => run,
                Err(e) => {
                    error!("Ingestion failed: {}", e);
                    return Err(e).with_context(|| format!("ingesting {}", file.display()));
                }
            };

            print_summary(&run);
            if let Some(path) = report {
                run.write_json(&path)
                    .with_context(|| format!("writing report to {}", path.display()))?;
                info!("Run report written to {}", path.display());
            }
        }
        Commands::Check { file } => {
            let check = validate_xml_structure(&file);
            if check.is_valid {
                println!("{}: OK", file.display());
            } else {
                println!("{}: FAILED", file.display());
                for reason in &check.errors {
                    println!("   - {}", reason);
                }
                bail!("pre-flight check failed for {}", file.display());
            }
        }
        Commands::Abn { abn } => {
            let cleaned = clean_abn(&abn);
            if is_valid_abn(&cleaned) {
                println!("{} is a valid ABN", cleaned);
            } else {
                bail!("{} is not a valid ABN", if cleaned.is_empty() { &abn } else { &cleaned });
            }
        }
    }
    Ok(())
}

fn print_summary(run: &RunReport) {
    println!("\nIngestion results for {}:", run.source);
    println!("   Run id: {}", run.run_id);
    println!("   Records found: {}", run.total_records);
    println!("   Normalized: {}", run.normalized_count);
    println!("   Skipped: {}", run.skipped_count);
    println!("   Business names: {}", run.business_name_count);
    println!("   Addresses: {}", run.address_count);
    println!("   Batches uploaded: {}", run.batches_uploaded);

    if !run.errors.is_empty() {
        println!("\nErrors encountered:");
        for err in &run.errors {
            println!("   - [{}] {}", err.kind, err.message);
        }
    }
}
