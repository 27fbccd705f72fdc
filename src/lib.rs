pub mod common;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod types;

pub use config::Config;
pub use error::{ErrorKind, IngestError, Result};
pub use pipeline::{Pipeline, PipelineState, ProcessingStrategy, RunReport};
