// Ingestion pipeline: processing stages, storage collaborators and the batch controller

pub mod pipeline;
pub mod preflight;
pub mod processing;
pub mod storage;

pub use pipeline::{Pipeline, PipelineState, ProcessingStrategy, RunReport};
pub use preflight::{validate_xml_structure, StructureCheck};
