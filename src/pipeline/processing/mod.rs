// Per-record processing: XML tree and field extraction, mapping, normalization, validation

pub mod mapper;
pub mod normalize;
pub mod parser;
pub mod quality_gate;
