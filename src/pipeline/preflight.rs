//! Cheap structural sanity check run before committing to a full parse.

use crate::constants::{PREFLIGHT_SAMPLE_BYTES, ROOT_MARKERS};
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StructureCheck {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl StructureCheck {
    fn fail(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            errors: vec![reason.into()],
        }
    }
}

/// Looks at the head of the file only: it must exist, be non-empty, carry an XML
/// declaration and mention one of the expected root elements.
pub fn validate_xml_structure<P: AsRef<Path>>(path: P) -> StructureCheck {
    let path = path.as_ref();
    if !path.exists() {
        return StructureCheck::fail("XML file does not exist");
    }

    let sample = match read_sample(path) {
        Ok(sample) => sample,
        Err(e) => return StructureCheck::fail(format!("Error validating XML file: {}", e)),
    };
    if sample.is_empty() {
        return StructureCheck::fail("XML file is empty");
    }

    let text = String::from_utf8_lossy(&sample);
    let mut errors = Vec::new();
    if !text.contains("<?xml") {
        errors.push("File does not appear to be valid XML".to_string());
    }
    if !ROOT_MARKERS.iter().any(|marker| text.contains(marker)) {
        errors.push("Missing expected root elements".to_string());
    }

    debug!("Pre-flight for {}: {} problem(s)", path.display(), errors.len());
    StructureCheck {
        is_valid: errors.is_empty(),
        errors,
    }
}

fn read_sample(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut sample = Vec::with_capacity(PREFLIGHT_SAMPLE_BYTES);
    File::open(path)?
        .take(PREFLIGHT_SAMPLE_BYTES as u64)
        .read_to_end(&mut sample)?;
    Ok(sample)
}
