// Shared helpers used by more than one pipeline stage

pub mod dates;
