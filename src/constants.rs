//! Fixed tables and defaults for the ABR bulk extract pipeline.

/// Files at or above this size take the chunked processing path.
pub const CHUNK_THRESHOLD_BYTES: u64 = 100 * 1024 * 1024;

/// Default size for both chunk slicing and upload batching.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Emit a progress line every N processed records.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 10_000;

/// Element name of one business entity under the document root.
pub const RECORD_ELEMENT: &str = "ABR";

/// Longest source excerpt kept on a ProcessingError.
pub const FRAGMENT_MAX_CHARS: usize = 500;

/// Root markers the pre-flight check looks for.
pub const ROOT_MARKERS: [&str; 2] = ["ABR", "searchResults"];

/// Bytes sampled from the head of the file by the pre-flight check.
pub const PREFLIGHT_SAMPLE_BYTES: usize = 8192;

pub const ABN_LENGTH: usize = 11;
pub const ABN_MODULUS: i64 = 89;
pub const ABN_WEIGHTS: [i64; ABN_LENGTH] = [10, 1, 3, 5, 7, 9, 11, 13, 15, 17, 19];

pub const MAX_TEXT_LENGTH: usize = 200;

/// Dates before this year are rejected as registry noise.
pub const MIN_DATE_YEAR: i32 = 1900;
/// Dates further than this many years ahead of today are rejected.
pub const MAX_FUTURE_YEARS: i32 = 10;

pub const DEFAULT_COUNTRY_CODE: &str = "AU";

pub const MAIN_PHYSICAL_ADDRESS: &str = "Main Business Physical Address";
pub const MAIN_POSTAL_ADDRESS: &str = "Main Business Postal Address";

pub const MAIN_NAME_CODE: &str = "MN";
pub const OTHER_NAME_CODE: &str = "OTN";
pub const TRADING_NAME_CODE: &str = "TRD";

/// Canonical state and territory abbreviations.
pub const AUSTRALIAN_STATES: [&str; 8] = ["NSW", "VIC", "QLD", "WA", "SA", "TAS", "ACT", "NT"];

/// Full state names accepted in place of the abbreviation.
pub const STATE_NAMES: [(&str, &str); 8] = [
    ("NEW SOUTH WALES", "NSW"),
    ("VICTORIA", "VIC"),
    ("QUEENSLAND", "QLD"),
    ("WESTERN AUSTRALIA", "WA"),
    ("SOUTH AUSTRALIA", "SA"),
    ("TASMANIA", "TAS"),
    ("AUSTRALIAN CAPITAL TERRITORY", "ACT"),
    ("NORTHERN TERRITORY", "NT"),
];

pub const DEFAULT_CONFIG_PATH: &str = "abn_ingest.toml";
pub const DEFAULT_SQLITE_PATH: &str = "abn.db";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_LOG_FILE: &str = "abn_ingest.log";

// Environment overrides
pub const ENV_METRICS_PORT: &str = "ABN_INGEST_METRICS_PORT";
pub const ENV_SQLITE_PATH: &str = "ABN_INGEST_DB_PATH";
pub const ENV_REST_URL: &str = "SUPABASE_URL";
pub const ENV_REST_KEY: &str = "SUPABASE_SERVICE_ROLE_KEY";

// Storage table names, shared by the SQLite and REST backends
pub const COMPANIES_TABLE: &str = "companies";
pub const BUSINESS_NAMES_TABLE: &str = "business_names";
pub const ADDRESSES_TABLE: &str = "addresses";
