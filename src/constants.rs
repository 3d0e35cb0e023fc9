/// Expected database schema version
/// All databases must use this version for compatibility
pub const EXPECTED_DB_VERSION: &str = "1";

/// Default stuck-job timeout in seconds
/// Jobs left in PROCESSING longer than this without an update are
/// considered stuck by the detector.
pub const DEFAULT_STUCK_TIMEOUT_SECS: u64 = 300;

/// Administrative failure reason recorded by force-fail when the
/// operator does not supply one
pub const TIMED_OUT_ERROR: &str = "Processing timed out (reset by admin)";
