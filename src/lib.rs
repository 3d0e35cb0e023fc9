// Library interface for testing

// Declare all modules
pub mod config;
pub mod constants;
pub mod db;
pub mod queries;
pub mod recover;
pub mod schema;
pub mod serve;
pub mod status;
pub mod store;
pub mod stuck;

// Re-export the expected database version for convenience
pub use constants::EXPECTED_DB_VERSION;
