pub mod ddl;
pub mod jobs;
pub mod metadata;
pub mod recovery_log;
