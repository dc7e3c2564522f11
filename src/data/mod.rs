//! Data ingestion and storage
//!
//! Offline parsing of liveData JSON files and SQLite persistence of
//! materialized tables. No network I/O; retrieval is an external concern.

pub mod database;
pub mod ingest;

pub use database::Database;
