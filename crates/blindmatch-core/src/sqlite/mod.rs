//! SQLite persistence backend

mod ledger;
mod records;
mod schema;

pub use records::SqliteRecordStore;
pub use schema::{SCHEMA_VERSION, check_version, init_schema};
