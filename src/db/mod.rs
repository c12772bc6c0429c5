//! Database module for PostgreSQL connection and operations
//!
//! Schema creation, the two-phase loader and the read-back queries used by
//! the reporter.

pub mod connection;
pub mod loader;
pub mod queries;
pub mod schema;

pub use connection::{init_pool, DbPool};
pub use loader::{LoadSummary, Loader, PreparedReview};
pub use queries::ReportRepository;
pub use schema::create_tables;
