pub mod collector;
pub mod config;
pub mod dataset;
pub mod error;
pub mod model;
pub mod preprocess;
pub mod report;

// Database module for PostgreSQL
pub mod db;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
