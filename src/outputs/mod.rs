//! Persisted output of the pipeline.
//!
//! # Submodules
//!
//! - [`json`]: the dataset file read by the dashboard, with atomic rewrites
//!
//! # Output Structure
//!
//! ```text
//! scrap_data.json   # every accepted record, oldest first
//! ```

pub mod json;
