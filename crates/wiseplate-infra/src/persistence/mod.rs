//! Persistence implementations
//!
//! This module provides file-based implementations of the repository traits.

mod file_analysis_record_repo;

pub use file_analysis_record_repo::{FileAnalysisRecordRepository, CORRUPT_SUFFIX, RECORDS_FILE};
