//! Use cases

pub mod batch_service;
pub mod recorder;
pub mod statistics_service;

pub use batch_service::{
    execute, execute_with, parse_analysis_date, run_batch, BatchError, BatchProcessor, BatchRequest,
    BatchSummary, ProgressCallback,
};
pub use recorder::{AnalysisRecorder, RecordOutcome};
pub use statistics_service::{collect_statistics, statistics_report};
