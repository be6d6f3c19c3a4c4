//! Infrastructure layer - file-backed implementations of domain seams

pub mod output_tree;
pub mod persistence;
pub mod statistics;

pub use output_tree::{OutputFileName, OutputTree};
pub use persistence::FileAnalysisRecordRepository;
pub use statistics::{OutputTreeStatistics, RecordStoreStatistics};
