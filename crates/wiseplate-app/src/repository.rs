//! Repository adapters for persistence layer

use std::path::Path;

use wiseplate_infra::persistence::FileAnalysisRecordRepository;
use wiseplate_types::Result;

use crate::config::Config;

/// Open file-based analysis record repository
pub fn open_record_repo(config: &Config) -> Result<FileAnalysisRecordRepository> {
    let store_dir = config.store_dir()?;
    FileAnalysisRecordRepository::open(&store_dir)
}

/// Open analysis record repository at a custom directory
pub fn open_record_repo_at(store_dir: &Path) -> Result<FileAnalysisRecordRepository> {
    FileAnalysisRecordRepository::open(store_dir)
}
