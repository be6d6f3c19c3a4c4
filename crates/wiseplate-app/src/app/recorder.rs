//! Analysis Recorder - persists one classified item
//!
//! Two independent effects per item: a record in the store and a crop file
//! in the output tree. A failure in one is logged and never stops the other.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{debug, error};
use wiseplate_domain::repository::AnalysisRecordRepository;
use wiseplate_infra::{OutputFileName, OutputTree};
use wiseplate_types::{AnalysisRecord, Classification, DetectedItem, UserId};

/// What happened to one item
#[derive(Debug, Clone)]
pub struct RecordOutcome {
    pub record: AnalysisRecord,
    pub saved: bool,
    pub file: Option<PathBuf>,
    pub errors: Vec<String>,
}

impl RecordOutcome {
    pub fn is_complete(&self) -> bool {
        self.saved && self.file.is_some()
    }
}

pub struct AnalysisRecorder<'a> {
    repository: &'a dyn AnalysisRecordRepository,
    tree: &'a OutputTree,
    user: UserId,
    analysis_date: Option<NaiveDate>,
}

impl<'a> AnalysisRecorder<'a> {
    pub fn new(
        repository: &'a dyn AnalysisRecordRepository,
        tree: &'a OutputTree,
        user: UserId,
        analysis_date: Option<NaiveDate>,
    ) -> Self {
        Self {
            repository,
            tree,
            user,
            analysis_date,
        }
    }

    /// Save the record and copy the crop at `crop_path` into the tree
    ///
    /// `base` is the source image file stem.
    pub fn record(
        &self,
        base: &str,
        item: &DetectedItem,
        classification: &Classification,
        crop_path: &Path,
    ) -> RecordOutcome {
        let record = AnalysisRecord::new(self.user.clone(), item, classification, self.analysis_date)
            .with_source_image(base.to_string());
        let mut errors = Vec::new();

        let saved = match self.repository.save(&record) {
            Ok(()) => true,
            Err(e) => {
                error!(base, category = %item.category, error = %e, "Failed to save analysis record");
                errors.push(format!("record: {}", e));
                false
            }
        };

        let name = OutputFileName {
            base: base.to_string(),
            category: item.category,
            sub_type: classification.sub_type.clone(),
            confidence: f64::from(item.confidence),
            status: classification.waste_status,
        };
        let file = match self.tree.store_crop(crop_path, &name) {
            Ok(path) => {
                debug!(path = %path.display(), "Crop stored");
                Some(path)
            }
            Err(e) => {
                error!(base, category = %item.category, error = %e, "Failed to store crop");
                errors.push(format!("file: {}", e));
                None
            }
        };

        RecordOutcome {
            record,
            saved,
            file,
            errors,
        }
    }
}
