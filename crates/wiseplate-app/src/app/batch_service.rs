//! Batch Service - Core Use Case for Tray Image Analysis
//!
//! This service orchestrates one batch run:
//! 1. Validate the config and load the model registry (fatal when empty)
//! 2. Check the input directory (fatal when missing)
//! 3. Reset the output tree
//! 4. Per image: decode, detect, select items
//! 5. Per item: crop, classify, record
//! 6. Build the statistics report into the summary
//! 7. Optionally remove the input directory

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Utc};
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};
use wiseplate_domain::model::PLATE_MODEL;
use wiseplate_domain::repository::AnalysisRecordRepository;
use wiseplate_domain::service::select_items;
use wiseplate_infra::OutputTree;
use wiseplate_types::{DetectedItem, Error, ModelError, Result, UserId};
use wiseplate_vision::{ItemClassifier, ModelManifest, ModelRegistry, PlateDetector, YoloPlateDetector};

use crate::app::recorder::{AnalysisRecorder, RecordOutcome};
use crate::app::statistics_service::statistics_report;
use crate::config::Config;
use crate::repository::open_record_repo;
use crate::scanner::scan_directory;

/// Conditions that abort a batch run
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("No models could be loaded from {0}")]
    NoModelsLoaded(String),

    #[error("Input directory not found: {0}")]
    InputDirectoryMissing(String),

    #[error("Failed to reset output directory {path}: {source}")]
    OutputReset {
        path: String,
        #[source]
        source: Error,
    },

    #[error(transparent)]
    Other(#[from] Error),
}

impl From<BatchError> for Error {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::Other(e) => e,
            other => Error::AnalysisFailed(other.to_string()),
        }
    }
}

/// Progress callback: (images done, images total, current image name)
pub type ProgressCallback = Box<dyn Fn(usize, usize, &str) + Send>;

/// Counters for one batch run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub images_found: usize,
    pub images_processed: usize,
    pub images_failed: usize,
    /// Items whose record reached the store
    pub items_recorded: usize,
    /// Boxes dropped by the selection policy, including unexamined ones
    pub items_skipped: usize,
    /// Items whose classification failed
    pub items_failed: usize,
    pub record_failures: usize,
    pub file_failures: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Text waste report built after the run
    #[serde(skip)]
    pub report: Option<String>,
}

impl BatchSummary {
    fn start() -> Self {
        let now = Utc::now();
        Self {
            images_found: 0,
            images_processed: 0,
            images_failed: 0,
            items_recorded: 0,
            items_skipped: 0,
            items_failed: 0,
            record_failures: 0,
            file_failures: 0,
            started_at: now,
            finished_at: now,
            report: None,
        }
    }

    fn absorb(&mut self, outcome: &RecordOutcome) {
        if outcome.saved {
            self.items_recorded += 1;
        } else {
            self.record_failures += 1;
        }
        if outcome.file.is_none() {
            self.file_failures += 1;
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Images:  {} found, {} processed, {} failed",
            self.images_found, self.images_processed, self.images_failed
        )?;
        writeln!(
            f,
            "Items:   {} recorded, {} skipped, {} failed",
            self.items_recorded, self.items_skipped, self.items_failed
        )?;
        if self.record_failures > 0 || self.file_failures > 0 {
            writeln!(
                f,
                "Errors:  {} record saves, {} crop files",
                self.record_failures, self.file_failures
            )?;
        }
        let elapsed = self.finished_at - self.started_at;
        write!(f, "Elapsed: {:.1}s", elapsed.num_milliseconds() as f64 / 1000.0)
    }
}

/// One batch run's inputs
pub struct BatchRequest {
    pub image_directory: PathBuf,
    pub output_root: PathBuf,
    pub analysis_date: Option<NaiveDate>,
    pub user: UserId,
    pub progress: Option<ProgressCallback>,
}

impl BatchRequest {
    pub fn new(image_directory: impl Into<PathBuf>, output_root: impl Into<PathBuf>, user: UserId) -> Self {
        Self {
            image_directory: image_directory.into(),
            output_root: output_root.into(),
            analysis_date: None,
            user,
            progress: None,
        }
    }

    pub fn with_date(mut self, analysis_date: Option<NaiveDate>) -> Self {
        self.analysis_date = analysis_date;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }
}

/// Parse `YYYY-MM-DD`; absent or invalid input falls back to today
pub fn parse_analysis_date(input: Option<&str>) -> NaiveDate {
    match input.map(str::trim).filter(|s| !s.is_empty()) {
        Some(text) => NaiveDate::parse_from_str(text, "%Y-%m-%d").unwrap_or_else(|e| {
            warn!(input = text, error = %e, "Invalid analysis date, using today");
            Local::now().date_naive()
        }),
        None => Local::now().date_naive(),
    }
}

/// Run a batch with models from `config.models_dir` and the configured record store
pub fn run_batch(
    config: &Config,
    image_directory: &Path,
    output_root: &Path,
    analysis_date: Option<NaiveDate>,
    user: UserId,
) -> std::result::Result<BatchSummary, BatchError> {
    let request = BatchRequest::new(image_directory, output_root, user).with_date(analysis_date);
    execute(config, request)
}

/// Like [`run_batch`], taking a prepared request (e.g. with a progress callback)
pub fn execute(config: &Config, request: BatchRequest) -> std::result::Result<BatchSummary, BatchError> {
    let manifest = ModelManifest::load(&config.models_dir)?;
    let registry = ModelRegistry::load(&manifest);
    if registry.is_empty() {
        return Err(BatchError::NoModelsLoaded(config.models_dir.display().to_string()));
    }
    let repository = open_record_repo(config)?;
    execute_with(config, Arc::new(registry), &repository, request)
}

/// Run a batch against an already-loaded registry and repository
pub fn execute_with(
    config: &Config,
    registry: Arc<ModelRegistry>,
    repository: &dyn AnalysisRecordRepository,
    request: BatchRequest,
) -> std::result::Result<BatchSummary, BatchError> {
    config.validate()?;
    if registry.is_empty() {
        return Err(BatchError::NoModelsLoaded(config.models_dir.display().to_string()));
    }

    let BatchRequest {
        image_directory,
        output_root,
        analysis_date,
        user,
        progress,
    } = request;

    let tree = OutputTree::new(output_root.clone());
    let mut processor = BatchProcessor::from_registry(config, registry, repository, tree);
    if let Some(progress) = progress {
        processor = processor.with_progress(progress);
    }
    let mut summary = processor.run(&image_directory, analysis_date, &user)?;

    let report = statistics_report(
        config.statistics_source,
        &output_root,
        repository,
        Some(user),
        analysis_date,
    );
    match report {
        Ok(report) => summary.report = Some(report),
        Err(e) => error!(error = %e, "Failed to build statistics report"),
    }

    if config.remove_input_after_run {
        match std::fs::remove_dir_all(&image_directory) {
            Ok(()) => info!(dir = %image_directory.display(), "Input directory removed"),
            Err(e) => warn!(dir = %image_directory.display(), error = %e, "Failed to remove input directory"),
        }
    }

    Ok(summary)
}

/// Drives detection, classification and recording over a directory
pub struct BatchProcessor<'a> {
    detector: Option<Box<dyn PlateDetector + 'a>>,
    classifier: ItemClassifier,
    repository: &'a dyn AnalysisRecordRepository,
    tree: OutputTree,
    progress: Option<ProgressCallback>,
    scratch_dir: Option<PathBuf>,
}

impl<'a> BatchProcessor<'a> {
    pub fn new(
        detector: Option<Box<dyn PlateDetector + 'a>>,
        classifier: ItemClassifier,
        repository: &'a dyn AnalysisRecordRepository,
        tree: OutputTree,
    ) -> Self {
        Self {
            detector,
            classifier,
            repository,
            tree,
            progress: None,
            scratch_dir: None,
        }
    }

    /// Wire the plate detector and classifier from registry models
    pub fn from_registry(
        config: &Config,
        registry: Arc<ModelRegistry>,
        repository: &'a dyn AnalysisRecordRepository,
        tree: OutputTree,
    ) -> Self {
        let detector = registry.get(PLATE_MODEL).map(|model| {
            Box::new(
                YoloPlateDetector::new(Arc::clone(model), config.plate_class_names.clone())
                    .with_config(config.detection.detector_config()),
            ) as Box<dyn PlateDetector + 'a>
        });
        if detector.is_none() {
            warn!(model = PLATE_MODEL, "Plate detector not loaded; every image will fail");
        }

        let classifier = ItemClassifier::new(registry).with_input_size(config.classifier_input_size);
        Self::new(detector, classifier, repository, tree)
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Directory for temporary crops; the system temp dir when unset
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Reset the output tree and process every image in `image_directory`
    pub fn run(
        &self,
        image_directory: &Path,
        analysis_date: Option<NaiveDate>,
        user: &UserId,
    ) -> std::result::Result<BatchSummary, BatchError> {
        if !image_directory.is_dir() {
            return Err(BatchError::InputDirectoryMissing(image_directory.display().to_string()));
        }

        self.tree.reset().map_err(|source| BatchError::OutputReset {
            path: self.tree.root().display().to_string(),
            source,
        })?;

        let images = scan_directory(image_directory)?;
        let recorder = AnalysisRecorder::new(self.repository, &self.tree, user.clone(), analysis_date);
        let mut summary = BatchSummary::start();
        summary.images_found = images.len();
        info!(count = images.len(), dir = %image_directory.display(), "Starting batch");

        for (index, path) in images.iter().enumerate() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            match self.process_image(path, &recorder, &mut summary) {
                Ok(()) => summary.images_processed += 1,
                Err(e) => {
                    error!(image = %name, error = %e, "Failed to process image");
                    summary.images_failed += 1;
                }
            }

            if let Some(ref progress) = self.progress {
                progress(index + 1, images.len(), &name);
            }
        }

        summary.finished_at = Utc::now();
        info!(
            processed = summary.images_processed,
            failed = summary.images_failed,
            items = summary.items_recorded,
            "Batch finished"
        );
        Ok(summary)
    }

    fn process_image(&self, path: &Path, recorder: &AnalysisRecorder<'_>, summary: &mut BatchSummary) -> Result<()> {
        let detector = self
            .detector
            .as_ref()
            .ok_or_else(|| ModelError::NotLoaded(PLATE_MODEL.to_string()))?;

        // Format comes from the file contents, not the extension
        let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
        let (width, height) = image.dimensions();
        let detections = detector.detect(&image)?;
        let selection = select_items(&detections, detector.class_names(), width, height);

        let name = path.display().to_string();
        for skipped in &selection.skipped {
            info!(image = %name, index = skipped.index, confidence = skipped.confidence, "Skipping box: {}", skipped.reason);
        }
        if selection.hit_item_limit() {
            info!(image = %name, remaining = selection.remaining, "Max items per image reached");
        }
        summary.items_skipped += selection.skipped.len() + selection.remaining;

        let base = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        for item in &selection.items {
            match self.process_item(&image, item, &base, recorder) {
                Ok(outcome) => summary.absorb(&outcome),
                Err(e) => {
                    warn!(image = %name, category = %item.category, error = %e, "Failed to classify item");
                    summary.items_failed += 1;
                }
            }
        }

        Ok(())
    }

    fn process_item(
        &self,
        image: &DynamicImage,
        item: &DetectedItem,
        base: &str,
        recorder: &AnalysisRecorder<'_>,
    ) -> Result<RecordOutcome> {
        let bbox = item.bbox;
        let crop = image.crop_imm(bbox.x_min, bbox.y_min, bbox.width(), bbox.height());

        // Removed on drop
        let mut builder = tempfile::Builder::new();
        builder.prefix("wiseplate-crop-").suffix(".jpg");
        let temp = match self.scratch_dir {
            Some(ref dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        DynamicImage::ImageRgb8(crop.to_rgb8()).save_with_format(temp.path(), ImageFormat::Jpeg)?;

        let classification = self.classifier.classify(&crop, item.category)?;
        info!(
            category = %item.category,
            sub_type = %classification.sub_type,
            status = %classification.waste_status,
            confidence = item.confidence,
            "Item classified"
        );

        Ok(recorder.record(base, item, &classification, temp.path()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analysis_date() {
        assert_eq!(
            parse_analysis_date(Some("2024-05-06")),
            NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()
        );
        let today = Local::now().date_naive();
        assert_eq!(parse_analysis_date(Some("06/05/2024")), today);
        assert_eq!(parse_analysis_date(None), today);
        assert_eq!(parse_analysis_date(Some("  ")), today);
    }
}
