//! End-to-end batch runs with fake models and synthetic tray images

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use image::{GenericImageView, ImageFormat, Rgb, RgbImage};
use ndarray::Array4;
use tempfile::{tempdir, TempDir};
use walkdir::WalkDir;

use wiseplate_app::app::{execute_with, statistics_report, BatchError, BatchProcessor, BatchRequest};
use wiseplate_app::config::Config;
use wiseplate_domain::repository::AnalysisRecordRepository;
use wiseplate_infra::persistence::{FileAnalysisRecordRepository, RECORDS_FILE};
use wiseplate_infra::{OutputFileName, OutputTree};
use wiseplate_types::{
    AnalysisRecord, FoodCategory, ModelError, RawDetection, Result, StatisticsSourceKind, StoreError,
    UserId, WasteStatus,
};
use wiseplate_vision::{InferenceModel, ItemClassifier, ModelOutput, ModelRegistry, PlateDetector};

struct FakeDetector {
    detections: Vec<RawDetection>,
    class_names: Vec<String>,
}

impl FakeDetector {
    fn new(detections: Vec<RawDetection>) -> Self {
        Self {
            detections,
            class_names: FoodCategory::ALL.iter().map(|c| c.label().to_string()).collect(),
        }
    }
}

impl PlateDetector for FakeDetector {
    fn detect(&self, _image: &image::DynamicImage) -> Result<Vec<RawDetection>> {
        Ok(self.detections.clone())
    }

    fn class_names(&self) -> &[String] {
        &self.class_names
    }
}

/// Returns fixed class probabilities (as logits) for every input
struct ProbabilityModel(Vec<f32>);

impl InferenceModel for ProbabilityModel {
    fn infer(&self, _input: &Array4<f32>) -> Result<ModelOutput> {
        let logits: Vec<f32> = self.0.iter().map(|p| p.ln()).collect();
        Ok(ModelOutput::new(vec![1, logits.len()], logits))
    }
}

/// Returns a fixed YOLOv5 output tensor
struct FixedOutputModel(ModelOutput);

impl InferenceModel for FixedOutputModel {
    fn infer(&self, _input: &Array4<f32>) -> Result<ModelOutput> {
        Ok(self.0.clone())
    }
}

/// Every inference fails
struct FailingModel;

impl InferenceModel for FailingModel {
    fn infer(&self, _input: &Array4<f32>) -> Result<ModelOutput> {
        Err(ModelError::Inference("session crashed".to_string()).into())
    }
}

struct FailingRepository;

impl AnalysisRecordRepository for FailingRepository {
    fn save(&self, _record: &AnalysisRecord) -> Result<()> {
        Err(StoreError::Unavailable("database is down".to_string()).into())
    }

    fn find_by_id(&self, _id: &str) -> Result<Option<AnalysisRecord>> {
        Ok(None)
    }

    fn find_all(&self) -> Result<Vec<AnalysisRecord>> {
        Ok(Vec::new())
    }
}

fn one_hot(len: usize, index: usize) -> Vec<f32> {
    (0..len).map(|i| if i == index { 1.0 } else { 0.0 }).collect()
}

fn model(probabilities: Vec<f32>) -> Arc<dyn InferenceModel> {
    Arc::new(ProbabilityModel(probabilities))
}

/// Classifier models for the soup / main-dish scenario
fn soup_and_main_registry() -> ModelRegistry {
    ModelRegistry::from_models([
        ("wiseSoup", model(vec![0.13, 0.87])),
        ("wiseTypeSoup", model(one_hot(4, 2))),
        ("wiseMainCls", model(vec![0.63, 0.37])),
        ("wiseMainTypeCls", model(one_hot(7, 5))),
    ])
}

/// Plate detector plus classifiers, as `execute_with` wires them
fn registry_with_plate_model() -> ModelRegistry {
    // YOLOv5 rows: cx, cy, w, h, objectness, 4 class scores
    let plate_output = ModelOutput::new(
        vec![1, 2, 9],
        vec![
            100.0, 100.0, 80.0, 80.0, 0.95, 0.96, 0.01, 0.01, 0.01, //
            300.0, 200.0, 120.0, 100.0, 0.8, 0.05, 0.95, 0.0, 0.0,
        ],
    );
    let mut models = vec![(
        "wisePlate",
        Arc::new(FixedOutputModel(plate_output)) as Arc<dyn InferenceModel>,
    )];
    models.extend([
        ("wiseSoup", model(vec![0.13, 0.87])),
        ("wiseTypeSoup", model(one_hot(4, 2))),
        ("wiseMainCls", model(vec![0.63, 0.37])),
        ("wiseMainTypeCls", model(one_hot(7, 5))),
    ]);
    ModelRegistry::from_models(models)
}

fn detection(cx: f32, cy: f32, w: f32, h: f32, confidence: f32, class_index: usize) -> RawDetection {
    RawDetection {
        center_x: cx,
        center_y: cy,
        width: w,
        height: h,
        confidence,
        class_index,
    }
}

fn soup_and_main_detections() -> Vec<RawDetection> {
    vec![
        detection(100.0, 100.0, 80.0, 80.0, 0.91, 0),
        detection(300.0, 200.0, 120.0, 100.0, 0.76, 1),
    ]
}

fn write_tray(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let path = dir.join(name);
    image.save(&path).unwrap();
    path
}

struct Workspace {
    _dir: TempDir,
    input: PathBuf,
    output: PathBuf,
    store: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let input = dir.path().join("images");
        let output = dir.path().join("output");
        let store = dir.path().join("store");
        fs::create_dir_all(&input).unwrap();
        Self {
            input,
            output,
            store,
            _dir: dir,
        }
    }

    fn repository(&self) -> FileAnalysisRecordRepository {
        FileAnalysisRecordRepository::open(&self.store).unwrap()
    }
}

fn tree_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}

fn user() -> UserId {
    UserId::new("ayse")
}

fn date() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2024, 5, 6)
}

#[test]
fn test_soup_and_main_dish_are_recorded() {
    let ws = Workspace::new();
    write_tray(&ws.input, "tray.png", 640, 480);
    let repo = ws.repository();

    let processor = BatchProcessor::new(
        Some(Box::new(FakeDetector::new(soup_and_main_detections()))),
        ItemClassifier::new(Arc::new(soup_and_main_registry())),
        &repo,
        OutputTree::new(&ws.output),
    );
    let summary = processor.run(&ws.input, date(), &user()).unwrap();

    assert_eq!(summary.images_found, 1);
    assert_eq!(summary.images_processed, 1);
    assert_eq!(summary.items_recorded, 2);
    assert_eq!(summary.record_failures + summary.file_failures, 0);

    assert_eq!(
        tree_files(&ws.output),
        vec![
            "ana-yemek/kuru-fasulye/israf-var/tray_ana-yemek_kuru-fasulye_0.76_israf-var.jpg",
            "corba/tarhana-corbasi/israf-yok/tray_corba_tarhana-corbasi_0.91_israf-yok.jpg",
        ]
    );

    let crop = image::open(
        ws.output
            .join("corba/tarhana-corbasi/israf-yok/tray_corba_tarhana-corbasi_0.91_israf-yok.jpg"),
    )
    .unwrap();
    assert_eq!(crop.dimensions(), (80, 80));

    let records = repo.find_all().unwrap();
    assert_eq!(records.len(), 2);

    let soup = records.iter().find(|r| r.category == FoodCategory::Soup).unwrap();
    assert_eq!(soup.food_type.name(), "tarhana-corbasi");
    assert_eq!((soup.waste_count, soup.no_waste_count), (0, 1));
    assert!((soup.waste_ratio - 0.87).abs() < 1e-4);
    assert_eq!(soup.analysis_date, date());
    assert_eq!(soup.user, user());
    assert_eq!(soup.source_image, "tray");

    let main = records.iter().find(|r| r.category == FoodCategory::MainDish).unwrap();
    assert_eq!(main.food_type.name(), "kuru-fasulye");
    assert_eq!((main.waste_count, main.no_waste_count), (1, 0));
    assert!((main.waste_ratio - 0.63).abs() < 1e-4);
}

#[test]
fn test_missing_waste_model_records_unknown() {
    let ws = Workspace::new();
    write_tray(&ws.input, "tray.png", 640, 480);
    let repo = ws.repository();

    let registry = ModelRegistry::from_models([("wiseMainTypeCls", model(one_hot(7, 5)))]);
    let processor = BatchProcessor::new(
        Some(Box::new(FakeDetector::new(vec![detection(300.0, 200.0, 120.0, 100.0, 0.76, 1)]))),
        ItemClassifier::new(Arc::new(registry)),
        &repo,
        OutputTree::new(&ws.output),
    );
    processor.run(&ws.input, date(), &user()).unwrap();

    assert_eq!(
        tree_files(&ws.output),
        vec!["ana-yemek/kuru-fasulye/bilgi-yok/tray_ana-yemek_kuru-fasulye_0.76_bilgi-yok.jpg"]
    );
    let records = repo.find_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!((records[0].waste_count, records[0].no_waste_count), (0, 0));
    assert_eq!(records[0].waste_ratio, 0.0);
    assert_eq!(records[0].waste_status(), WasteStatus::Unknown);
}

#[test]
fn test_corrupt_image_does_not_stop_the_run() {
    let ws = Workspace::new();
    fs::write(ws.input.join("a_broken.jpg"), b"definitely not a jpeg").unwrap();
    write_tray(&ws.input, "b_tray.png", 640, 480);
    let repo = ws.repository();

    let processor = BatchProcessor::new(
        Some(Box::new(FakeDetector::new(soup_and_main_detections()))),
        ItemClassifier::new(Arc::new(soup_and_main_registry())),
        &repo,
        OutputTree::new(&ws.output),
    );
    let summary = processor.run(&ws.input, date(), &user()).unwrap();

    assert_eq!(summary.images_found, 2);
    assert_eq!(summary.images_failed, 1);
    assert_eq!(summary.images_processed, 1);
    let records = repo.find_all().unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.source_image == "b_tray"));
}

#[test]
fn test_zero_boxes_produce_nothing() {
    let ws = Workspace::new();
    write_tray(&ws.input, "empty.png", 320, 240);
    let repo = ws.repository();

    let processor = BatchProcessor::new(
        Some(Box::new(FakeDetector::new(Vec::new()))),
        ItemClassifier::new(Arc::new(soup_and_main_registry())),
        &repo,
        OutputTree::new(&ws.output),
    );
    let summary = processor.run(&ws.input, date(), &user()).unwrap();

    assert_eq!(summary.images_processed, 1);
    assert_eq!(summary.items_recorded, 0);
    assert!(repo.find_all().unwrap().is_empty());
    assert!(ws.output.is_dir());
    assert_eq!(fs::read_dir(&ws.output).unwrap().count(), 0);
}

#[test]
fn test_rerun_resets_the_output_tree() {
    let ws = Workspace::new();
    write_tray(&ws.input, "tray.png", 640, 480);
    fs::create_dir_all(ws.output.join("stale")).unwrap();
    fs::write(ws.output.join("stale/old.jpg"), b"x").unwrap();
    let repo = ws.repository();

    let processor = BatchProcessor::new(
        Some(Box::new(FakeDetector::new(soup_and_main_detections()))),
        ItemClassifier::new(Arc::new(soup_and_main_registry())),
        &repo,
        OutputTree::new(&ws.output),
    );
    processor.run(&ws.input, date(), &user()).unwrap();
    let first = tree_files(&ws.output);
    processor.run(&ws.input, date(), &user()).unwrap();
    let second = tree_files(&ws.output);

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    assert!(!ws.output.join("stale").exists());
    // Records are append-only
    assert_eq!(repo.find_all().unwrap().len(), 4);
}

#[test]
fn test_file_names_round_trip_with_records() {
    let ws = Workspace::new();
    write_tray(&ws.input, "lunch_tray_07.png", 640, 480);
    let repo = ws.repository();

    let processor = BatchProcessor::new(
        Some(Box::new(FakeDetector::new(soup_and_main_detections()))),
        ItemClassifier::new(Arc::new(soup_and_main_registry())),
        &repo,
        OutputTree::new(&ws.output),
    );
    processor.run(&ws.input, date(), &user()).unwrap();

    let records = repo.find_all().unwrap();
    for file in tree_files(&ws.output) {
        let file_name = file.rsplit('/').next().unwrap();
        let parsed = OutputFileName::parse(file_name).unwrap();
        assert_eq!(parsed.base, "lunch_tray_07");

        let record = records
            .iter()
            .find(|r| r.category == parsed.category)
            .unwrap();
        assert_eq!(record.food_type, parsed.sub_type);
        assert_eq!(record.waste_status(), parsed.status);
        assert!((record.detection_confidence - parsed.confidence).abs() < 0.005);
        assert_eq!(
            file,
            format!(
                "{}/{}/{}/{}",
                parsed.category,
                parsed.sub_type,
                parsed.status,
                file_name
            )
        );
    }
}

#[test]
fn test_failed_save_still_writes_the_crop() {
    let ws = Workspace::new();
    write_tray(&ws.input, "tray.png", 640, 480);
    let repo = FailingRepository;

    let processor = BatchProcessor::new(
        Some(Box::new(FakeDetector::new(soup_and_main_detections()))),
        ItemClassifier::new(Arc::new(soup_and_main_registry())),
        &repo,
        OutputTree::new(&ws.output),
    );
    let summary = processor.run(&ws.input, date(), &user()).unwrap();

    assert_eq!(summary.items_recorded, 0);
    assert_eq!(summary.record_failures, 2);
    assert_eq!(summary.file_failures, 0);
    assert_eq!(tree_files(&ws.output).len(), 2);
}

#[test]
fn test_category_quota_and_item_limit() {
    let ws = Workspace::new();
    write_tray(&ws.input, "tray.png", 800, 400);
    let repo = ws.repository();

    let detections = vec![
        detection(60.0, 60.0, 80.0, 80.0, 0.90, 0),
        detection(160.0, 60.0, 80.0, 80.0, 0.95, 0),
        detection(260.0, 60.0, 80.0, 80.0, 0.85, 1),
        detection(360.0, 60.0, 80.0, 80.0, 0.80, 2),
        detection(460.0, 60.0, 80.0, 80.0, 0.75, 3),
        detection(560.0, 60.0, 80.0, 80.0, 0.70, 1),
    ];
    let processor = BatchProcessor::new(
        Some(Box::new(FakeDetector::new(detections))),
        ItemClassifier::new(Arc::new(ModelRegistry::default())),
        &repo,
        OutputTree::new(&ws.output),
    );
    let summary = processor.run(&ws.input, date(), &user()).unwrap();

    assert_eq!(summary.items_recorded, 4);
    // Second soup is skipped; the last box is never examined
    assert_eq!(summary.items_skipped, 2);

    let records = repo.find_all().unwrap();
    let soup = records.iter().find(|r| r.category == FoodCategory::Soup).unwrap();
    assert!((soup.detection_confidence - 0.90).abs() < 1e-6);
    for category in FoodCategory::ALL {
        assert_eq!(records.iter().filter(|r| r.category == category).count(), 1);
    }
}

#[test]
fn test_missing_plate_detector_fails_each_image() {
    let ws = Workspace::new();
    write_tray(&ws.input, "a.png", 100, 100);
    write_tray(&ws.input, "b.jpg", 100, 100);
    let repo = ws.repository();

    let processor = BatchProcessor::new(
        None,
        ItemClassifier::new(Arc::new(soup_and_main_registry())),
        &repo,
        OutputTree::new(&ws.output),
    );
    let summary = processor.run(&ws.input, date(), &user()).unwrap();

    assert_eq!(summary.images_failed, 2);
    assert_eq!(summary.images_processed, 0);
}

#[test]
fn test_missing_input_directory_is_fatal_and_keeps_output() {
    let ws = Workspace::new();
    fs::create_dir_all(&ws.output).unwrap();
    fs::write(ws.output.join("keep.txt"), b"x").unwrap();
    let repo = ws.repository();

    let processor = BatchProcessor::new(
        Some(Box::new(FakeDetector::new(Vec::new()))),
        ItemClassifier::new(Arc::new(ModelRegistry::default())),
        &repo,
        OutputTree::new(&ws.output),
    );
    let result = processor.run(&ws.input.join("absent"), date(), &user());

    assert!(matches!(result, Err(BatchError::InputDirectoryMissing(_))));
    assert!(ws.output.join("keep.txt").exists());
}

#[test]
fn test_empty_registry_is_fatal() {
    let ws = Workspace::new();
    let repo = ws.repository();
    let request = BatchRequest::new(&ws.input, &ws.output, user());

    let result = execute_with(&Config::default(), Arc::new(ModelRegistry::default()), &repo, request);
    assert!(matches!(result, Err(BatchError::NoModelsLoaded(_))));
    assert!(!ws.output.exists());
}

#[test]
fn test_full_run_through_registry_models() {
    let ws = Workspace::new();
    write_tray(&ws.input, "tray.png", 640, 640);
    let repo = ws.repository();

    let registry = registry_with_plate_model();

    let config = Config {
        remove_input_after_run: true,
        ..Config::default()
    };
    let progress_calls = Arc::new(Mutex::new(Vec::new()));
    let calls = Arc::clone(&progress_calls);
    let request = BatchRequest::new(&ws.input, &ws.output, user())
        .with_date(date())
        .with_progress(Box::new(move |done: usize, total: usize, name: &str| {
            calls.lock().unwrap().push((done, total, name.to_string()));
        }));

    let summary = execute_with(&config, Arc::new(registry), &repo, request).unwrap();

    assert_eq!(summary.items_recorded, 2);
    assert_eq!(
        tree_files(&ws.output),
        vec![
            "ana-yemek/kuru-fasulye/israf-var/tray_ana-yemek_kuru-fasulye_0.76_israf-var.jpg",
            "corba/tarhana-corbasi/israf-yok/tray_corba_tarhana-corbasi_0.91_israf-yok.jpg",
        ]
    );
    assert_eq!(
        *progress_calls.lock().unwrap(),
        vec![(1, 1, "tray.png".to_string())]
    );
    assert!(summary.report.is_some());
    assert!(!ws.input.exists());
}

#[test]
fn test_report_for_soup_and_main_scenario() {
    let ws = Workspace::new();
    write_tray(&ws.input, "tray.png", 640, 640);
    let repo = ws.repository();
    let request = BatchRequest::new(&ws.input, &ws.output, user()).with_date(date());

    let summary = execute_with(&Config::default(), Arc::new(registry_with_plate_model()), &repo, request).unwrap();
    assert_eq!(summary.items_recorded, 2);

    let report = statistics_report(StatisticsSourceKind::Tree, &ws.output, &repo, None, date()).unwrap();
    assert_eq!(summary.report.as_deref().map(|r| r.contains("CORBA ÖZET")), Some(true));

    let soup_at = report.find("CORBA ÖZET").unwrap();
    let main_at = report.find("ANA-YEMEK ÖZET").unwrap();
    assert!(soup_at < main_at);
    let soup_section = &report[soup_at..main_at];
    let main_section = &report[main_at..];

    assert!(soup_section.contains("Toplam: 1 örnek"));
    assert!(soup_section.contains("İsraf Yok: 1 (100.0%)"));
    assert!(soup_section.contains("İsraf Var: 0 (0.0%)"));
    assert!(soup_section.contains("tarhana-corbasi:"));

    assert!(main_section.contains("İsraf Var: 1 (100.0%)"));
    assert!(main_section.contains("İsraf Yok: 0 (0.0%)"));
    assert!(main_section.contains("kuru-fasulye:"));

    assert!(!report.contains("YAN-YEMEK"));
    assert!(!report.contains("EK-YEMEK"));
}

#[test]
fn test_classification_error_skips_the_item() {
    let ws = Workspace::new();
    write_tray(&ws.input, "tray.png", 640, 480);
    let scratch = ws.output.with_file_name("scratch");
    fs::create_dir_all(&scratch).unwrap();
    let repo = ws.repository();

    let registry = ModelRegistry::from_models([
        ("wiseSoup", Arc::new(FailingModel) as Arc<dyn InferenceModel>),
        ("wiseTypeSoup", model(one_hot(4, 2))),
        ("wiseMainCls", model(vec![0.63, 0.37])),
        ("wiseMainTypeCls", model(one_hot(7, 5))),
    ]);
    let processor = BatchProcessor::new(
        Some(Box::new(FakeDetector::new(soup_and_main_detections()))),
        ItemClassifier::new(Arc::new(registry)),
        &repo,
        OutputTree::new(&ws.output),
    )
    .with_scratch_dir(&scratch);
    let summary = processor.run(&ws.input, date(), &user()).unwrap();

    assert_eq!(summary.images_processed, 1);
    assert_eq!(summary.items_failed, 1);
    assert_eq!(summary.items_recorded, 1);

    let records = repo.find_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].category, FoodCategory::MainDish);
    assert_eq!(
        tree_files(&ws.output),
        vec!["ana-yemek/kuru-fasulye/israf-var/tray_ana-yemek_kuru-fasulye_0.76_israf-var.jpg"]
    );
    // Scratch crops are gone for the failed item and the recorded one
    assert_eq!(fs::read_dir(&scratch).unwrap().count(), 0);
}

#[test]
fn test_corrupt_record_store_does_not_stop_the_run() {
    let ws = Workspace::new();
    write_tray(&ws.input, "tray.png", 640, 480);
    fs::create_dir_all(&ws.store).unwrap();
    fs::write(ws.store.join(RECORDS_FILE), r#"[{"id": "trunc"#).unwrap();
    let repo = ws.repository();

    let processor = BatchProcessor::new(
        Some(Box::new(FakeDetector::new(soup_and_main_detections()))),
        ItemClassifier::new(Arc::new(soup_and_main_registry())),
        &repo,
        OutputTree::new(&ws.output),
    );
    let summary = processor.run(&ws.input, date(), &user()).unwrap();

    assert_eq!(summary.items_recorded, 2);
    assert_eq!(summary.record_failures, 0);
    assert_eq!(ws.repository().find_all().unwrap().len(), 2);
}

#[test]
fn test_png_content_with_jpg_extension_is_decoded() {
    let ws = Workspace::new();
    let image = RgbImage::from_pixel(640, 480, Rgb([90, 120, 30]));
    image
        .save_with_format(ws.input.join("tray.jpg"), ImageFormat::Png)
        .unwrap();
    let repo = ws.repository();

    let processor = BatchProcessor::new(
        Some(Box::new(FakeDetector::new(soup_and_main_detections()))),
        ItemClassifier::new(Arc::new(soup_and_main_registry())),
        &repo,
        OutputTree::new(&ws.output),
    );
    let summary = processor.run(&ws.input, date(), &user()).unwrap();

    assert_eq!(summary.images_failed, 0);
    assert_eq!(summary.images_processed, 1);
    assert_eq!(summary.items_recorded, 2);
}

#[test]
fn test_invalid_config_is_rejected_before_the_run() {
    let ws = Workspace::new();
    write_tray(&ws.input, "tray.png", 64, 64);
    let repo = ws.repository();
    let mut config = Config::default();
    config.detection.input_size = 0;
    let request = BatchRequest::new(&ws.input, &ws.output, user());

    let result = execute_with(&config, Arc::new(registry_with_plate_model()), &repo, request);
    assert!(matches!(result, Err(BatchError::Other(_))));
    assert!(!ws.output.exists());
}
