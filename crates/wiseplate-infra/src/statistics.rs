//! Statistics sources: output tree walk and record store sums

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::debug;
use walkdir::WalkDir;
use wiseplate_domain::repository::AnalysisRecordRepository;
use wiseplate_domain::service::{StatisticsSource, WasteStatistics};
use wiseplate_types::{FoodCategory, Result, UserId, WasteStatus};

/// Count crop images under `{root}/{category}/{subtype}/{status}`
pub struct OutputTreeStatistics {
    root: PathBuf,
}

impl OutputTreeStatistics {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl StatisticsSource for OutputTreeStatistics {
    fn name(&self) -> &'static str {
        "tree"
    }

    fn collect(&self) -> Result<WasteStatistics> {
        let mut stats = WasteStatistics::default();

        for category in FoodCategory::ALL {
            let category_dir = self.root.join(category.label());
            if !category_dir.is_dir() {
                continue;
            }

            let category_stats = stats.category_mut(category);
            for sub_type_dir in child_dirs(&category_dir)? {
                let Some(sub_type) = sub_type_dir.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                category_stats.ensure_type(sub_type);

                for status in WasteStatus::COUNTED {
                    let count = count_images(&sub_type_dir.join(status.label()))?;
                    category_stats.add(sub_type, status, count);
                }
            }
        }

        debug!(root = %self.root.display(), total = stats.grand_total().total(), "Output tree counted");
        Ok(stats)
    }
}

fn child_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        }
    }
    Ok(dirs)
}

fn count_images(dir: &Path) -> Result<u64> {
    if !dir.is_dir() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() && is_counted_image(entry.path()) {
            count += 1;
        }
    }
    Ok(count)
}

fn is_counted_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_lowercase().as_str(), "jpg" | "jpeg" | "png"))
        .unwrap_or(false)
}

/// Sum persisted records, optionally for one user and/or one analysis date
pub struct RecordStoreStatistics<'a, R: AnalysisRecordRepository + ?Sized> {
    repository: &'a R,
    user: Option<UserId>,
    date: Option<NaiveDate>,
}

impl<'a, R: AnalysisRecordRepository + ?Sized> RecordStoreStatistics<'a, R> {
    pub fn new(repository: &'a R) -> Self {
        Self {
            repository,
            user: None,
            date: None,
        }
    }

    pub fn with_user(mut self, user: Option<UserId>) -> Self {
        self.user = user;
        self
    }

    pub fn with_date(mut self, date: Option<NaiveDate>) -> Self {
        self.date = date;
        self
    }
}

impl<R: AnalysisRecordRepository + ?Sized> StatisticsSource for RecordStoreStatistics<'_, R> {
    fn name(&self) -> &'static str {
        "store"
    }

    fn collect(&self) -> Result<WasteStatistics> {
        let mut stats = WasteStatistics::default();

        let records = match &self.user {
            Some(user) => self.repository.find_by_user(user)?,
            None => self.repository.find_all()?,
        };

        for record in records
            .iter()
            .filter(|r| self.date.is_none() || r.analysis_date == self.date)
        {
            let category = stats.category_mut(record.category);
            let sub_type = record.food_type.name();
            category.add(sub_type, WasteStatus::Wasted, u64::from(record.waste_count));
            category.add(sub_type, WasteStatus::NotWasted, u64::from(record.no_waste_count));
        }

        Ok(stats)
    }
}
