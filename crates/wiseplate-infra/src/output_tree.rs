//! Output file tree
//!
//! Layout: `{root}/{category}/{subtype}/{status}/{base}_{category}_{subtype}_{confidence:.2}_{status}.jpg`

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;
use wiseplate_types::{FoodCategory, FoodSubType, Result, WasteStatus};

/// Extension of crop files written to the tree
pub const CROP_EXTENSION: &str = "jpg";

/// Parsed (or to-be-written) crop file name
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFileName {
    /// Source image file stem
    pub base: String,
    pub category: FoodCategory,
    pub sub_type: FoodSubType,
    /// Detection confidence
    pub confidence: f64,
    pub status: WasteStatus,
}

impl OutputFileName {
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}_{:.2}_{}.{}",
            self.base, self.category, self.sub_type, self.confidence, self.status, CROP_EXTENSION
        )
    }

    /// Recover the fields from a crop file name
    ///
    /// Fields are taken from the right so a base containing `_` still parses.
    /// Category and sub-type labels never contain `_`.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = Path::new(file_name).file_stem()?.to_str()?;
        let mut parts = stem.rsplitn(5, '_');

        let status = WasteStatus::from_label(parts.next()?)?;
        let confidence = parts.next()?.parse::<f64>().ok()?;
        let sub_type = FoodSubType::from(parts.next()?);
        let category = FoodCategory::from_label(parts.next()?)?;
        let base = parts.next()?.to_string();

        Some(Self {
            base,
            category,
            sub_type,
            confidence,
            status,
        })
    }
}

/// Root directory of the per-item crop tree
#[derive(Debug, Clone)]
pub struct OutputTree {
    root: PathBuf,
}

impl OutputTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Remove the tree and recreate an empty root
    pub fn reset(&self) -> Result<()> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)?;
        }
        fs::create_dir_all(&self.root)?;
        info!(root = %self.root.display(), "Output directory reset");
        Ok(())
    }

    /// Directory for one (category, subtype, status) bucket
    pub fn item_dir(&self, category: FoodCategory, sub_type: &FoodSubType, status: WasteStatus) -> PathBuf {
        self.root
            .join(category.label())
            .join(sub_type.name())
            .join(status.label())
    }

    /// Copy a crop into the tree, creating directories; returns the destination
    pub fn store_crop(&self, crop_path: &Path, name: &OutputFileName) -> Result<PathBuf> {
        let dir = self.item_dir(name.category, &name.sub_type, name.status);
        fs::create_dir_all(&dir)?;
        let destination = dir.join(name.file_name());
        fs::copy(crop_path, &destination)?;
        Ok(destination)
    }
}
