//! Core types for food-waste analysis

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Directory/label name used for anything the models could not decide
pub const UNKNOWN_LABEL: &str = "bilgi-yok";

/// Food category on a cafeteria tray
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FoodCategory {
    /// Çorba
    #[serde(rename = "corba")]
    Soup,
    /// Ana yemek
    #[serde(rename = "ana-yemek")]
    MainDish,
    /// Yan yemek
    #[serde(rename = "yan-yemek")]
    SideDish,
    /// Ek yemek (salad, yogurt)
    #[serde(rename = "ek-yemek")]
    ExtraDish,
}

impl FoodCategory {
    /// All categories in report order
    pub const ALL: [FoodCategory; 4] = [
        FoodCategory::Soup,
        FoodCategory::MainDish,
        FoodCategory::SideDish,
        FoodCategory::ExtraDish,
    ];

    /// Label used by the plate detector and as directory name
    pub fn label(&self) -> &'static str {
        match self {
            FoodCategory::Soup => "corba",
            FoodCategory::MainDish => "ana-yemek",
            FoodCategory::SideDish => "yan-yemek",
            FoodCategory::ExtraDish => "ek-yemek",
        }
    }

    /// Parse a detector/directory label
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}

impl std::fmt::Display for FoodCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Waste decision for one food item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WasteStatus {
    #[serde(rename = "israf-var")]
    Wasted,
    #[serde(rename = "israf-yok")]
    NotWasted,
    /// Waste model for the category was not loaded
    #[serde(rename = "bilgi-yok")]
    Unknown,
}

impl WasteStatus {
    /// Statuses that are counted in statistics
    pub const COUNTED: [WasteStatus; 2] = [WasteStatus::Wasted, WasteStatus::NotWasted];

    /// Map a waste classifier arg-max index. Only class 1 means "no waste".
    pub fn from_class_index(index: usize) -> Self {
        if index == 1 {
            WasteStatus::NotWasted
        } else {
            WasteStatus::Wasted
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WasteStatus::Wasted => "israf-var",
            WasteStatus::NotWasted => "israf-yok",
            WasteStatus::Unknown => UNKNOWN_LABEL,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "israf-var" => Some(WasteStatus::Wasted),
            "israf-yok" => Some(WasteStatus::NotWasted),
            UNKNOWN_LABEL => Some(WasteStatus::Unknown),
            _ => None,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, WasteStatus::Unknown)
    }
}

impl std::fmt::Display for WasteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Dish name within a category (e.g. "tarhana-corbasi")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FoodSubType {
    Named(String),
    Unknown,
}

impl FoodSubType {
    pub fn name(&self) -> &str {
        match self {
            FoodSubType::Named(name) => name,
            FoodSubType::Unknown => UNKNOWN_LABEL,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, FoodSubType::Named(_))
    }
}

impl From<String> for FoodSubType {
    fn from(name: String) -> Self {
        if name == UNKNOWN_LABEL || name.is_empty() {
            FoodSubType::Unknown
        } else {
            FoodSubType::Named(name)
        }
    }
}

impl From<&str> for FoodSubType {
    fn from(name: &str) -> Self {
        FoodSubType::from(name.to_string())
    }
}

impl From<FoodSubType> for String {
    fn from(sub_type: FoodSubType) -> Self {
        sub_type.name().to_string()
    }
}

impl std::fmt::Display for FoodSubType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity of the user who owns analysis records
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pixel box clipped to the source image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

impl BoundingBox {
    pub fn width(&self) -> u32 {
        self.x_max.saturating_sub(self.x_min)
    }

    pub fn height(&self) -> u32 {
        self.y_max.saturating_sub(self.y_min)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// Raw plate detector output in source-image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub center_x: f32,
    pub center_y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    pub class_index: usize,
}

/// Food item accepted for classification (never persisted)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedItem {
    pub bbox: BoundingBox,
    pub category: FoodCategory,
    pub confidence: f32,
}

/// Per-item classifier output
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub waste_status: WasteStatus,
    /// Arg-max probability of the waste model (0.0 when unknown)
    pub waste_confidence: f32,
    pub sub_type: FoodSubType,
}

impl Classification {
    pub fn unknown() -> Self {
        Self {
            waste_status: WasteStatus::Unknown,
            waste_confidence: 0.0,
            sub_type: FoodSubType::Unknown,
        }
    }
}

/// Durable per-item analysis record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Unique identifier
    pub id: String,
    /// Owning user
    pub user: UserId,
    pub category: FoodCategory,
    pub food_type: FoodSubType,
    /// 1 when the item was wasted
    pub waste_count: u8,
    /// 1 when the item was not wasted
    pub no_waste_count: u8,
    /// Waste classifier confidence, 0.0 when status is unknown
    pub waste_ratio: f64,
    #[serde(default)]
    pub analysis_date: Option<NaiveDate>,
    /// Plate detector confidence (also encoded in the crop file name)
    #[serde(default)]
    pub detection_confidence: f64,
    /// Tray image the item was cropped from
    #[serde(default)]
    pub source_image: String,
    pub created_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub fn new(
        user: UserId,
        item: &DetectedItem,
        classification: &Classification,
        analysis_date: Option<NaiveDate>,
    ) -> Self {
        let status = classification.waste_status;
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user,
            category: item.category,
            food_type: classification.sub_type.clone(),
            waste_count: u8::from(status == WasteStatus::Wasted),
            no_waste_count: u8::from(status == WasteStatus::NotWasted),
            waste_ratio: if status.is_known() {
                f64::from(classification.waste_confidence)
            } else {
                0.0
            },
            analysis_date,
            detection_confidence: f64::from(item.confidence),
            source_image: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_source_image(mut self, source_image: String) -> Self {
        self.source_image = source_image;
        self
    }

    /// Recover the waste status from the count columns
    pub fn waste_status(&self) -> WasteStatus {
        match (self.waste_count, self.no_waste_count) {
            (1, 0) => WasteStatus::Wasted,
            (0, 1) => WasteStatus::NotWasted,
            _ => WasteStatus::Unknown,
        }
    }
}

impl std::fmt::Display for AnalysisRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} - {} - {} - Waste Ratio: {:.2}",
            self.user, self.category, self.food_type, self.waste_ratio
        )
    }
}
