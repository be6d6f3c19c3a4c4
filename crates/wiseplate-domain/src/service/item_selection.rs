//! Per-tray item selection policy
//!
//! Detections are examined in the order the detector returned them. The
//! first acceptable box of a category fills that category's quota; later
//! boxes of the same category are skipped even when their confidence is
//! higher. At most [`MAX_ITEMS_PER_IMAGE`] items are accepted per tray.

use wiseplate_types::{BoundingBox, DetectedItem, FoodCategory, RawDetection};

use crate::model::profile;

/// Maximum food items processed per tray image
pub const MAX_ITEMS_PER_IMAGE: usize = 4;

/// Minimum clipped box width/height in pixels
pub const MIN_BOX_SIDE: u32 = 10;

/// Why a detection was not accepted
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// Clipped box narrower or shorter than [`MIN_BOX_SIDE`], or empty
    TooSmall { width: i64, height: i64 },
    /// Detector class does not map to a food category
    UnknownLabel(String),
    /// Category already has its item
    CategoryLimit(FoodCategory),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::TooSmall { width, height } => {
                write!(f, "box too small ({}x{} px)", width, height)
            }
            SkipReason::UnknownLabel(label) => write!(f, "unknown category label '{}'", label),
            SkipReason::CategoryLimit(category) => {
                write!(f, "max limit reached for category {}", category)
            }
        }
    }
}

/// A detection that was dropped, with its index in detector order
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedDetection {
    pub index: usize,
    pub confidence: f32,
    pub reason: SkipReason,
}

/// Outcome of applying the selection policy to one tray
#[derive(Debug, Clone, Default)]
pub struct ItemSelection {
    /// Accepted items in detector order
    pub items: Vec<DetectedItem>,
    pub skipped: Vec<SkippedDetection>,
    /// Detections left unexamined because the per-image maximum was reached
    pub remaining: usize,
}

impl ItemSelection {
    pub fn hit_item_limit(&self) -> bool {
        self.remaining > 0
    }
}

/// Clip a center/size box to the image, truncating toward zero
///
/// Returns the clipped width and height alongside the box so callers can
/// report rejected sizes.
pub fn clip_box(detection: &RawDetection, width: u32, height: u32) -> (i64, i64, Option<BoundingBox>) {
    let half_w = detection.width / 2.0;
    let half_h = detection.height / 2.0;

    let x_min = ((detection.center_x - half_w) as i64).max(0);
    let y_min = ((detection.center_y - half_h) as i64).max(0);
    let x_max = ((detection.center_x + half_w) as i64).min(i64::from(width));
    let y_max = ((detection.center_y + half_h) as i64).min(i64::from(height));

    let clipped_w = x_max - x_min;
    let clipped_h = y_max - y_min;
    let min_side = i64::from(MIN_BOX_SIDE);

    if clipped_w < min_side || clipped_h < min_side {
        return (clipped_w, clipped_h, None);
    }

    let bbox = BoundingBox {
        x_min: x_min as u32,
        y_min: y_min as u32,
        x_max: x_max as u32,
        y_max: y_max as u32,
    };
    if bbox.is_empty() {
        return (clipped_w, clipped_h, None);
    }
    (clipped_w, clipped_h, Some(bbox))
}

/// Apply the tray selection policy to raw detections
///
/// `class_names` maps detector class indices to category labels.
pub fn select_items(
    detections: &[RawDetection],
    class_names: &[String],
    image_width: u32,
    image_height: u32,
) -> ItemSelection {
    let mut selection = ItemSelection::default();
    let mut counts = [0usize; 4];

    for (index, detection) in detections.iter().enumerate() {
        if selection.items.len() >= MAX_ITEMS_PER_IMAGE {
            selection.remaining = detections.len() - index;
            break;
        }

        let skip = |reason| SkippedDetection {
            index,
            confidence: detection.confidence,
            reason,
        };

        let (clipped_w, clipped_h, bbox) = clip_box(detection, image_width, image_height);
        let Some(bbox) = bbox else {
            selection.skipped.push(skip(SkipReason::TooSmall {
                width: clipped_w,
                height: clipped_h,
            }));
            continue;
        };

        let label = class_names
            .get(detection.class_index)
            .map(String::as_str)
            .unwrap_or_default();
        let Some(category) = FoodCategory::from_label(label) else {
            let label = if label.is_empty() {
                format!("class {}", detection.class_index)
            } else {
                label.to_string()
            };
            selection.skipped.push(skip(SkipReason::UnknownLabel(label)));
            continue;
        };

        let slot = category_slot(category);
        if counts[slot] >= profile(category).item_limit {
            selection
                .skipped
                .push(skip(SkipReason::CategoryLimit(category)));
            continue;
        }

        counts[slot] += 1;
        selection.items.push(DetectedItem {
            bbox,
            category,
            confidence: detection.confidence,
        });
    }

    selection
}

fn category_slot(category: FoodCategory) -> usize {
    FoodCategory::ALL
        .iter()
        .position(|c| *c == category)
        .unwrap_or_default()
}
