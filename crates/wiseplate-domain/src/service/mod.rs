//! Domain services

pub mod item_selection;
pub mod statistics;

pub use item_selection::{
    clip_box, select_items, ItemSelection, SkipReason, SkippedDetection, MAX_ITEMS_PER_IMAGE,
    MIN_BOX_SIDE,
};
pub use statistics::{
    generate_waste_report, CategoryStatistics, StatisticsSource, WasteCounts, WasteStatistics,
};
