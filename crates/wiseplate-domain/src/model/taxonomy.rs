//! Category taxonomy and model bindings
//!
//! One static profile per category keeps the label, the classifier model
//! names, the per-image item limit and the sub-type list together.

use wiseplate_types::{FoodCategory, FoodSubType};

/// Logical name of the plate (tray) detection model
pub const PLATE_MODEL: &str = "wisePlate";

/// Static definition of one food category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryProfile {
    pub category: FoodCategory,
    /// Waste / no-waste classifier
    pub waste_model: &'static str,
    /// Sub-type classifier
    pub type_model: &'static str,
    /// Maximum accepted items of this category per tray image
    pub item_limit: usize,
    /// Sub-type names indexed by classifier output
    pub sub_types: &'static [&'static str],
}

impl CategoryProfile {
    /// Resolve a type classifier arg-max index
    pub fn sub_type(&self, index: usize) -> FoodSubType {
        self.sub_types
            .get(index)
            .map(|name| FoodSubType::Named((*name).to_string()))
            .unwrap_or(FoodSubType::Unknown)
    }
}

pub static CATEGORY_PROFILES: [CategoryProfile; 4] = [
    CategoryProfile {
        category: FoodCategory::Soup,
        waste_model: "wiseSoup",
        type_model: "wiseTypeSoup",
        item_limit: 1,
        sub_types: &[
            "mercimek-corbasi",
            "sehriye-corbasi",
            "tarhana-corbasi",
            "yayla-corbasi",
        ],
    },
    CategoryProfile {
        category: FoodCategory::MainDish,
        waste_model: "wiseMainCls",
        type_model: "wiseMainTypeCls",
        item_limit: 1,
        sub_types: &[
            "barbunya",
            "bezelye",
            "et-sote",
            "kabak",
            "kasarli-köfte",
            "kuru-fasulye",
            "sebzeli-tavuk",
        ],
    },
    CategoryProfile {
        category: FoodCategory::SideDish,
        waste_model: "wiseSideCls",
        type_model: "wiseSideTypeCls",
        item_limit: 1,
        sub_types: &[
            "bulgur-pilavi",
            "burgu-makarna",
            "eriste",
            "fettucini",
            "pirinc-pilavi",
            "spagetti",
        ],
    },
    CategoryProfile {
        category: FoodCategory::ExtraDish,
        waste_model: "wiseExtraCls",
        type_model: "wiseExtraTypeCls",
        item_limit: 1,
        sub_types: &["havuc-salatasi", "mor-yogurt", "yogurt"],
    },
];

/// Get the profile of a category
pub fn profile(category: FoodCategory) -> &'static CategoryProfile {
    match category {
        FoodCategory::Soup => &CATEGORY_PROFILES[0],
        FoodCategory::MainDish => &CATEGORY_PROFILES[1],
        FoodCategory::SideDish => &CATEGORY_PROFILES[2],
        FoodCategory::ExtraDish => &CATEGORY_PROFILES[3],
    }
}

/// All logical model names: plate detector first, then waste/type per category
pub fn all_model_names() -> Vec<&'static str> {
    let mut names = vec![PLATE_MODEL];
    for p in &CATEGORY_PROFILES {
        names.push(p.waste_model);
        names.push(p.type_model);
    }
    names
}
