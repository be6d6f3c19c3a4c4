//! Domain model types

pub mod taxonomy;

pub use taxonomy::{
    all_model_names, profile, CategoryProfile, PLATE_MODEL, CATEGORY_PROFILES,
};
