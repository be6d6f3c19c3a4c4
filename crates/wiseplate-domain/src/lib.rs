//! Domain layer: food taxonomy, detection policy, statistics, repository traits

pub mod model;
pub mod repository;
pub mod service;
