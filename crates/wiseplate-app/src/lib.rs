//! Application service layer - config, scanning, batch analysis, statistics

pub mod app;
pub mod config;
pub mod repository;
pub mod scanner;
