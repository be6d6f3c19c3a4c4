//! Output formatting module

use serde_json::json;
use wiseplate_app::app::BatchSummary;
use wiseplate_types::{AnalysisRecord, OutputFormat, Result};
use wiseplate_vision::{ModelManifest, ModelRegistry};

pub fn output_summary(output_format: OutputFormat, summary: &BatchSummary) -> Result<()> {
    if output_format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        if let Some(ref report) = summary.report {
            println!("{}", report);
        }
        println!("\nBatch Summary");
        println!("=============");
        println!("{}", summary);
    }
    Ok(())
}

pub fn output_records(output_format: OutputFormat, records: &[AnalysisRecord]) -> Result<()> {
    if output_format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No records found.");
        return Ok(());
    }

    println!(
        "{:<10} {:<10} {:<20} {:<10} {:>6} {:>6}",
        "Date", "Category", "Type", "Status", "Ratio", "Conf."
    );
    println!("{}", "-".repeat(67));

    for record in records {
        let date = record
            .analysis_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<10} {:<10} {:<20} {:<10} {:>6.2} {:>6.2}",
            date,
            record.category,
            record.food_type.name(),
            record.waste_status(),
            record.waste_ratio,
            record.detection_confidence
        );
    }
    println!();
    println!("{} record(s)", records.len());

    Ok(())
}

pub fn output_models(output_format: OutputFormat, manifest: &ModelManifest, registry: &ModelRegistry) -> Result<()> {
    if output_format == OutputFormat::Json {
        let models: Vec<_> = manifest
            .models
            .iter()
            .map(|spec| {
                json!({
                    "name": spec.name,
                    "path": spec.path,
                    "loader": spec.loader,
                    "loaded": registry.contains(&spec.name),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&models)?);
        return Ok(());
    }

    println!("Models");
    println!("======");
    for spec in &manifest.models {
        let status = if registry.contains(&spec.name) {
            "loaded"
        } else {
            "missing"
        };
        println!("{:<18} {:<8} {}", spec.name, status, spec.path.display());
    }
    println!();
    println!("{}/{} models loaded", registry.len(), manifest.models.len());

    Ok(())
}
