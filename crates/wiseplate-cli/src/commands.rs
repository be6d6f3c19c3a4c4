//! Command handlers

use crate::cli::{Cli, Commands};
use crate::output::{output_models, output_records, output_summary};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use wiseplate_app::app::{
    collect_statistics, execute as execute_batch, parse_analysis_date, statistics_report,
    BatchRequest,
};
use wiseplate_app::config::Config;
use wiseplate_app::repository::open_record_repo;
use wiseplate_domain::repository::AnalysisRecordRepository;
use wiseplate_types::{OutputFormat, Result, StatisticsSourceKind, UserId};
use wiseplate_vision::{ModelManifest, ModelRegistry};

/// Execute CLI command
pub fn execute(cli: Cli) -> Result<()> {
    // Load config
    let mut config = Config::load()?;

    // Override from CLI args
    if let Some(ref models_dir) = cli.models_dir {
        config.models_dir = models_dir.clone();
    }
    if let Some(ref store_dir) = cli.store_dir {
        config.store_dir = Some(store_dir.clone());
    }
    let output_format = cli.format.unwrap_or(config.output_format);

    match cli.command {
        Commands::Run {
            input,
            output,
            date,
            user,
            remove_input,
        } => {
            if remove_input {
                config.remove_input_after_run = true;
            }
            cmd_run(&config, input, output, date, user, output_format)
        }

        Commands::Stats {
            source,
            output,
            user,
            date,
        } => cmd_stats(&config, source, output, user, date, output_format),

        Commands::Results { user, limit } => cmd_results(&config, user, limit, output_format),

        Commands::Models => cmd_models(&config, output_format),

        Commands::Config { show, set, reset } => cmd_config(show, set, reset),
    }
}

fn cmd_run(
    config: &Config,
    input: Option<std::path::PathBuf>,
    output: Option<std::path::PathBuf>,
    date: Option<String>,
    user: String,
    output_format: OutputFormat,
) -> Result<()> {
    let input = input.unwrap_or_else(|| config.input_dir.clone());
    let output = output.unwrap_or_else(|| config.output_dir.clone());
    let analysis_date = parse_analysis_date(date.as_deref());
    info!(
        input = %input.display(),
        output = %output.display(),
        date = %analysis_date,
        user = %user,
        "Batch requested"
    );

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    let progress_bar = pb.clone();

    let request = BatchRequest::new(&input, &output, UserId::new(user))
        .with_date(Some(analysis_date))
        .with_progress(Box::new(move |done: usize, total: usize, name: &str| {
            progress_bar.set_length(total as u64);
            progress_bar.set_position(done as u64);
            progress_bar.set_message(name.to_string());
        }));

    let summary = execute_batch(config, request);
    pb.finish_and_clear();
    let summary = summary?;

    output_summary(output_format, &summary)
}

fn cmd_stats(
    config: &Config,
    source: Option<StatisticsSourceKind>,
    output: Option<std::path::PathBuf>,
    user: Option<String>,
    date: Option<String>,
    output_format: OutputFormat,
) -> Result<()> {
    let source = source.unwrap_or(config.statistics_source);
    let output = output.unwrap_or_else(|| config.output_dir.clone());
    let user = user.map(UserId::new);
    let date = date.map(|d| parse_analysis_date(Some(&d)));
    let repository = open_record_repo(config)?;

    if output_format == OutputFormat::Json {
        let stats = collect_statistics(source, &output, &repository, user, date)?;
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        let report = statistics_report(source, &output, &repository, user, date)?;
        println!("{}", report);
    }
    Ok(())
}

fn cmd_results(config: &Config, user: String, limit: usize, output_format: OutputFormat) -> Result<()> {
    let repository = open_record_repo(config)?;
    let records = repository.find_by_user(&UserId::new(user))?;
    let shown: Vec<_> = records.into_iter().take(limit).collect();
    output_records(output_format, &shown)
}

fn cmd_models(config: &Config, output_format: OutputFormat) -> Result<()> {
    let manifest = ModelManifest::load(&config.models_dir)?;
    let registry = ModelRegistry::load(&manifest);
    output_models(output_format, &manifest, &registry)
}

fn cmd_config(show: bool, set: Vec<String>, reset: bool) -> Result<()> {
    if reset {
        let config = Config::default();
        config.save()?;
        println!("Configuration reset to defaults");
        println!("\n{}", config);
        return Ok(());
    }

    let mut config = Config::load()?;
    let mut modified = false;

    for assignment in &set {
        let Some((key, value)) = assignment.split_once('=') else {
            return Err(wiseplate_types::ConfigError::InvalidValue(format!(
                "expected KEY=VALUE, got {}",
                assignment
            ))
            .into());
        };
        config.set_value(key.trim(), value.trim())?;
        modified = true;
    }

    if modified {
        config.save()?;
        println!("Configuration updated");
    }

    if show || !modified {
        println!("{}", config);
    }

    Ok(())
}
