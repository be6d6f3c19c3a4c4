//! Statistics Service - picks a statistics source and renders the report

use std::path::Path;

use chrono::{NaiveDate, Utc};
use tracing::debug;
use wiseplate_domain::repository::AnalysisRecordRepository;
use wiseplate_domain::service::{generate_waste_report, StatisticsSource, WasteStatistics};
use wiseplate_infra::{OutputTreeStatistics, RecordStoreStatistics};
use wiseplate_types::{Result, StatisticsSourceKind, UserId};

/// Collect statistics from the chosen source
///
/// `user` and `date` filter the record store; the output tree holds a
/// single run and ignores them.
pub fn collect_statistics(
    kind: StatisticsSourceKind,
    output_root: &Path,
    repository: &dyn AnalysisRecordRepository,
    user: Option<UserId>,
    date: Option<NaiveDate>,
) -> Result<WasteStatistics> {
    let source: Box<dyn StatisticsSource + '_> = match kind {
        StatisticsSourceKind::Tree => Box::new(OutputTreeStatistics::new(output_root)),
        StatisticsSourceKind::Store => Box::new(
            RecordStoreStatistics::new(repository)
                .with_user(user)
                .with_date(date),
        ),
    };
    debug!(source = source.name(), "Collecting statistics");
    source.collect()
}

/// Collect statistics and render the waste report
pub fn statistics_report(
    kind: StatisticsSourceKind,
    output_root: &Path,
    repository: &dyn AnalysisRecordRepository,
    user: Option<UserId>,
    date: Option<NaiveDate>,
) -> Result<String> {
    let stats = collect_statistics(kind, output_root, repository, user, date)?;
    Ok(generate_waste_report(&stats, date, Utc::now()))
}
